//! Trusted-setup parameters
//!
//! The parameter blob is produced outside this system and injected. Nothing
//! here ever regenerates it as a side effect; `deterministic` exists for
//! tests and local runs only.

use blake2::{Blake2b512, Digest};
use halo2_proofs::poly::commitment::Params;
use halo2curves::pasta::EqAffine;
use std::{fs, io::Cursor, path::Path};
use tracing::info;
use votebatch_runtime::{Result, VoteBatchError};

pub type Fingerprint = [u8; 32];

/// Largest `k` accepted from a parameter file.
pub const MAX_K: u32 = 28;

/// Immutable IPA commitment parameters plus their fingerprint.
#[derive(Debug)]
pub struct SetupParams {
    params: Params<EqAffine>,
    k: u32,
    fingerprint: Fingerprint,
}

impl SetupParams {
    fn wrap(k: u32, params: Params<EqAffine>) -> Result<Self> {
        let mut bytes = Vec::new();
        params.write(&mut bytes)?;
        let fingerprint = fingerprint(&bytes);
        Ok(Self { params, k, fingerprint })
    }

    /// Reproducible parameters of size `2^k`.
    pub fn deterministic(k: u32) -> Result<Self> {
        info!(k, "generating deterministic setup parameters");
        Self::wrap(k, Params::<EqAffine>::new(k))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // The encoding opens with k as a little-endian u32.
        let k = bytes
            .get(..4)
            .and_then(|head| <[u8; 4]>::try_from(head).ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| VoteBatchError::serialization_error("setup parameters are truncated"))?;
        if k > MAX_K {
            return Err(VoteBatchError::serialization_error(format!(
                "setup parameters claim k = {}, at most {} is supported",
                k, MAX_K
            )));
        }
        let params = Params::<EqAffine>::read(&mut Cursor::new(bytes)).map_err(|e| {
            VoteBatchError::serialization_error(format!("invalid setup parameters: {}", e))
        })?;
        let setup = Self { params, k, fingerprint: fingerprint(bytes) };
        if setup.to_bytes()? != bytes {
            return Err(VoteBatchError::serialization_error(
                "setup parameters carry trailing or non-canonical bytes",
            ));
        }
        Ok(setup)
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let setup = Self::from_bytes(&bytes)?;
        info!(
            path = %path.as_ref().display(),
            k = setup.k(),
            fingerprint = %setup.fingerprint_hex(),
            "loaded setup parameters"
        );
        Ok(setup)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.params.write(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn params(&self) -> &Params<EqAffine> {
        &self.params
    }

    /// Blake2b over the serialized parameters, truncated to 32 bytes.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint)
    }
}

fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Blake2b512::new();
    hasher.update(b"votebatch/setup");
    hasher.update(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize()[..32]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deterministic_setup_is_reproducible() {
        let a = SetupParams::deterministic(4).unwrap();
        let b = SetupParams::deterministic(4).unwrap();
        assert_eq!(a.k(), 4);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), SetupParams::deterministic(5).unwrap().fingerprint());
    }

    #[test]
    fn test_bytes_round_trip() {
        let setup = SetupParams::deterministic(4).unwrap();
        let bytes = setup.to_bytes().unwrap();
        let loaded = SetupParams::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.k(), 4);
        assert_eq!(loaded.fingerprint(), setup.fingerprint());
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("params_k4.bin");
        let setup = SetupParams::deterministic(4).unwrap();
        setup.write_to_file(&path).unwrap();
        assert_eq!(SetupParams::read_from_file(&path).unwrap().fingerprint(), setup.fingerprint());
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        let bytes = SetupParams::deterministic(4).unwrap().to_bytes().unwrap();
        assert!(SetupParams::from_bytes(&bytes[..bytes.len() / 2]).is_err());
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(SetupParams::from_bytes(&trailing).is_err());
        assert!(SetupParams::read_from_file("/nonexistent/params.bin").is_err());
        assert!(SetupParams::from_bytes(&[4, 0]).is_err());
        assert!(SetupParams::from_bytes(&u32::MAX.to_le_bytes()).is_err());
    }
}
