//! Proving and verification keys
//!
//! Keys are derived once from a relation and injected setup parameters by
//! the explicit [`KeyManager::keygen`] call. Nothing in proving or
//! verification regenerates them. halo2_proofs 0.3 has no stable key
//! serialization, so only [`KeyMetadata`] is persisted, as an audit record
//! of what each key was built from.

use super::{circuit::BatchCircuit, setup::SetupParams};
use crate::relation::{BatchRelation, RelationParams};
use halo2_proofs::plonk::{keygen_pk, keygen_vk};
use halo2curves::pasta::EqAffine;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;
use votebatch_runtime::{Result, VoteBatchError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub relation_name: String,
    pub params: RelationParams,
    pub k: u32,
    pub num_gates: usize,
    pub num_signals: usize,
    pub num_public_inputs: usize,
    /// Hex fingerprint of the setup parameters the keys were derived from.
    pub setup_fingerprint: String,
}

pub struct ProvingKey {
    inner: halo2_proofs::plonk::ProvingKey<EqAffine>,
    relation: Arc<BatchRelation>,
    setup: Arc<SetupParams>,
    metadata: KeyMetadata,
}

impl ProvingKey {
    pub fn relation(&self) -> &Arc<BatchRelation> {
        &self.relation
    }

    pub fn setup(&self) -> &SetupParams {
        &self.setup
    }

    pub fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }

    pub(crate) fn inner(&self) -> &halo2_proofs::plonk::ProvingKey<EqAffine> {
        &self.inner
    }
}

#[derive(Clone)]
pub struct VerificationKey {
    inner: halo2_proofs::plonk::VerifyingKey<EqAffine>,
    setup: Arc<SetupParams>,
    metadata: KeyMetadata,
}

impl VerificationKey {
    pub fn setup(&self) -> &SetupParams {
        &self.setup
    }

    pub fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }

    pub(crate) fn inner(&self) -> &halo2_proofs::plonk::VerifyingKey<EqAffine> {
        &self.inner
    }
}

/// Explicit key generation, with optional on-disk metadata records.
pub struct KeyManager {
    metadata_dir: Option<PathBuf>,
}

impl KeyManager {
    pub fn new<P: AsRef<Path>>(metadata_dir: P) -> Result<Self> {
        let metadata_dir = metadata_dir.as_ref().to_path_buf();
        fs::create_dir_all(&metadata_dir)?;
        Ok(Self { metadata_dir: Some(metadata_dir) })
    }

    pub fn in_memory() -> Self {
        Self { metadata_dir: None }
    }

    pub fn metadata_path(&self, relation_name: &str, k: u32) -> Option<PathBuf> {
        self.metadata_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_k{}_metadata.json", relation_name, k)))
    }

    pub fn keygen(
        &self,
        setup: Arc<SetupParams>,
        relation: Arc<BatchRelation>,
    ) -> Result<(ProvingKey, VerificationKey)> {
        let rel = relation.relation();
        if setup.k() < rel.min_k() {
            return Err(VoteBatchError::invalid_config(format!(
                "relation '{}' needs k >= {}, setup parameters have k = {}",
                rel.name(),
                rel.min_k(),
                setup.k()
            )));
        }
        let metadata = KeyMetadata {
            relation_name: rel.name().to_string(),
            params: *relation.params(),
            k: setup.k(),
            num_gates: rel.num_gates(),
            num_signals: rel.num_signals(),
            num_public_inputs: rel.num_public(),
            setup_fingerprint: setup.fingerprint_hex(),
        };
        info!(
            relation = %metadata.relation_name,
            k = metadata.k,
            gates = metadata.num_gates,
            setup = %metadata.setup_fingerprint,
            "generating proving and verification keys"
        );

        let circuit = BatchCircuit::shape(relation.clone());
        let vk = keygen_vk(setup.params(), &circuit).map_err(|e| {
            VoteBatchError::proof_engine(format!("verification key generation failed: {:?}", e))
        })?;
        let pk = keygen_pk(setup.params(), vk.clone(), &circuit).map_err(|e| {
            VoteBatchError::proof_engine(format!("proving key generation failed: {:?}", e))
        })?;

        self.save_metadata(&metadata)?;

        Ok((
            ProvingKey { inner: pk, relation, setup: setup.clone(), metadata: metadata.clone() },
            VerificationKey { inner: vk, setup, metadata },
        ))
    }

    fn save_metadata(&self, metadata: &KeyMetadata) -> Result<()> {
        let Some(path) = self.metadata_path(&metadata.relation_name, metadata.k) else {
            return Ok(());
        };
        fs::write(&path, serde_json::to_string_pretty(metadata)?)?;
        info!(path = %path.display(), "saved key metadata");
        Ok(())
    }

    pub fn load_metadata(&self, relation_name: &str, k: u32) -> Result<KeyMetadata> {
        let path = self.metadata_path(relation_name, k).ok_or_else(|| {
            VoteBatchError::invalid_config("in-memory key manager keeps no metadata")
        })?;
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}
