//! Vote signatures: Schnorr over Pallas with a Poseidon challenge
//!
//! Pallas points have coordinates in `Fp`, the relation's field, so the
//! verification equation `s·G == R + e·pk` is native arithmetic inside the
//! relation. The challenge is a Poseidon hash for the same reason.

use crate::{field::serde_fp, poseidon::hash2};
use blake2::{Blake2b512, Digest};
use ff::{Field, FromUniformBytes, PrimeField};
use group::{Curve, Group};
use halo2curves::{
    pasta::{pallas, Fp},
    Coordinates, CurveAffine,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use votebatch_runtime::{FieldBytes, Result, VoteBatchError};

/// Bits of a Pallas scalar processed by the relation's double-and-add.
pub const SCALAR_BITS: usize = 255;

fn scalar_from_digest(parts: &[&[u8]]) -> pallas::Scalar {
    let mut hasher = Blake2b512::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    pallas::Scalar::from_uniform_bytes(&wide)
}

/// Affine coordinates, `None` for the identity.
pub fn affine_xy(point: &pallas::Affine) -> Option<(Fp, Fp)> {
    let coordinates: Option<Coordinates<pallas::Affine>> = point.coordinates().into();
    coordinates.map(|c| (*c.x(), *c.y()))
}

pub fn generator_xy() -> (Fp, Fp) {
    // (-1, 2) on y^2 = x^3 + 5
    (-Fp::ONE, Fp::from(2))
}

/// Starting point of every in-relation scalar multiplication, so the
/// accumulator never passes through the identity.
pub fn offset_xy() -> (Fp, Fp) {
    static OFFSET: OnceLock<(Fp, Fp)> = OnceLock::new();
    *OFFSET.get_or_init(|| {
        let mut counter = 0u32;
        loop {
            let k = scalar_from_digest(&[b"votebatch/offset-point", &counter.to_le_bytes()]);
            if let Some(xy) = affine_xy(&(pallas::Point::generator() * k).to_affine()) {
                return xy;
            }
            counter += 1;
        }
    })
}

/// Embed a base-field challenge as a scalar. `p < q` on Pallas, so the
/// integer value is preserved.
pub fn challenge_scalar(e: &Fp) -> pallas::Scalar {
    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&e.to_repr());
    pallas::Scalar::from_uniform_bytes(&wide)
}

/// `SCALAR_BITS` bits of a little-endian scalar encoding, most significant first.
pub fn scalar_bits_msb(repr: &FieldBytes) -> Vec<bool> {
    (0..SCALAR_BITS).rev().map(|i| (repr[i / 8] >> (i % 8)) & 1 == 1).collect()
}

pub fn is_on_curve(x: &Fp, y: &Fp) -> bool {
    y.square() == x.square() * x + Fp::from(5)
}

#[derive(Clone)]
pub struct SigningKey(pallas::Scalar);

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl SigningKey {
    pub fn random(mut rng: impl RngCore) -> Self {
        loop {
            let sk = pallas::Scalar::random(&mut rng);
            if !bool::from(sk.is_zero()) {
                return Self(sk);
            }
        }
    }

    /// Deterministic key derivation, for fixtures and padding votes.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(scalar_from_digest(&[b"votebatch/signing-key", seed]))
    }

    pub fn public_key(&self) -> PublicKey {
        let (x, y) = affine_xy(&(pallas::Point::generator() * self.0).to_affine())
            .unwrap_or_else(generator_xy);
        PublicKey { x, y }
    }

    /// Sign a message with a nonce derived from the key and the message.
    pub fn sign(&self, msg: Fp) -> Signature {
        let pk_hash = self.public_key().hash();
        let mut counter = 0u32;
        loop {
            let k = scalar_from_digest(&[
                b"votebatch/nonce",
                &self.0.to_repr(),
                &msg.to_repr(),
                &counter.to_le_bytes(),
            ]);
            if let Some((r_x, r_y)) = affine_xy(&(pallas::Point::generator() * k).to_affine()) {
                let e = challenge(r_x, r_y, pk_hash, msg);
                let s = k + challenge_scalar(&e) * self.0;
                return Signature { r_x, r_y, s: s.to_repr() };
            }
            counter += 1;
        }
    }
}

/// Affine Pallas public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "serde_fp")]
    x: Fp,
    #[serde(with = "serde_fp")]
    y: Fp,
}

impl PublicKey {
    pub fn from_xy(x: Fp, y: Fp) -> Result<Self> {
        if !is_on_curve(&x, &y) {
            return Err(VoteBatchError::malformed_record("public key is not a Pallas point"));
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> Fp {
        self.x
    }

    pub fn y(&self) -> Fp {
        self.y
    }

    pub fn hash(&self) -> Fp {
        hash2(self.x, self.y)
    }

    fn to_affine(self) -> Option<pallas::Affine> {
        Option::from(pallas::Affine::from_xy(self.x, self.y))
    }
}

/// Schnorr signature `(R, s)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "serde_fp")]
    pub r_x: Fp,
    #[serde(with = "serde_fp")]
    pub r_y: Fp,
    #[serde(with = "hex_repr")]
    pub s: FieldBytes,
}

mod hex_repr {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use votebatch_runtime::FieldBytes;

    pub fn serialize<S: Serializer>(bytes: &FieldBytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FieldBytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        bytes.try_into().map_err(|_| D::Error::custom("expected 32 bytes"))
    }
}

impl Signature {
    pub fn s_bits_msb(&self) -> Vec<bool> {
        scalar_bits_msb(&self.s)
    }
}

pub fn challenge(r_x: Fp, r_y: Fp, pk_hash: Fp, msg: Fp) -> Fp {
    hash2(hash2(r_x, r_y), hash2(pk_hash, msg))
}

/// Native verification, the reference for the relation's signature check.
pub fn verify(pk: &PublicKey, msg: Fp, sig: &Signature) -> bool {
    let Some(pk_point) = pk.to_affine() else {
        return false;
    };
    let Some(r_point) = Option::<pallas::Affine>::from(pallas::Affine::from_xy(sig.r_x, sig.r_y))
    else {
        return false;
    };
    let Some(s) = Option::<pallas::Scalar>::from(pallas::Scalar::from_repr(sig.s)) else {
        return false;
    };
    let e = challenge(sig.r_x, sig.r_y, pk.hash(), msg);
    let lhs = pallas::Point::generator() * s;
    let rhs = pallas::Point::from(r_point) + pallas::Point::from(pk_point) * challenge_scalar(&e);
    lhs == rhs
}
