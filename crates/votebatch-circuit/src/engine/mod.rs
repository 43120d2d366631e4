//! Proof Engine
//!
//! Setup parameters are injected ([`SetupParams`]), keys are generated by an
//! explicit call ([`KeyManager::keygen`]), and [`ProofEngine`] proves and
//! verifies against them.

pub mod circuit;
pub mod keys;
pub mod prover;
pub mod setup;

pub use circuit::BatchCircuit;
pub use keys::{KeyManager, KeyMetadata, ProvingKey, VerificationKey};
pub use prover::ProofEngine;
pub use setup::SetupParams;

use crate::field::{fp_from_bytes, fp_to_bytes, serde_fp};
use halo2curves::pasta::Fp;
use serde::{Deserialize, Serialize};
use votebatch_runtime::{FieldBytes, ProofBundle, Result, VoteBatchError, PUBLIC_SIGNAL_COUNT};

/// The two public inputs of the batch relation, in instance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    #[serde(with = "serde_fp")]
    pub merkle_root: Fp,
    #[serde(with = "serde_fp")]
    pub counts_hash: Fp,
}

impl PublicSignals {
    pub fn to_instance(&self) -> [Fp; 2] {
        [self.merkle_root, self.counts_hash]
    }

    pub fn to_bytes(&self) -> Vec<FieldBytes> {
        vec![fp_to_bytes(&self.merkle_root), fp_to_bytes(&self.counts_hash)]
    }

    pub fn from_bytes(signals: &[FieldBytes]) -> Result<Self> {
        match signals {
            [root, counts] => {
                Ok(Self { merkle_root: fp_from_bytes(root)?, counts_hash: fp_from_bytes(counts)? })
            }
            _ => Err(VoteBatchError::verification(format!(
                "expected {} public signals, got {}",
                PUBLIC_SIGNAL_COUNT,
                signals.len()
            ))),
        }
    }

    pub fn from_bundle(bundle: &ProofBundle) -> Result<Self> {
        Self::from_bytes(bundle.public_signals())
    }
}
