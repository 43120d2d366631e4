//! Proof verification seam

use std::sync::Arc;
use votebatch_circuit::{ProofEngine, VerificationKey};
use votebatch_runtime::FieldBytes;

/// A pure, side-effect-free proof check.
pub trait BatchVerifier: Send + Sync {
    fn verify(&self, public_signals: &[FieldBytes], proof_bytes: &[u8]) -> bool;
}

impl BatchVerifier for VerificationKey {
    fn verify(&self, public_signals: &[FieldBytes], proof_bytes: &[u8]) -> bool {
        ProofEngine::verify(self, public_signals, proof_bytes)
    }
}

impl<T: BatchVerifier + ?Sized> BatchVerifier for Arc<T> {
    fn verify(&self, public_signals: &[FieldBytes], proof_bytes: &[u8]) -> bool {
        (**self).verify(public_signals, proof_bytes)
    }
}
