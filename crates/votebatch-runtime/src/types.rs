//! Core types shared across the votebatch crates
//!
//! These types sit at trust boundaries: they are what the aggregator hands to
//! the authority and what gets persisted, so they carry field elements as
//! canonical little-endian byte strings rather than curve-library types.

use crate::{Result, VoteBatchError};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical little-endian encoding of a field element
pub type FieldBytes = [u8; 32];

/// Number of public signals exposed by a batch proof: `merkle_root`, `counts_hash`
pub const PUBLIC_SIGNAL_COUNT: usize = 2;

/// Upper bound on an encoded bundle, rejects absurd length prefixes early
pub const MAX_BUNDLE_BYTES: u64 = 1 << 24;

/// Identifier of a vote batch, unique within a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// The only artifact that crosses the prover/verifier trust boundary.
///
/// `public_signals` is exactly `[merkle_root, counts_hash]`; `proof_bytes` is
/// opaque to everything but the proof engine.
///
/// # Examples
///
/// ```
/// use votebatch_runtime::ProofBundle;
///
/// let bundle = ProofBundle::new(vec![[1u8; 32], [2u8; 32]], vec![7u8; 64]);
/// let bytes = bundle.to_bytes().unwrap();
/// assert_eq!(ProofBundle::from_bytes(&bytes).unwrap(), bundle);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    public_signals: Vec<FieldBytes>,
    proof_bytes: Vec<u8>,
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding().with_limit(MAX_BUNDLE_BYTES)
}

impl ProofBundle {
    pub fn new(public_signals: Vec<FieldBytes>, proof_bytes: Vec<u8>) -> Self {
        Self { public_signals, proof_bytes }
    }

    pub fn public_signals(&self) -> &[FieldBytes] {
        &self.public_signals
    }

    pub fn proof_bytes(&self) -> &[u8] {
        &self.proof_bytes
    }

    pub fn proof_size(&self) -> usize {
        self.proof_bytes.len()
    }

    /// Encode to the wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_shape()?;
        Ok(wire_options().serialize(self)?)
    }

    /// Decode from the wire format, rejecting trailing bytes and wrong arity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bundle: Self = wire_options().deserialize(bytes)?;
        bundle.check_shape()?;
        Ok(bundle)
    }

    fn check_shape(&self) -> Result<()> {
        if self.public_signals.len() != PUBLIC_SIGNAL_COUNT {
            return Err(VoteBatchError::serialization_error(format!(
                "expected {} public signals but got {}",
                PUBLIC_SIGNAL_COUNT,
                self.public_signals.len()
            )));
        }
        if self.proof_bytes.is_empty() {
            return Err(VoteBatchError::serialization_error("empty proof"));
        }
        Ok(())
    }
}
