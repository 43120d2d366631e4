//! Challenges against accepted batches

use serde::{Deserialize, Serialize};
use std::fmt;
use votebatch_circuit::{field::serde_fp, Fp};
use votebatch_runtime::BatchId;

/// Public evidence that an accepted batch's claim is inconsistent with the
/// credential and nullifier state on record.
///
/// Each variant is checked deterministically from public data; no proof
/// accompanies a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CounterWitness {
    /// A nullifier of the batch is spent, claimed by another live batch, or
    /// listed twice in the batch's own claim.
    DuplicateNullifier {
        #[serde(with = "serde_fp")]
        nullifier: Fp,
    },
    /// A commitment of the batch was not a leaf of the tree at the batch's
    /// `merkle_root`.
    NonMemberCredential {
        #[serde(with = "serde_fp")]
        commitment: Fp,
    },
    /// The batch's `merkle_root` is not in the credential root history.
    UnknownRoot,
}

impl fmt::Display for CounterWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNullifier { .. } => f.write_str("duplicate nullifier"),
            Self::NonMemberCredential { .. } => f.write_str("non-member credential"),
            Self::UnknownRoot => f.write_str("unknown root"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Upheld,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub batch_id: BatchId,
    pub challenger: String,
    pub counter_witness: CounterWitness,
    pub status: ChallengeStatus,
    pub submitted_at: u64,
}
