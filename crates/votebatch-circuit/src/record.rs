//! Vote records and the public claim that accompanies a batch proof

use crate::{
    field::{fp_to_bytes, serde_fp, serde_fp_vec},
    poseidon,
    signature::{PublicKey, Signature},
};
use halo2curves::pasta::Fp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use votebatch_runtime::{FieldBytes, PollConfig, Result, VoteBatchError};

/// A cast vote as received by the aggregator.
///
/// `public_key` and `nullifier_preimage` are the voter's opening of the
/// credential commitment; they stay with the prover and never appear in a
/// [`BatchClaim`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(with = "serde_fp")]
    pub credential_commitment: Fp,
    pub poll_id: u64,
    pub vote_option: u64,
    #[serde(with = "serde_fp")]
    pub nullifier: Fp,
    pub signature: Signature,
    pub public_key: PublicKey,
    #[serde(with = "serde_fp")]
    pub nullifier_preimage: Fp,
}

impl VoteRecord {
    pub fn nullifier_key(&self) -> FieldBytes {
        fp_to_bytes(&self.nullifier)
    }

    /// Structural checks applied before a record enters a collecting batch.
    pub fn validate(&self, config: &PollConfig) -> Result<()> {
        if self.poll_id != config.poll_id {
            return Err(VoteBatchError::malformed_record(format!(
                "record is for poll {} but the batch collects poll {}",
                self.poll_id, config.poll_id
            )));
        }
        if self.vote_option >= config.max_options as u64 {
            return Err(VoteBatchError::malformed_record(format!(
                "vote option {} outside [0, {})",
                self.vote_option, config.max_options
            )));
        }
        PublicKey::from_xy(self.public_key.x(), self.public_key.y())?;
        if !crate::signature::is_on_curve(&self.signature.r_x, &self.signature.r_y) {
            return Err(VoteBatchError::malformed_record("signature nonce is not a Pallas point"));
        }
        Ok(())
    }
}

/// Tally the options of a record set.
pub fn tally(records: &[VoteRecord], max_options: usize) -> Vec<u64> {
    let mut counts = vec![0u64; max_options];
    for record in records {
        if let Some(count) = counts.get_mut(record.vote_option as usize) {
            *count += 1;
        }
    }
    counts
}

/// Public disclosure submitted next to a proof bundle: the tally the
/// proof commits to through `counts_hash`, and the batch's vote set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchClaim {
    pub claimed_counts: Vec<u64>,
    #[serde(with = "serde_fp_vec")]
    pub nullifiers: Vec<Fp>,
    #[serde(with = "serde_fp_vec")]
    pub credential_commitments: Vec<Fp>,
}

impl BatchClaim {
    pub fn from_records(records: &[VoteRecord], claimed_counts: Vec<u64>) -> Self {
        Self {
            claimed_counts,
            nullifiers: records.iter().map(|r| r.nullifier).collect(),
            credential_commitments: records.iter().map(|r| r.credential_commitment).collect(),
        }
    }

    pub fn counts_hash(&self) -> Fp {
        poseidon::counts_hash(&self.claimed_counts)
    }

    pub fn total_votes(&self) -> u64 {
        self.claimed_counts.iter().sum()
    }

    /// Internal consistency: one nullifier and one commitment per counted
    /// vote, no nullifier twice, and the expected number of options.
    pub fn check_consistency(&self, max_options: usize) -> Result<()> {
        if self.claimed_counts.len() != max_options {
            return Err(VoteBatchError::verification(format!(
                "claim has {} counts for a {}-option poll",
                self.claimed_counts.len(),
                max_options
            )));
        }
        let total = self.total_votes() as usize;
        if self.nullifiers.len() != total || self.credential_commitments.len() != total {
            return Err(VoteBatchError::verification(format!(
                "claim counts {} votes but lists {} nullifiers and {} commitments",
                total,
                self.nullifiers.len(),
                self.credential_commitments.len()
            )));
        }
        let mut seen = HashSet::with_capacity(total);
        for nullifier in &self.nullifiers {
            if !seen.insert(fp_to_bytes(nullifier)) {
                return Err(VoteBatchError::duplicate_nullifier(
                    "nullifier repeated within one batch claim",
                ));
            }
        }
        Ok(())
    }
}
