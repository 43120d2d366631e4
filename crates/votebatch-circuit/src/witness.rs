//! Witness Builder
//!
//! Turns vote records, a credential tree snapshot and the claimed tally into
//! a full [`Assignment`] of the batch relation. Structural problems are
//! reported as typed errors before any signal is solved. Whether the votes
//! are actually valid (option range, signatures, tally) is left to the
//! relation itself.

use crate::{
    credential::Credential,
    engine::PublicSignals,
    field::fp_to_hex,
    merkle::{MerklePath, MerkleTree},
    poseidon,
    record::VoteRecord,
    relation::{Assignment, BatchRelation, Relation, Signal},
};
use ff::Field;
use halo2curves::pasta::Fp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use votebatch_runtime::{ErrorKind, Result, VoteBatchError};

const PADDING_SEED: &[u8] = b"votebatch/padding";

/// The vote filling an unused slot. Its inclusion check is gated off.
pub fn padding_record(poll_id: u64) -> VoteRecord {
    Credential::from_seed(PADDING_SEED).cast_vote(poll_id, 0)
}

/// One problem found by [`WitnessBuilder::audit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIssue {
    pub index: usize,
    pub kind: ErrorKind,
    pub reason: String,
}

/// A complete assignment for one batch, with the public signals it proves.
#[derive(Debug, Clone)]
pub struct BatchWitness {
    relation_name: String,
    assignment: Assignment,
    public_signals: PublicSignals,
    claimed_counts: Vec<u64>,
    records: usize,
}

impl BatchWitness {
    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn public_signals(&self) -> PublicSignals {
        self.public_signals
    }

    pub fn claimed_counts(&self) -> &[u64] {
        &self.claimed_counts
    }

    pub fn num_records(&self) -> usize {
        self.records
    }
}

pub struct WitnessBuilder {
    relation: Arc<BatchRelation>,
}

fn bit(value: bool) -> Fp {
    if value {
        Fp::ONE
    } else {
        Fp::ZERO
    }
}

struct PrivateInputs<'a> {
    relation: &'a Relation,
    values: Vec<Fp>,
}

impl PrivateInputs<'_> {
    fn set(&mut self, signal: Signal, value: Fp) -> Result<()> {
        let index = self.relation.private_index(signal).ok_or_else(|| {
            VoteBatchError::invalid_shape(format!("signal {} is not a private input", signal))
        })?;
        self.values[index] = value;
        Ok(())
    }
}

impl WitnessBuilder {
    /// Refuses a relation that does not lint clean.
    pub fn new(relation: Arc<BatchRelation>) -> Result<Self> {
        let report = relation.relation().lint();
        if !report.is_clean() {
            return Err(VoteBatchError::invalid_config(format!(
                "refusing to build witnesses for relation '{}':\n{}",
                relation.relation().name(),
                report
            )));
        }
        Ok(Self { relation })
    }

    pub fn relation(&self) -> &Arc<BatchRelation> {
        &self.relation
    }

    fn check_record(&self, index: usize, record: &VoteRecord, tree: &MerkleTree) -> Result<MerklePath> {
        let params = self.relation.params();
        if record.poll_id != params.poll_id {
            return Err(VoteBatchError::malformed_record(format!(
                "record {}: poll {} does not match batch poll {}",
                index, record.poll_id, params.poll_id
            )));
        }
        let position = tree.position(&record.credential_commitment).ok_or_else(|| {
            VoteBatchError::inclusion_failure(format!(
                "record {}: credential commitment {} is not a registered leaf",
                index,
                fp_to_hex(&record.credential_commitment)
            ))
        })?;
        let path = tree.path(position)?;
        if path.compute_root(record.credential_commitment) != tree.root() {
            return Err(VoteBatchError::inclusion_failure(format!(
                "record {}: Merkle path does not reconstruct the snapshot root",
                index
            )));
        }
        Ok(path)
    }

    fn check_shape(&self, records: usize, tree: &MerkleTree) -> Result<()> {
        let params = self.relation.params();
        if records > params.batch_capacity {
            return Err(VoteBatchError::invalid_shape(format!(
                "{} records exceed batch capacity {}",
                records, params.batch_capacity
            )));
        }
        if tree.depth() != params.tree_depth {
            return Err(VoteBatchError::invalid_shape(format!(
                "tree depth {} does not match relation depth {}",
                tree.depth(),
                params.tree_depth
            )));
        }
        Ok(())
    }

    /// Every offending record, for operator review.
    pub fn audit(&self, records: &[VoteRecord], tree: &MerkleTree) -> Vec<RecordIssue> {
        let mut issues = Vec::new();
        if let Err(err) = self.check_shape(records.len(), tree) {
            issues.push(RecordIssue { index: records.len(), kind: err.kind(), reason: err.to_string() });
        }
        for (index, record) in records.iter().enumerate() {
            if let Err(err) = self.check_record(index, record, tree) {
                issues.push(RecordIssue { index, kind: err.kind(), reason: err.to_string() });
            }
        }
        issues
    }

    /// Deterministic: the same inputs always give the same witness.
    pub fn build(
        &self,
        records: &[VoteRecord],
        tree: &MerkleTree,
        claimed_counts: &[u64],
    ) -> Result<BatchWitness> {
        let params = *self.relation.params();
        self.check_shape(records.len(), tree)?;
        if claimed_counts.len() != params.max_options {
            return Err(VoteBatchError::invalid_shape(format!(
                "{} claimed counts for {} options",
                claimed_counts.len(),
                params.max_options
            )));
        }
        let paths = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.check_record(index, record, tree))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|err| warn!(error = %err, "witness building rejected batch"))?;

        let relation = self.relation.relation();
        let mut private = PrivateInputs { relation, values: vec![Fp::ZERO; relation.num_private()] };

        let padding = padding_record(params.poll_id);
        let padding_path = MerklePath::empty(params.tree_depth);
        for (i, slot) in self.relation.slots().iter().enumerate() {
            let (record, path, active) = match records.get(i) {
                Some(record) => (record, &paths[i], true),
                None => (&padding, &padding_path, false),
            };
            private.set(slot.active, bit(active))?;
            private.set(slot.option, Fp::from(record.vote_option))?;
            private.set(slot.secret, record.nullifier_preimage)?;
            private.set(slot.public_key.x, record.public_key.x())?;
            private.set(slot.public_key.y, record.public_key.y())?;
            private.set(slot.leaf, record.credential_commitment)?;
            private.set(slot.nullifier, record.nullifier)?;
            for (signal, sibling) in slot.siblings.iter().zip(&path.siblings) {
                private.set(*signal, *sibling)?;
            }
            for (signal, is_right) in slot.path_bits.iter().zip(&path.indices) {
                private.set(*signal, bit(*is_right))?;
            }
            private.set(slot.nonce_point.x, record.signature.r_x)?;
            private.set(slot.nonce_point.y, record.signature.r_y)?;
            for (signal, s_bit) in slot.s_bits.iter().zip(record.signature.s_bits_msb()) {
                private.set(*signal, bit(s_bit))?;
            }
        }
        for (signal, count) in self.relation.claimed_counts().iter().zip(claimed_counts) {
            private.set(*signal, Fp::from(*count))?;
        }

        let public_signals = PublicSignals {
            merkle_root: tree.root(),
            counts_hash: poseidon::counts_hash(claimed_counts),
        };
        let assignment = relation.solve(&public_signals.to_instance(), &private.values)?;
        debug!(
            relation = relation.name(),
            records = records.len(),
            signals = assignment.values().len(),
            "built batch witness"
        );

        Ok(BatchWitness {
            relation_name: relation.name().to_string(),
            assignment,
            public_signals,
            claimed_counts: claimed_counts.to_vec(),
            records: records.len(),
        })
    }
}
