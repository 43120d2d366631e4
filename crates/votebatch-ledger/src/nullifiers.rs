//! Spent nullifiers and the finalized tally
//!
//! Each finalized batch is one log line carrying both its nullifiers and its
//! counts, so the spent set and the poll totals are merged in a single write
//! and can never disagree after a restart.

use crate::store::AppendLog;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
};
use tracing::{debug, info};
use votebatch_circuit::{
    field::{fp_to_bytes, fp_to_hex, serde_fp_vec},
    Fp,
};
use votebatch_runtime::{BatchId, FieldBytes, Result, VoteBatchError};

#[derive(Debug, Serialize, Deserialize)]
struct MergedBatch {
    batch_id: BatchId,
    #[serde(with = "serde_fp_vec")]
    nullifiers: Vec<Fp>,
    counts: Vec<u64>,
}

/// Append-only set of spent nullifiers for one poll, with the totals of the
/// batches that spent them.
pub struct NullifierSet {
    spent: HashSet<FieldBytes>,
    merged: BTreeSet<BatchId>,
    tally: Vec<u64>,
    log: AppendLog<MergedBatch>,
}

impl Default for NullifierSet {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl NullifierSet {
    pub fn in_memory() -> Self {
        Self {
            spent: HashSet::new(),
            merged: BTreeSet::new(),
            tally: Vec::new(),
            log: AppendLog::in_memory(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (log, batches) = AppendLog::<MergedBatch>::open(path)?;
        let mut set = Self { log, ..Self::in_memory() };
        for batch in &batches {
            set.check_fresh(&batch.nullifiers)?;
            if !set.merged.insert(batch.batch_id) {
                return Err(VoteBatchError::serialization_error(format!(
                    "{} is merged twice in the nullifier log",
                    batch.batch_id
                )));
            }
            set.apply(batch);
        }
        info!(
            batches = set.merged.len(),
            nullifiers = set.spent.len(),
            tally = ?set.tally,
            "nullifier set loaded"
        );
        Ok(set)
    }

    fn apply(&mut self, batch: &MergedBatch) {
        self.spent.extend(batch.nullifiers.iter().map(fp_to_bytes));
        if self.tally.len() < batch.counts.len() {
            self.tally.resize(batch.counts.len(), 0);
        }
        for (total, count) in self.tally.iter_mut().zip(&batch.counts) {
            *total += count;
        }
    }

    pub fn contains(&self, nullifier: &Fp) -> bool {
        self.spent.contains(&fp_to_bytes(nullifier))
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }

    /// Whether a batch has already been merged.
    pub fn contains_batch(&self, batch_id: BatchId) -> bool {
        self.merged.contains(&batch_id)
    }

    /// Totals over every merged batch. Trailing options nobody voted for may
    /// be missing.
    pub fn tally(&self) -> &[u64] {
        &self.tally
    }

    /// Fail if any nullifier is already spent or repeats within `nullifiers`.
    pub fn check_fresh(&self, nullifiers: &[Fp]) -> Result<()> {
        let mut seen = HashSet::with_capacity(nullifiers.len());
        for nullifier in nullifiers {
            let key = fp_to_bytes(nullifier);
            if self.spent.contains(&key) {
                return Err(VoteBatchError::duplicate_nullifier(format!(
                    "{} is already spent",
                    fp_to_hex(nullifier)
                )));
            }
            if !seen.insert(key) {
                return Err(VoteBatchError::duplicate_nullifier(format!(
                    "{} repeats within the batch",
                    fp_to_hex(nullifier)
                )));
            }
        }
        Ok(())
    }

    /// Mark every nullifier of a batch spent and add its counts to the
    /// tally, or do neither.
    pub fn insert_batch(&mut self, batch_id: BatchId, nullifiers: &[Fp], counts: &[u64]) -> Result<()> {
        if self.merged.contains(&batch_id) {
            return Err(VoteBatchError::replay(format!("{} is already merged", batch_id)));
        }
        self.check_fresh(nullifiers)?;
        let batch = MergedBatch { batch_id, nullifiers: nullifiers.to_vec(), counts: counts.to_vec() };
        self.log.append(&batch)?;
        self.merged.insert(batch_id);
        self.apply(&batch);
        debug!(%batch_id, count = nullifiers.len(), "nullifiers marked spent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votebatch_runtime::ErrorKind;

    #[test]
    fn test_insert_and_contains() {
        let mut set = NullifierSet::in_memory();
        set.insert_batch(BatchId(0), &[Fp::from(1), Fp::from(2)], &[1, 1]).unwrap();
        assert!(set.contains(&Fp::from(1)));
        assert!(!set.contains(&Fp::from(3)));
        assert_eq!(set.len(), 2);
        assert!(set.contains_batch(BatchId(0)));
        assert_eq!(set.tally(), &[1, 1]);
    }

    #[test]
    fn test_tally_accumulates_across_batches() {
        let mut set = NullifierSet::in_memory();
        set.insert_batch(BatchId(0), &[Fp::from(1), Fp::from(2)], &[2, 0]).unwrap();
        set.insert_batch(BatchId(1), &[Fp::from(3)], &[0, 1, 0]).unwrap();
        assert_eq!(set.tally(), &[2, 1, 0]);
    }

    #[test]
    fn test_batch_merged_once() {
        let mut set = NullifierSet::in_memory();
        set.insert_batch(BatchId(4), &[Fp::from(1)], &[1]).unwrap();
        let err = set.insert_batch(BatchId(4), &[Fp::from(2)], &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplaySubmission);
        assert!(!set.contains(&Fp::from(2)));
        assert_eq!(set.tally(), &[1]);
    }

    #[test]
    fn test_spent_nullifier_rejects_whole_batch() {
        let mut set = NullifierSet::in_memory();
        set.insert_batch(BatchId(0), &[Fp::from(1)], &[1, 0]).unwrap();
        let err = set.insert_batch(BatchId(1), &[Fp::from(5), Fp::from(1)], &[0, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateNullifier);
        assert!(!set.contains(&Fp::from(5)));
        assert!(!set.contains_batch(BatchId(1)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.tally(), &[1, 0]);
    }

    #[test]
    fn test_repeat_within_batch_rejected() {
        let mut set = NullifierSet::in_memory();
        let err = set.insert_batch(BatchId(0), &[Fp::from(7), Fp::from(7)], &[2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateNullifier);
        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_batch_is_fine() {
        let mut set = NullifierSet::default();
        set.insert_batch(BatchId(3), &[], &[0, 0]).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.tally(), &[0, 0]);
    }
}
