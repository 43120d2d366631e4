//! A vote batch and its lifecycle

use tracing::{info, warn};
use votebatch_circuit::{Fp, RecordIssue, VoteRecord};
use votebatch_runtime::{BatchId, BatchState, ProofBundle, Result, VoteBatchError};

/// One batch, owned by exactly one stage of the pipeline at a time.
///
/// `Batch` is deliberately not `Clone`: advancing it requires `&mut`, so two
/// workers can never move the same batch concurrently.
#[derive(Debug)]
pub struct Batch {
    id: BatchId,
    state: BatchState,
    opened_at: u64,
    records: Vec<VoteRecord>,
    merkle_root: Option<Fp>,
    claimed_counts: Vec<u64>,
    issues: Vec<RecordIssue>,
    attempts: u32,
    bundle: Option<ProofBundle>,
}

impl Batch {
    pub(crate) fn open(id: BatchId, opened_at: u64) -> Self {
        Self {
            id,
            state: BatchState::Collecting,
            opened_at,
            records: Vec::new(),
            merkle_root: None,
            claimed_counts: Vec::new(),
            issues: Vec::new(),
            attempts: 0,
            bundle: None,
        }
    }

    /// A frozen batch built directly from records, bypassing collection.
    pub fn frozen(id: BatchId, records: Vec<VoteRecord>) -> Self {
        let mut batch = Self::open(id, 0);
        batch.records = records;
        batch.state = BatchState::Frozen;
        batch
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn opened_at(&self) -> u64 {
        self.opened_at
    }

    pub fn records(&self) -> &[VoteRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Credential root the batch was witnessed against.
    pub fn merkle_root(&self) -> Option<Fp> {
        self.merkle_root
    }

    pub fn claimed_counts(&self) -> &[u64] {
        &self.claimed_counts
    }

    /// Records that stopped the batch, for operator review.
    pub fn issues(&self) -> &[RecordIssue] {
        &self.issues
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn bundle(&self) -> Option<&ProofBundle> {
        self.bundle.as_ref()
    }

    pub fn transition(&mut self, next: BatchState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(VoteBatchError::invalid_transition(format!(
                "{}: {} -> {}",
                self.id, self.state, next
            )));
        }
        info!(batch = %self.id, from = %self.state, to = %next, "batch transition");
        self.state = next;
        Ok(())
    }

    /// Record the authority's answer to a submitted batch: `Accepted` on
    /// success, `Rejected` otherwise.
    pub fn settle<T>(&mut self, verdict: &Result<T>) -> Result<()> {
        match verdict {
            Ok(_) => self.transition(BatchState::Accepted),
            Err(err) => {
                warn!(batch = %self.id, kind = %err.kind(), error = %err, "submission rejected by authority");
                self.transition(BatchState::Rejected)
            }
        }
    }

    /// Records the audit did not flag, in their original order.
    ///
    /// `None` when the batch shape itself was flagged, since then no subset
    /// of the records is known to be good.
    pub fn survivors(&self) -> Option<Vec<VoteRecord>> {
        if self.issues.iter().any(|issue| issue.index >= self.records.len()) {
            return None;
        }
        let survivors = self
            .records
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.issues.iter().any(|issue| issue.index == *index))
            .map(|(_, record)| record.clone())
            .collect();
        Some(survivors)
    }

    pub(crate) fn push(&mut self, record: VoteRecord, now: u64) {
        if self.records.is_empty() {
            self.opened_at = now;
        }
        self.records.push(record);
    }

    pub(crate) fn set_witnessed(&mut self, merkle_root: Fp, claimed_counts: Vec<u64>) {
        self.merkle_root = Some(merkle_root);
        self.claimed_counts = claimed_counts;
    }

    pub(crate) fn set_issues(&mut self, issues: Vec<RecordIssue>) {
        self.issues = issues;
    }

    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn attach_bundle(&mut self, bundle: ProofBundle) {
        self.bundle = Some(bundle);
    }
}
