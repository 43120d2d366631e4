//! Vote collection into batches

use crate::batch::Batch;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};
use votebatch_circuit::{field::fp_to_hex, VoteRecord};
use votebatch_runtime::{BatchId, BatchState, Clock, FieldBytes, PollConfig, Result, VoteBatchError};

/// Accepts incoming votes into the collecting batch and seals it when it
/// is full or its voting window has closed.
///
/// Only nullifiers repeated within the collecting batch are rejected here;
/// cross-batch double votes are the authority's concern.
pub struct Collector {
    config: PollConfig,
    clock: Arc<dyn Clock>,
    current: Batch,
    nullifiers: HashSet<FieldBytes>,
    next_id: u64,
    sealed: Vec<Batch>,
}

impl Collector {
    pub fn new(config: PollConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::starting_at(config, clock, BatchId(0))
    }

    /// Number batches from `first`, e.g. to continue after a restart.
    pub fn starting_at(config: PollConfig, clock: Arc<dyn Clock>, first: BatchId) -> Result<Self> {
        config.validate()?;
        let current = Batch::open(first, clock.now());
        Ok(Self {
            config,
            clock,
            current,
            nullifiers: HashSet::new(),
            next_id: first.0 + 1,
            sealed: Vec::new(),
        })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn current(&self) -> &Batch {
        &self.current
    }

    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }

    /// Add a vote to the collecting batch and return the batch it joined.
    pub fn submit(&mut self, record: VoteRecord) -> Result<BatchId> {
        self.tick()?;
        record
            .validate(&self.config)
            .inspect_err(|err| warn!(error = %err, "vote record rejected"))?;

        let key = record.nullifier_key();
        if self.nullifiers.contains(&key) {
            warn!(batch = %self.current.id(), "nullifier repeated within collecting batch");
            return Err(VoteBatchError::duplicate_nullifier(format!(
                "{} already cast in {}",
                fp_to_hex(&record.nullifier),
                self.current.id()
            )));
        }

        let id = self.current.id();
        self.nullifiers.insert(key);
        self.current.push(record, self.clock.now());
        debug!(batch = %id, votes = self.current.len(), "vote collected");

        if self.current.len() >= self.config.batch_capacity {
            self.seal()?;
        }
        Ok(id)
    }

    /// Seal the collecting batch if its voting window has closed.
    pub fn tick(&mut self) -> Result<Option<BatchId>> {
        let elapsed = self.clock.now().saturating_sub(self.current.opened_at());
        if !self.current.is_empty() && elapsed >= self.config.voting_window_secs {
            return self.seal();
        }
        Ok(None)
    }

    /// Freeze the collecting batch now. Empty batches are never sealed.
    pub fn seal(&mut self) -> Result<Option<BatchId>> {
        if self.current.is_empty() {
            return Ok(None);
        }
        let next = Batch::open(BatchId(self.next_id), self.clock.now());
        self.next_id += 1;
        let mut batch = std::mem::replace(&mut self.current, next);
        self.nullifiers.clear();
        batch.transition(BatchState::Frozen)?;
        let id = batch.id();
        self.sealed.push(batch);
        Ok(Some(id))
    }

    /// Re-freeze the records of an aborted batch that its audit did not flag,
    /// under a fresh id, and queue them with the sealed batches.
    ///
    /// The flagged records stay on the aborted batch for operator review.
    /// Returns `None` when every record was flagged.
    pub fn requeue(&mut self, aborted: &Batch) -> Result<Option<BatchId>> {
        if aborted.state() != BatchState::Aborted || aborted.issues().is_empty() {
            return Err(VoteBatchError::invalid_transition(format!(
                "{} is {} with {} flagged records, only audited aborted batches are requeued",
                aborted.id(),
                aborted.state(),
                aborted.issues().len()
            )));
        }
        let survivors = aborted.survivors().ok_or_else(|| {
            VoteBatchError::invalid_shape(format!("{} was aborted for its shape", aborted.id()))
        })?;
        if survivors.is_empty() {
            warn!(batch = %aborted.id(), "every record flagged, nothing to requeue");
            return Ok(None);
        }
        let id = BatchId(self.next_id);
        self.next_id += 1;
        info!(from = %aborted.id(), batch = %id, votes = survivors.len(), dropped = aborted.len() - survivors.len(), "requeued unflagged records");
        self.sealed.push(Batch::frozen(id, survivors));
        Ok(Some(id))
    }

    /// Hand every sealed batch over to the caller.
    pub fn take_sealed(&mut self) -> Vec<Batch> {
        std::mem::take(&mut self.sealed)
    }
}
