//! Freeze, witness, prove and submit sealed batches

use crate::batch::Batch;
use rand::rngs::OsRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};
use tracing::{info, info_span, warn};
use votebatch_circuit::{
    tally, BatchClaim, BatchWitness, ProofEngine, ProvingKey, RelationParams, WitnessBuilder,
};
use votebatch_ledger::SharedRegistry;
use votebatch_runtime::{BatchId, BatchState, PollConfig, ProofBundle, Result, VoteBatchError};

/// Produces a proof bundle for a witness.
///
/// Each call must draw fresh prover randomness, so a retry after a
/// `ProofEngineFailure` is a genuinely new attempt.
pub trait BatchProver: Send + Sync {
    fn prove(&self, witness: &BatchWitness) -> Result<ProofBundle>;
}

impl BatchProver for ProvingKey {
    fn prove(&self, witness: &BatchWitness) -> Result<ProofBundle> {
        ProofEngine::prove(self, witness, OsRng)
    }
}

impl<T: BatchProver + ?Sized> BatchProver for Arc<T> {
    fn prove(&self, witness: &BatchWitness) -> Result<ProofBundle> {
        (**self).prove(witness)
    }
}

/// What the aggregator hands to the authority for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub batch_id: BatchId,
    pub bundle: ProofBundle,
    pub claim: BatchClaim,
}

pub struct Pipeline<P> {
    config: PollConfig,
    registry: SharedRegistry,
    builder: WitnessBuilder,
    prover: P,
}

impl<P: BatchProver> Pipeline<P> {
    pub fn new(
        config: PollConfig,
        registry: SharedRegistry,
        builder: WitnessBuilder,
        prover: P,
    ) -> Result<Self> {
        config.validate()?;
        let expected = RelationParams::from_config(&config);
        let actual = *builder.relation().params();
        if expected != actual {
            return Err(VoteBatchError::invalid_config(format!(
                "relation '{}' does not match poll configuration '{}'",
                actual.name(),
                expected.name()
            )));
        }
        Ok(Self { config, registry, builder, prover })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Snapshot the credential tree and build the witness with the batch's
    /// honest tally.
    ///
    /// On failure every offending record is attached to the batch and the
    /// batch is aborted. [`Collector::requeue`](crate::Collector::requeue)
    /// carries the unflagged records on in a fresh batch.
    pub fn witness(&self, batch: &mut Batch) -> Result<BatchWitness> {
        if batch.state() != BatchState::Frozen {
            return Err(VoteBatchError::invalid_transition(format!(
                "{} is {}, only frozen batches are witnessed",
                batch.id(),
                batch.state()
            )));
        }
        let tree = self.registry.read().unwrap_or_else(PoisonError::into_inner).snapshot();
        let claimed_counts = tally(batch.records(), self.config.max_options);

        match self.builder.build(batch.records(), &tree, &claimed_counts) {
            Ok(witness) => {
                batch.set_witnessed(witness.public_signals().merkle_root, claimed_counts);
                batch.transition(BatchState::Witnessed)?;
                Ok(witness)
            }
            Err(err) => {
                let issues = self.builder.audit(batch.records(), &tree);
                for issue in &issues {
                    warn!(batch = %batch.id(), record = issue.index, kind = %issue.kind, reason = %issue.reason, "record needs operator review");
                }
                batch.set_issues(issues);
                batch.transition(BatchState::Aborted)?;
                Err(err)
            }
        }
    }

    /// Prove with up to `max_prove_attempts` attempts.
    ///
    /// Only `ProofEngineFailure` is retried. An unsatisfiable witness aborts
    /// the batch at once; running out of attempts marks it failed.
    pub fn prove(&self, batch: &mut Batch, witness: &BatchWitness) -> Result<()> {
        let max_attempts = self.config.max_prove_attempts;
        loop {
            let attempt = batch.record_attempt();
            match self.prover.prove(witness) {
                Ok(bundle) => {
                    batch.attach_bundle(bundle);
                    return batch.transition(BatchState::Proved);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(batch = %batch.id(), attempt, max_attempts, error = %err, "proving failed, retrying");
                }
                Err(err) if err.is_retryable() => {
                    warn!(batch = %batch.id(), attempt, error = %err, "proving attempts exhausted");
                    batch.transition(BatchState::Failed)?;
                    return Err(err);
                }
                Err(err) => {
                    warn!(batch = %batch.id(), error = %err, "batch cannot be proved");
                    batch.transition(BatchState::Aborted)?;
                    return Err(err);
                }
            }
        }
    }

    pub fn submit(&self, batch: &mut Batch) -> Result<Submission> {
        let bundle = batch.bundle().cloned().ok_or_else(|| {
            VoteBatchError::invalid_transition(format!("{} has no proof to submit", batch.id()))
        })?;
        batch.transition(BatchState::Submitted)?;
        let claim = BatchClaim::from_records(batch.records(), batch.claimed_counts().to_vec());
        Ok(Submission { batch_id: batch.id(), bundle, claim })
    }

    fn run(&self, batch: &mut Batch) -> Result<Submission> {
        let witness = self.witness(batch)?;
        self.prove(batch, &witness)?;
        self.submit(batch)
    }

    /// Drive one frozen batch to `Submitted`.
    pub fn process(&self, mut batch: Batch) -> (Batch, Result<Submission>) {
        let _span = info_span!("batch", id = %batch.id(), votes = batch.len()).entered();
        let result = self.run(&mut batch);
        (batch, result)
    }

    /// Process distinct batches in parallel, one worker per batch.
    pub fn process_all(&self, batches: Vec<Batch>) -> Vec<(Batch, Result<Submission>)> {
        info!(batches = batches.len(), "processing sealed batches");
        batches.into_par_iter().map(|batch| self.process(batch)).collect()
    }
}
