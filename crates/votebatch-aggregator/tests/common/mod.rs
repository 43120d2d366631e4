//! Fixtures for the aggregator integration tests
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, OnceLock,
};
use votebatch_aggregator::{Batch, BatchProver, Pipeline};
use votebatch_circuit::{BatchRelation, BatchWitness, Credential, RelationParams, VoteRecord, WitnessBuilder};
use votebatch_ledger::{CredentialRegistry, SharedRegistry};
use votebatch_runtime::{BatchId, PollConfig, ProofBundle, Result, VoteBatchError};

pub const POLL_ID: u64 = 9;
pub const REGISTERED: usize = 5;

pub fn config() -> PollConfig {
    PollConfig::new(POLL_ID, 2).with_batch_capacity(2).with_tree_depth(4).with_prove_attempts(3)
}

pub fn relation() -> Arc<BatchRelation> {
    static RELATION: OnceLock<Arc<BatchRelation>> = OnceLock::new();
    RELATION
        .get_or_init(|| BatchRelation::build(RelationParams::from_config(&config())).unwrap())
        .clone()
}

pub fn voter(i: usize) -> Credential {
    Credential::from_seed(format!("aggregator-voter-{}", i).as_bytes())
}

pub fn registry() -> SharedRegistry {
    let mut registry = CredentialRegistry::in_memory(config().tree_depth);
    for i in 0..REGISTERED {
        registry.register(voter(i).commitment()).unwrap();
    }
    registry.into_shared()
}

pub fn vote(i: usize, option: u64) -> VoteRecord {
    voter(i).cast_vote(POLL_ID, option)
}

pub fn frozen(id: u64, votes: &[(usize, u64)]) -> Batch {
    Batch::frozen(BatchId(id), votes.iter().map(|(i, option)| vote(*i, *option)).collect())
}

pub fn pipeline<P: BatchProver>(registry: SharedRegistry, prover: P) -> Pipeline<P> {
    Pipeline::new(config(), registry, WitnessBuilder::new(relation()).unwrap(), prover).unwrap()
}

/// Stands in for the proof engine: fails the first `failures` calls with a
/// retryable error, then returns a placeholder proof.
pub struct ScriptedProver {
    failures: u32,
    calls: AtomicU32,
    fatal: bool,
}

impl ScriptedProver {
    pub fn ok() -> Self {
        Self::flaky(0)
    }

    pub fn flaky(failures: u32) -> Self {
        Self { failures, calls: AtomicU32::new(0), fatal: false }
    }

    pub fn unsatisfied() -> Self {
        Self { failures: u32::MAX, calls: AtomicU32::new(0), fatal: true }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BatchProver for ScriptedProver {
    fn prove(&self, witness: &BatchWitness) -> Result<ProofBundle> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fatal {
            return Err(VoteBatchError::unsatisfied("arith gate #0 in 'tally' is violated"));
        }
        if call < self.failures {
            return Err(VoteBatchError::proof_engine("transient backend failure"));
        }
        Ok(ProofBundle::new(witness.public_signals().to_bytes(), vec![0x5a; 64]))
    }
}
