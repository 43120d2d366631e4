//! Fixtures for the authority integration tests
#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use votebatch_aggregator::{Batch, Pipeline, Submission};
use votebatch_authority::{Authority, BatchVerifier, ManualClock};
use votebatch_circuit::{
    tally, BatchClaim, BatchRelation, Credential, KeyManager, ProvingKey, RelationParams,
    SetupParams, VerificationKey, VoteRecord, WitnessBuilder,
};
use votebatch_ledger::{CredentialRegistry, NullifierSet, SharedRegistry};
use votebatch_runtime::{BatchId, FieldBytes, PollConfig};

pub const POLL_ID: u64 = 77;
pub const REGISTERED: usize = 6;
pub const WINDOW: u64 = 100;
pub const START: u64 = 1_000;

pub fn config() -> PollConfig {
    PollConfig::new(POLL_ID, 2)
        .with_batch_capacity(3)
        .with_tree_depth(4)
        .with_dispute_window(WINDOW)
}

pub fn voter(i: usize) -> Credential {
    Credential::from_seed(format!("authority-voter-{}", i).as_bytes())
}

pub fn registry() -> SharedRegistry {
    let mut registry = CredentialRegistry::in_memory(config().tree_depth);
    for i in 0..REGISTERED {
        registry.register(voter(i).commitment()).unwrap();
    }
    registry.into_shared()
}

pub fn records(votes: &[(usize, u64)]) -> Vec<VoteRecord> {
    votes.iter().map(|(i, option)| voter(*i).cast_vote(POLL_ID, *option)).collect()
}

pub fn authority<V: BatchVerifier>(
    verifier: V,
    registry: SharedRegistry,
) -> (Authority<V>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let authority =
        Authority::new(config(), verifier, registry, NullifierSet::in_memory(), clock.clone())
            .unwrap();
    (authority, clock)
}

/// Accepts every proof, so the authority's own checks can be exercised
/// without proving.
pub struct AcceptAll;

impl BatchVerifier for AcceptAll {
    fn verify(&self, _public_signals: &[FieldBytes], _proof_bytes: &[u8]) -> bool {
        true
    }
}

pub struct RejectAll;

impl BatchVerifier for RejectAll {
    fn verify(&self, _public_signals: &[FieldBytes], _proof_bytes: &[u8]) -> bool {
        false
    }
}

/// Public signals and claim an honest aggregator would submit for `votes`
/// against the registry's current root.
pub fn unproven(registry: &SharedRegistry, votes: &[(usize, u64)]) -> (Vec<FieldBytes>, BatchClaim) {
    let records = records(votes);
    let claim = BatchClaim::from_records(&records, tally(&records, config().max_options));
    let root = registry.read().unwrap().root();
    let public = votebatch_circuit::PublicSignals { merkle_root: root, counts_hash: claim.counts_hash() };
    (public.to_bytes(), claim)
}

pub fn relation() -> Arc<BatchRelation> {
    static RELATION: OnceLock<Arc<BatchRelation>> = OnceLock::new();
    RELATION
        .get_or_init(|| BatchRelation::build(RelationParams::from_config(&config())).unwrap())
        .clone()
}

pub fn keys() -> &'static (Arc<ProvingKey>, Arc<VerificationKey>) {
    static KEYS: OnceLock<(Arc<ProvingKey>, Arc<VerificationKey>)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let relation = relation();
        let setup = Arc::new(SetupParams::deterministic(relation.relation().min_k()).unwrap());
        let (pk, vk) = KeyManager::in_memory().keygen(setup, relation).unwrap();
        (Arc::new(pk), Arc::new(vk))
    })
}

/// Run a real proof through the aggregator pipeline, keeping the batch.
pub fn prove_batch(registry: &SharedRegistry, id: u64, votes: &[(usize, u64)]) -> (Batch, Submission) {
    let pipeline = Pipeline::new(
        config(),
        registry.clone(),
        WitnessBuilder::new(relation()).unwrap(),
        keys().0.clone(),
    )
    .unwrap();
    let (batch, result) = pipeline.process(Batch::frozen(BatchId(id), records(votes)));
    (batch, result.unwrap())
}

pub fn prove(registry: &SharedRegistry, id: u64, votes: &[(usize, u64)]) -> Submission {
    prove_batch(registry, id, votes).1
}
