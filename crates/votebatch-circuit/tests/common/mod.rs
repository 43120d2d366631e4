//! Shared fixtures for the circuit integration tests
#![allow(dead_code)]

use ff::Field;
use std::sync::{Arc, OnceLock};
use votebatch_circuit::{
    relation::{Assignment, Signal, Source},
    BatchRelation, BatchWitness, Credential, Fp, KeyManager, MerkleTree, ProvingKey,
    RelationParams, SetupParams, VerificationKey, VoteRecord, WitnessBuilder,
};

pub const POLL_ID: u64 = 42;
pub const VOTERS: usize = 6;

pub fn params() -> RelationParams {
    RelationParams { poll_id: POLL_ID, max_options: 2, batch_capacity: 3, tree_depth: 4 }
}

pub fn relation() -> Arc<BatchRelation> {
    static RELATION: OnceLock<Arc<BatchRelation>> = OnceLock::new();
    RELATION.get_or_init(|| BatchRelation::build(params()).unwrap()).clone()
}

pub fn credentials() -> Vec<Credential> {
    (0..VOTERS).map(|i| Credential::from_seed(format!("voter-{}", i).as_bytes())).collect()
}

pub fn tree() -> MerkleTree {
    let leaves: Vec<Fp> = credentials().iter().map(|c| c.commitment()).collect();
    MerkleTree::from_leaves(params().tree_depth, &leaves).unwrap()
}

/// One vote per option, cast by voters 0, 1, 2, ...
pub fn votes(options: &[u64]) -> Vec<VoteRecord> {
    credentials().iter().zip(options).map(|(c, option)| c.cast_vote(POLL_ID, *option)).collect()
}

pub fn builder() -> WitnessBuilder {
    WitnessBuilder::new(relation()).unwrap()
}

pub fn witness(options: &[u64], claimed_counts: &[u64]) -> BatchWitness {
    builder().build(&votes(options), &tree(), claimed_counts).unwrap()
}

pub fn keys() -> &'static (ProvingKey, VerificationKey) {
    static KEYS: OnceLock<(ProvingKey, VerificationKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let relation = relation();
        let setup = Arc::new(SetupParams::deterministic(relation.relation().min_k()).unwrap());
        KeyManager::in_memory().keygen(setup, relation).unwrap()
    })
}

/// Re-solve a witness with one private input overridden.
pub fn tamper_private(witness: &BatchWitness, signal: Signal, value: Fp) -> Assignment {
    let relation = relation();
    let rel = relation.relation();
    let mut private = vec![Fp::ZERO; rel.num_private()];
    for (i, info) in rel.signals().iter().enumerate() {
        if let Source::Private(index) = info.source {
            private[index] = witness.assignment().values()[i];
        }
    }
    private[rel.private_index(signal).unwrap()] = value;
    rel.solve(witness.assignment().public(), &private).unwrap()
}

/// Re-solve a witness against different public inputs.
pub fn tamper_public(witness: &BatchWitness, public: &[Fp]) -> Assignment {
    let relation = relation();
    let rel = relation.relation();
    let mut private = vec![Fp::ZERO; rel.num_private()];
    for (i, info) in rel.signals().iter().enumerate() {
        if let Source::Private(index) = info.source {
            private[index] = witness.assignment().values()[i];
        }
    }
    rel.solve(public, &private).unwrap()
}
