//! End to end with the halo2 proof engine

mod common;

use common::*;
use std::sync::Arc;
use votebatch_aggregator::BatchState;
use votebatch_circuit::{poseidon::counts_hash, KeyManager, ProofEngine, PublicSignals, SetupParams};

#[test]
fn test_parallel_batches_prove_and_verify() {
    let relation = relation();
    let setup = Arc::new(SetupParams::deterministic(relation.relation().min_k()).unwrap());
    let (pk, vk) = KeyManager::in_memory().keygen(setup, relation).unwrap();
    let pipeline = pipeline(registry(), Arc::new(pk));

    let batches = vec![frozen(0, &[(0, 0), (1, 1)]), frozen(1, &[(2, 1)])];
    for (batch, result) in pipeline.process_all(batches) {
        let submission = result.unwrap();
        assert_eq!(batch.state(), BatchState::Submitted);
        assert_eq!(batch.attempts(), 1);
        assert!(ProofEngine::verify_bundle(&vk, &submission.bundle));

        let public = PublicSignals::from_bundle(&submission.bundle).unwrap();
        assert_eq!(public.counts_hash, counts_hash(&submission.claim.claimed_counts));
        assert_eq!(Some(public.merkle_root), batch.merkle_root());
    }
}
