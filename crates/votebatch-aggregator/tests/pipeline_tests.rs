//! Pipeline behaviour with a scripted prover

mod common;

use common::*;
use std::sync::{Arc, PoisonError};
use votebatch_aggregator::{BatchState, Collector, Pipeline};
use votebatch_circuit::{Credential, WitnessBuilder};
use votebatch_runtime::{ErrorKind, ManualClock, PollConfig};

#[test]
fn test_collect_and_process_all() {
    let registry = registry();
    let root = registry.read().unwrap().root();
    let prover = Arc::new(ScriptedProver::ok());
    let pipeline = pipeline(registry, prover.clone());

    let mut collector = Collector::new(config(), Arc::new(ManualClock::new(0))).unwrap();
    for (i, option) in [(0, 0), (1, 1), (2, 0)] {
        collector.submit(vote(i, option)).unwrap();
    }
    collector.seal().unwrap();
    let sealed = collector.take_sealed();
    assert_eq!(sealed.len(), 2);

    let mut outcomes = pipeline.process_all(sealed);
    outcomes.sort_by_key(|(batch, _)| batch.id());

    let (first, result) = &outcomes[0];
    let submission = result.as_ref().unwrap();
    assert_eq!(first.state(), BatchState::Submitted);
    assert_eq!(first.merkle_root(), Some(root));
    assert_eq!(submission.batch_id, first.id());
    assert_eq!(submission.claim.claimed_counts, vec![1, 1]);
    assert_eq!(submission.claim.nullifiers.len(), 2);

    let (second, result) = &outcomes[1];
    assert_eq!(second.state(), BatchState::Submitted);
    assert_eq!(result.as_ref().unwrap().claim.claimed_counts, vec![1, 0]);
    assert_eq!(prover.calls(), 2);
}

#[test]
fn test_transient_failures_are_retried() {
    let prover = Arc::new(ScriptedProver::flaky(2));
    let pipeline = pipeline(registry(), prover.clone());
    let (batch, result) = pipeline.process(frozen(0, &[(0, 1)]));
    assert!(result.is_ok());
    assert_eq!(batch.state(), BatchState::Submitted);
    assert_eq!(batch.attempts(), 3);
    assert_eq!(prover.calls(), 3);
}

#[test]
fn test_retries_are_bounded() {
    let prover = Arc::new(ScriptedProver::flaky(10));
    let pipeline = pipeline(registry(), prover.clone());
    let (batch, result) = pipeline.process(frozen(0, &[(0, 1)]));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ProofEngineFailure);
    assert_eq!(batch.state(), BatchState::Failed);
    assert_eq!(batch.attempts(), 3);
    assert_eq!(prover.calls(), 3);
    assert!(batch.bundle().is_none());
}

#[test]
fn test_unsatisfied_relation_is_not_retried() {
    let prover = Arc::new(ScriptedProver::unsatisfied());
    let pipeline = pipeline(registry(), prover.clone());
    let (batch, result) = pipeline.process(frozen(0, &[(0, 1)]));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::UnsatisfiedRelation);
    assert_eq!(batch.state(), BatchState::Aborted);
    assert_eq!(prover.calls(), 1);
}

#[test]
fn test_unregistered_credential_aborts_before_proving() {
    let prover = Arc::new(ScriptedProver::ok());
    let pipeline = pipeline(registry(), prover.clone());
    let stranger = Credential::from_seed(b"not registered").cast_vote(POLL_ID, 0);
    let batch = votebatch_aggregator::Batch::frozen(
        votebatch_runtime::BatchId(4),
        vec![vote(0, 0), stranger],
    );

    let (batch, result) = pipeline.process(batch);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InclusionFailure);
    assert_eq!(batch.state(), BatchState::Aborted);
    assert_eq!(batch.issues().len(), 1);
    assert_eq!(batch.issues()[0].index, 1);
    assert_eq!(batch.len(), 2);
    assert_eq!(prover.calls(), 0);
}

#[test]
fn test_unregistered_credential_is_dropped_and_the_rest_submitted() {
    let prover = Arc::new(ScriptedProver::ok());
    let pipeline = pipeline(registry(), prover.clone());
    let mut collector = Collector::new(config(), Arc::new(ManualClock::new(0))).unwrap();
    let stranger = Credential::from_seed(b"not registered").cast_vote(POLL_ID, 0);
    collector.submit(stranger).unwrap();
    collector.submit(vote(3, 1)).unwrap();

    let (aborted, result) = pipeline.process(collector.take_sealed().remove(0));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InclusionFailure);
    assert_eq!(aborted.issues()[0].index, 0);

    let requeued = collector.requeue(&aborted).unwrap().unwrap();
    assert_ne!(requeued, aborted.id());
    let mut sealed = collector.take_sealed();
    assert_eq!(sealed.len(), 1);
    assert_eq!(sealed[0].records(), &[vote(3, 1)]);

    let (batch, result) = pipeline.process(sealed.remove(0));
    let submission = result.unwrap();
    assert_eq!(batch.state(), BatchState::Submitted);
    assert_eq!(submission.batch_id, requeued);
    assert_eq!(submission.claim.claimed_counts, vec![0, 1]);
    assert_eq!(submission.claim.nullifiers, vec![vote(3, 1).nullifier]);
    assert_eq!(prover.calls(), 1);
}

#[test]
fn test_requeue_needs_flagged_records() {
    let prover = Arc::new(ScriptedProver::unsatisfied());
    let pipeline = pipeline(registry(), prover);
    let mut collector = Collector::new(config(), Arc::new(ManualClock::new(0))).unwrap();

    let (aborted, _) = pipeline.process(frozen(0, &[(0, 1)]));
    assert_eq!(aborted.state(), BatchState::Aborted);
    let err = collector.requeue(&aborted).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let err = collector.requeue(&frozen(1, &[(1, 1)])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(collector.sealed_len(), 0);
}

#[test]
fn test_requeue_of_fully_flagged_batch_is_empty() {
    let pipeline = pipeline(registry(), ScriptedProver::ok());
    let mut collector = Collector::new(config(), Arc::new(ManualClock::new(0))).unwrap();
    let strangers = (0..2)
        .map(|i| Credential::from_seed(format!("stranger-{}", i).as_bytes()).cast_vote(POLL_ID, 1))
        .collect();
    let (aborted, _) = pipeline.process(votebatch_aggregator::Batch::frozen(
        votebatch_runtime::BatchId(0),
        strangers,
    ));
    assert_eq!(aborted.issues().len(), 2);
    assert_eq!(collector.requeue(&aborted).unwrap(), None);
    assert_eq!(collector.sealed_len(), 0);
}

#[test]
fn test_witness_pins_the_snapshot_root() {
    let registry = registry();
    let pipeline = pipeline(registry.clone(), ScriptedProver::ok());
    let mut batch = frozen(0, &[(0, 0)]);
    let witness = pipeline.witness(&mut batch).unwrap();
    let snapshot_root = batch.merkle_root().unwrap();

    registry
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(voter(REGISTERED).commitment())
        .unwrap();

    assert_eq!(witness.public_signals().merkle_root, snapshot_root);
    assert_ne!(registry.read().unwrap().root(), snapshot_root);
    assert!(pipeline.witness(&mut batch).is_err());
}

#[test]
fn test_submit_requires_a_proof() {
    let pipeline = pipeline(registry(), ScriptedProver::ok());
    let mut batch = frozen(0, &[(0, 0)]);
    let err = pipeline.submit(&mut batch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(batch.state(), BatchState::Frozen);
}

#[test]
fn test_pipeline_rejects_mismatched_relation() {
    let other = PollConfig::new(POLL_ID, 3).with_batch_capacity(2).with_tree_depth(4);
    let result = Pipeline::new(
        other,
        registry(),
        WitnessBuilder::new(relation()).unwrap(),
        ScriptedProver::ok(),
    );
    assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidConfig));
}
