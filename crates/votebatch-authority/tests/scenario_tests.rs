//! End-to-end scenarios with real halo2 proofs

mod common;

use common::*;
use votebatch_authority::{ChallengeStatus, CounterWitness, FinalizeOutcome};
use votebatch_circuit::{tally, ProofEngine, WitnessBuilder};
use votebatch_runtime::{BatchId, BatchState, ErrorKind};

#[test]
fn test_valid_batch_is_tallied_once() {
    let registry = registry();
    let (authority, clock) = authority(keys().1.clone(), registry.clone());
    let submission = prove(&registry, 1, &[(0, 0), (1, 1), (2, 0)]);
    assert_eq!(submission.claim.claimed_counts, vec![2, 1]);

    authority
        .submit(
            submission.batch_id,
            submission.bundle.public_signals(),
            submission.bundle.proof_bytes(),
            submission.claim.clone(),
        )
        .unwrap();
    clock.advance(WINDOW);
    assert_eq!(authority.finalize(BatchId(1)).unwrap(), FinalizeOutcome::Finalized);
    assert_eq!(authority.finalize(BatchId(1)).unwrap(), FinalizeOutcome::AlreadyFinalized);
    assert_eq!(authority.tally(), vec![2, 1]);
}

#[test]
fn test_aggregator_batches_settle_on_the_verdict() {
    let registry = registry();
    let (authority, _clock) = authority(keys().1.clone(), registry.clone());
    let (mut first, submission) = prove_batch(&registry, 1, &[(0, 1), (1, 1)]);
    let verdict = authority.submit(
        submission.batch_id,
        submission.bundle.public_signals(),
        submission.bundle.proof_bytes(),
        submission.claim,
    );
    first.settle(&verdict).unwrap();
    assert_eq!(first.state(), BatchState::Accepted);

    let (mut second, submission) = prove_batch(&registry, 2, &[(1, 0), (2, 0)]);
    let verdict = authority.submit(
        submission.batch_id,
        submission.bundle.public_signals(),
        submission.bundle.proof_bytes(),
        submission.claim,
    );
    assert_eq!(verdict.as_ref().unwrap_err().kind(), ErrorKind::DuplicateNullifier);
    second.settle(&verdict).unwrap();
    assert_eq!(second.state(), BatchState::Rejected);
    assert!(second.state().is_terminal());
}

#[test]
fn test_mismatched_counts_never_reach_the_authority() {
    let registry = registry();
    let votes = records(&[(0, 0), (1, 1), (2, 0)]);
    let tree = registry.read().unwrap().snapshot();
    let witness = WitnessBuilder::new(relation()).unwrap().build(&votes, &tree, &[1, 2]).unwrap();

    let err = ProofEngine::prove(&keys().0, &witness, rand::rngs::OsRng).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsatisfiedRelation);
    assert_eq!(tally(&votes, 2), vec![2, 1]);
}

#[test]
fn test_replayed_bundle_rejected() {
    let registry = registry();
    let (authority, _clock) = authority(keys().1.clone(), registry.clone());
    let submission = prove(&registry, 1, &[(3, 1)]);
    let public = submission.bundle.public_signals();
    let proof = submission.bundle.proof_bytes();

    authority.submit(BatchId(1), public, proof, submission.claim.clone()).unwrap();
    let err = authority.submit(BatchId(2), public, proof, submission.claim.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReplaySubmission);
    assert_eq!(authority.status(BatchId(2)), None);
}

#[test]
fn test_tampered_proof_rejected() {
    let registry = registry();
    let (authority, _clock) = authority(keys().1.clone(), registry.clone());
    let submission = prove(&registry, 1, &[(4, 0)]);
    let mut proof = submission.bundle.proof_bytes().to_vec();
    proof[10] ^= 0x01;

    let err = authority
        .submit(BatchId(1), submission.bundle.public_signals(), &proof, submission.claim)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VerificationFailure);
}

#[test]
fn test_double_vote_across_batches_rejected() {
    let registry = registry();
    let (authority, clock) = authority(keys().1.clone(), registry.clone());
    let first = prove(&registry, 1, &[(0, 0), (1, 0)]);
    authority
        .submit(first.batch_id, first.bundle.public_signals(), first.bundle.proof_bytes(), first.claim)
        .unwrap();
    clock.advance(WINDOW);
    authority.finalize(first.batch_id).unwrap();

    let second = prove(&registry, 2, &[(1, 1), (2, 1)]);
    let err = authority
        .submit(second.batch_id, second.bundle.public_signals(), second.bundle.proof_bytes(), second.claim)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateNullifier);
    assert_eq!(authority.status(second.batch_id), None);
    assert_eq!(authority.tally(), vec![2, 0]);
}

#[test]
fn test_non_member_challenge_rolls_back() {
    let registry = registry();
    let (authority, clock) = authority(keys().1.clone(), registry.clone());
    let mut submission = prove(&registry, 1, &[(0, 1), (5, 0)]);
    let nullifiers = submission.claim.nullifiers.clone();

    // The claim names a credential that only joins the tree after the
    // batch's root was taken.
    let late = voter(REGISTERED);
    submission.claim.credential_commitments[1] = late.commitment();
    authority
        .submit(
            submission.batch_id,
            submission.bundle.public_signals(),
            submission.bundle.proof_bytes(),
            submission.claim,
        )
        .unwrap();
    registry.write().unwrap().register(late.commitment()).unwrap();

    let status = authority
        .challenge(
            BatchId(1),
            "observer",
            CounterWitness::NonMemberCredential { commitment: late.commitment() },
        )
        .unwrap();
    assert_eq!(status, ChallengeStatus::Upheld);
    assert_eq!(authority.status(BatchId(1)), Some(BatchState::RolledBack));
    assert!(nullifiers.iter().all(|n| !authority.is_pending(n)));

    clock.advance(WINDOW);
    assert!(authority.finalize(BatchId(1)).is_err());
    assert_eq!(authority.tally(), vec![0, 0]);
}
