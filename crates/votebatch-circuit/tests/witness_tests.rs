//! Witness Builder tests

mod common;

use common::*;
use votebatch_circuit::{Credential, Fp, MerkleTree, PublicSignals};
use votebatch_runtime::ErrorKind;

#[test]
fn test_witness_is_deterministic() {
    let a = witness(&[0, 1, 0], &[2, 1]);
    let b = witness(&[0, 1, 0], &[2, 1]);
    assert_eq!(a.assignment(), b.assignment());
    assert_eq!(a.public_signals(), b.public_signals());
}

#[test]
fn test_public_signals_follow_tree_and_counts() {
    let witness = witness(&[0, 1, 0], &[2, 1]);
    assert_eq!(witness.public_signals(), PublicSignals {
        merkle_root: tree().root(),
        counts_hash: votebatch_circuit::poseidon::counts_hash(&[2, 1]),
    });
    assert_eq!(witness.claimed_counts(), &[2, 1]);
}

#[test]
fn test_mismatched_counts_still_build() {
    // the relation, not the builder, rejects a wrong tally
    assert!(builder().build(&votes(&[0, 1, 0]), &tree(), &[1, 2]).is_ok());
}

#[test]
fn test_too_many_records_rejected() {
    let err = builder().build(&votes(&[0, 1, 0, 1]), &tree(), &[2, 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBatchShape);
}

#[test]
fn test_claimed_counts_arity_checked() {
    let err = builder().build(&votes(&[0]), &tree(), &[1, 0, 0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBatchShape);
}

#[test]
fn test_tree_depth_checked() {
    let shallow = MerkleTree::from_leaves(3, &[Fp::from(1)]).unwrap();
    let err = builder().build(&votes(&[0]), &shallow, &[1, 0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidBatchShape);
}

#[test]
fn test_wrong_poll_rejected() {
    let mut records = votes(&[0, 1]);
    records[1] = credentials()[1].cast_vote(POLL_ID + 1, 1);
    let err = builder().build(&records, &tree(), &[1, 1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedVoteRecord);
    assert!(err.to_string().contains("record 1"));
}

#[test]
fn test_unregistered_credential_fails_fast() {
    let mut records = votes(&[0, 1, 1]);
    records[1] = Credential::from_seed(b"stranger").cast_vote(POLL_ID, 1);
    let err = builder().build(&records, &tree(), &[1, 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InclusionFailure);
    assert!(err.to_string().contains("record 1"));
}

#[test]
fn test_audit_reports_every_offender() {
    let mut records = votes(&[0, 1, 1]);
    records[0] = Credential::from_seed(b"stranger-a").cast_vote(POLL_ID, 0);
    records[2] = Credential::from_seed(b"stranger-b").cast_vote(POLL_ID, 1);
    let issues = builder().audit(&records, &tree());
    assert_eq!(issues.len(), 2);
    assert_eq!((issues[0].index, issues[1].index), (0, 2));
    assert!(issues.iter().all(|i| i.kind == ErrorKind::InclusionFailure));
    assert!(builder().audit(&votes(&[0, 1]), &tree()).is_empty());
}

#[test]
fn test_witness_against_snapshot_root() {
    // a later registration changes the root; a witness pins the snapshot it saw
    let before = witness(&[0], &[1, 0]);
    let mut grown = tree();
    grown.insert(Credential::from_seed(b"late").commitment()).unwrap();
    let after = builder().build(&votes(&[0]), &grown, &[1, 0]).unwrap();
    assert_ne!(before.public_signals().merkle_root, after.public_signals().merkle_root);
    assert!(relation().relation().check(after.assignment()).is_ok());
}
