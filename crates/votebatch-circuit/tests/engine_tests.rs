//! Proof Engine tests: real proofs over deterministic setup parameters

mod common;

use common::*;
use rand::rngs::OsRng;
use votebatch_circuit::{ProofEngine, PublicSignals};
use votebatch_runtime::{ErrorKind, ProofBundle};

#[test]
fn test_valid_batch_proves_and_verifies() {
    let (pk, vk) = keys();
    let witness = witness(&[0, 1, 0], &[2, 1]);
    let bundle = ProofEngine::prove(pk, &witness, OsRng).unwrap();

    assert_eq!(bundle.public_signals().len(), 2);
    assert!(ProofEngine::verify_bundle(vk, &bundle));
    assert_eq!(PublicSignals::from_bundle(&bundle).unwrap(), witness.public_signals());
}

#[test]
fn test_mismatched_counts_never_produce_a_proof() {
    let (pk, _) = keys();
    let witness = witness(&[0, 1, 0], &[1, 2]);
    let err = ProofEngine::prove(pk, &witness, OsRng).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsatisfiedRelation);
}

#[test]
fn test_out_of_range_option_never_produces_a_proof() {
    let (pk, _) = keys();
    let witness = witness(&[2], &[0, 1]);
    let err = ProofEngine::prove(pk, &witness, OsRng).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsatisfiedRelation);
}

#[test]
fn test_verify_rejects_tampering() {
    let (pk, vk) = keys();
    let witness = witness(&[1, 1], &[0, 2]);
    let bundle = ProofEngine::prove(pk, &witness, OsRng).unwrap();

    // different claimed tally
    let other = PublicSignals {
        counts_hash: votebatch_circuit::poseidon::counts_hash(&[1, 1]),
        ..witness.public_signals()
    };
    assert!(!ProofEngine::verify(vk, &other.to_bytes(), bundle.proof_bytes()));

    // flipped proof byte
    let mut proof = bundle.proof_bytes().to_vec();
    let mid = proof.len() / 2;
    proof[mid] ^= 1;
    assert!(!ProofEngine::verify(vk, bundle.public_signals(), &proof));

    // truncated proof, wrong arity, non-canonical signal
    assert!(!ProofEngine::verify(vk, bundle.public_signals(), &proof[..10]));
    assert!(!ProofEngine::verify(vk, &bundle.public_signals()[..1], bundle.proof_bytes()));
    assert!(!ProofEngine::verify(vk, &[[0xff; 32], [0; 32]], bundle.proof_bytes()));
}

#[test]
fn test_bundle_round_trips_through_wire_format() {
    let (pk, vk) = keys();
    let witness = witness(&[0], &[1, 0]);
    let bundle = ProofEngine::prove(pk, &witness, OsRng).unwrap();
    let bytes = bundle.to_bytes().unwrap();
    let decoded = ProofBundle::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, bundle);
    assert_eq!(decoded.to_bytes().unwrap(), bytes);
    assert!(ProofEngine::verify_bundle(vk, &decoded));
}

#[test]
fn test_keys_carry_metadata() {
    let (pk, vk) = keys();
    let relation = relation();
    assert_eq!(pk.metadata().relation_name, relation.relation().name());
    assert_eq!(vk.metadata().k, relation.relation().min_k());
    assert_eq!(vk.metadata().num_public_inputs, 2);
    assert_eq!(vk.metadata().params, params());
}
