//! votebatch circuit
//!
//! The proving side of the vote-batch protocol: native primitives (Poseidon,
//! the credential Merkle tree, vote signatures), the batch constraint
//! relation, the witness builder and the halo2 proof engine.

pub mod credential;
pub mod engine;
pub mod field;
pub mod merkle;
pub mod poseidon;
pub mod record;
pub mod relation;
pub mod signature;
pub mod witness;

pub use credential::{credential_commitment, nullifier, vote_message, Credential};
pub use engine::{
    BatchCircuit, KeyManager, KeyMetadata, ProofEngine, ProvingKey, PublicSignals, SetupParams,
    VerificationKey,
};
pub use merkle::{MerklePath, MerkleTree};
pub use record::{tally, BatchClaim, VoteRecord};
pub use relation::{BatchRelation, LintReport, Relation, RelationBuilder, RelationParams};
pub use signature::{PublicKey, Signature, SigningKey};
pub use witness::{padding_record, BatchWitness, RecordIssue, WitnessBuilder};

// Re-export the field type so downstream crates need not depend on halo2curves
pub use halo2curves::pasta::Fp;
