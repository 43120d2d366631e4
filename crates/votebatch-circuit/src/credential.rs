//! Voter credentials, nullifiers and vote casting

use crate::{
    poseidon::hash2,
    record::VoteRecord,
    signature::{PublicKey, SigningKey},
};
use blake2::{Blake2b512, Digest};
use ff::{Field, FromUniformBytes};
use halo2curves::pasta::Fp;
use rand::RngCore;

/// `H(pk_hash, credential_secret)`, the leaf registered in the credential tree.
pub fn credential_commitment(public_key: &PublicKey, credential_secret: Fp) -> Fp {
    hash2(public_key.hash(), credential_secret)
}

/// `H(credential_secret, poll_id)`, one per credential per poll.
pub fn nullifier(credential_secret: Fp, poll_id: u64) -> Fp {
    hash2(credential_secret, Fp::from(poll_id))
}

/// The message a voter signs: `H(H(poll_id, vote_option), nullifier)`.
pub fn vote_message(poll_id: u64, vote_option: u64, nullifier: Fp) -> Fp {
    hash2(hash2(Fp::from(poll_id), Fp::from(vote_option)), nullifier)
}

/// Voter-side secret material.
#[derive(Debug, Clone)]
pub struct Credential {
    secret: Fp,
    signing_key: SigningKey,
}

impl Credential {
    pub fn random(mut rng: impl RngCore) -> Self {
        let secret = Fp::random(&mut rng);
        Self { secret, signing_key: SigningKey::random(&mut rng) }
    }

    /// Deterministic credential, for fixtures and padding votes.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(b"votebatch/credential-secret");
        hasher.update(seed);
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hasher.finalize());
        Self { secret: Fp::from_uniform_bytes(&wide), signing_key: SigningKey::from_seed(seed) }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.public_key()
    }

    pub fn secret(&self) -> Fp {
        self.secret
    }

    pub fn commitment(&self) -> Fp {
        credential_commitment(&self.public_key(), self.secret)
    }

    pub fn nullifier(&self, poll_id: u64) -> Fp {
        nullifier(self.secret, poll_id)
    }

    pub fn cast_vote(&self, poll_id: u64, vote_option: u64) -> VoteRecord {
        let nullifier = self.nullifier(poll_id);
        let signature = self.signing_key.sign(vote_message(poll_id, vote_option, nullifier));
        VoteRecord {
            credential_commitment: self.commitment(),
            poll_id,
            vote_option,
            nullifier,
            signature,
            public_key: self.public_key(),
            nullifier_preimage: self.secret,
        }
    }
}
