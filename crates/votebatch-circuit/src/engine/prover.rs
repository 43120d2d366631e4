//! Proof Engine: prove and verify batch proofs
//!
//! Proofs are generated natively with the full halo2_proofs prover, using
//! IPA commitments over the Pasta cycle and a Blake2b transcript.

use super::{
    circuit::BatchCircuit,
    keys::{ProvingKey, VerificationKey},
    PublicSignals,
};
use crate::witness::BatchWitness;
use halo2_proofs::{
    plonk::{create_proof, verify_proof, SingleVerifier},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use halo2curves::pasta::{EqAffine, Fp};
use rand::RngCore;
use std::time::Instant;
use tracing::{debug, info, warn};
use votebatch_runtime::{FieldBytes, ProofBundle, Result, VoteBatchError};

pub struct ProofEngine;

impl ProofEngine {
    /// Prove that `witness` satisfies the key's relation.
    ///
    /// The witness is checked against the relation first, so an
    /// unsatisfiable batch fails with `UnsatisfiedRelation` before any
    /// proving work and no proof is produced. Only the prover's blinding
    /// draws from `rng`.
    pub fn prove(pk: &ProvingKey, witness: &BatchWitness, rng: impl RngCore) -> Result<ProofBundle> {
        let relation = pk.relation().relation();
        if witness.relation_name() != relation.name() {
            return Err(VoteBatchError::invalid_shape(format!(
                "witness was built for relation '{}', key is for '{}'",
                witness.relation_name(),
                relation.name()
            )));
        }
        relation.check(witness.assignment()).inspect_err(|err| {
            warn!(relation = relation.name(), error = %err, "witness does not satisfy relation")
        })?;

        let started = Instant::now();
        let public = witness.public_signals();
        let circuit = BatchCircuit::with_witness(pk.relation().clone(), witness);
        let instance = public.to_instance();
        let instance_columns: &[&[Fp]] = &[&instance[..]];
        let mut transcript = Blake2bWrite::<_, EqAffine, Challenge255<_>>::init(vec![]);
        create_proof(
            pk.setup().params(),
            pk.inner(),
            std::slice::from_ref(&circuit),
            &[instance_columns],
            rng,
            &mut transcript,
        )
        .map_err(|e| VoteBatchError::proof_engine(format!("proof creation failed: {:?}", e)))?;
        let proof_bytes = transcript.finalize();

        info!(
            relation = relation.name(),
            records = witness.num_records(),
            proof_bytes = proof_bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated batch proof"
        );
        Ok(ProofBundle::new(public.to_bytes(), proof_bytes))
    }

    /// Verify a proof against raw public signals.
    ///
    /// Every failure (malformed signals, wrong arity, a rejected proof)
    /// collapses into `false`; nothing about which check failed is
    /// returned or logged above debug level.
    pub fn verify(vk: &VerificationKey, public_signals: &[FieldBytes], proof_bytes: &[u8]) -> bool {
        let Ok(public) = PublicSignals::from_bytes(public_signals) else {
            debug!("public signals rejected");
            return false;
        };
        Self::verify_decoded(vk, &public, proof_bytes)
    }

    pub fn verify_bundle(vk: &VerificationKey, bundle: &ProofBundle) -> bool {
        Self::verify(vk, bundle.public_signals(), bundle.proof_bytes())
    }

    fn verify_decoded(vk: &VerificationKey, public: &PublicSignals, proof_bytes: &[u8]) -> bool {
        let instance = public.to_instance();
        let instance_columns: &[&[Fp]] = &[&instance[..]];
        let params = vk.setup().params();
        let strategy = SingleVerifier::new(params);
        let mut transcript = Blake2bRead::<_, EqAffine, Challenge255<_>>::init(proof_bytes);
        let accepted =
            verify_proof(params, vk.inner(), strategy, &[instance_columns], &mut transcript).is_ok();
        debug!(accepted, "verified batch proof");
        accepted
    }
}
