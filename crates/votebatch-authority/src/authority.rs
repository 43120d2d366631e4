//! Verification & challenge authority

use crate::{
    challenge::{ChallengeRecord, ChallengeStatus, CounterWitness},
    verifier::BatchVerifier,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLockReadGuard},
};
use tracing::{debug, info, info_span, warn};
use votebatch_circuit::{field::fp_to_bytes, BatchClaim, Fp, PublicSignals};
use votebatch_ledger::{CredentialRegistry, NullifierSet, SharedRegistry};
use votebatch_runtime::{BatchId, BatchState, Clock, FieldBytes, PollConfig, Result, VoteBatchError};

/// Receipt for an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceptance {
    pub batch_id: BatchId,
    pub public_signals: PublicSignals,
    pub challenge_deadline: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Finalized,
    AlreadyFinalized,
}

struct AcceptedBatch {
    state: BatchState,
    public: PublicSignals,
    claim: BatchClaim,
    deadline: u64,
}

impl AcceptedBatch {
    fn advance(&mut self, batch_id: BatchId, next: BatchState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(VoteBatchError::invalid_transition(format!(
                "{}: {} -> {}",
                batch_id, self.state, next
            )));
        }
        info!(batch = %batch_id, from = %self.state, to = %next, "batch transition");
        self.state = next;
        Ok(())
    }
}

/// Poll state owned by the authority, mutated only under its lock.
struct Ledger {
    batches: BTreeMap<BatchId, AcceptedBatch>,
    accepted_claims: HashSet<(FieldBytes, FieldBytes)>,
    pending: HashMap<FieldBytes, BatchId>,
    spent: NullifierSet,
    challenges: Vec<ChallengeRecord>,
}

/// Accepts proof bundles, holds them open to challenges for the dispute
/// window, then merges their nullifiers and tally.
///
/// Finalized batches live in the [`NullifierSet`], so an authority reopened
/// over a persisted set resumes with the spent nullifiers and tally it had.
///
/// Every operation checks everything before it mutates anything, so a
/// rejected call leaves the poll state exactly as it was. Verification runs
/// outside any lock. Lock order is the authority ledger, then the credential
/// registry (read only).
pub struct Authority<V> {
    config: PollConfig,
    verifier: V,
    registry: SharedRegistry,
    clock: Arc<dyn Clock>,
    ledger: Mutex<Ledger>,
}

impl<V: BatchVerifier> Authority<V> {
    pub fn new(
        config: PollConfig,
        verifier: V,
        registry: SharedRegistry,
        spent: NullifierSet,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        if spent.tally().len() > config.max_options {
            return Err(VoteBatchError::invalid_config(format!(
                "persisted tally has {} options, the poll allows {}",
                spent.tally().len(),
                config.max_options
            )));
        }
        let ledger = Ledger {
            batches: BTreeMap::new(),
            accepted_claims: HashSet::new(),
            pending: HashMap::new(),
            spent,
            challenges: Vec::new(),
        };
        Ok(Self { config, verifier, registry, clock, ledger: Mutex::new(ledger) })
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> RwLockReadGuard<'_, CredentialRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Verify a batch proof and, if every check passes, accept the batch and
    /// open its dispute window.
    pub fn submit(
        &self,
        batch_id: BatchId,
        public_signals: &[FieldBytes],
        proof_bytes: &[u8],
        claim: BatchClaim,
    ) -> Result<Acceptance> {
        let _span = info_span!("submit", batch = %batch_id).entered();
        self.try_submit(batch_id, public_signals, proof_bytes, claim).inspect_err(|err| {
            warn!(kind = %err.kind(), error = %err, "submission rejected");
        })
    }

    fn try_submit(
        &self,
        batch_id: BatchId,
        public_signals: &[FieldBytes],
        proof_bytes: &[u8],
        claim: BatchClaim,
    ) -> Result<Acceptance> {
        if !self.verifier.verify(public_signals, proof_bytes) {
            return Err(VoteBatchError::verification("batch proof rejected"));
        }
        let public = PublicSignals::from_bytes(public_signals)?;
        let claim_key = (fp_to_bytes(&public.merkle_root), fp_to_bytes(&public.counts_hash));

        let mut ledger = self.lock();
        if ledger.batches.contains_key(&batch_id) || ledger.spent.contains_batch(batch_id) {
            return Err(VoteBatchError::replay(format!("{} was already submitted", batch_id)));
        }
        if ledger.accepted_claims.contains(&claim_key) {
            return Err(VoteBatchError::replay(
                "(merkle_root, counts_hash) was already accepted",
            ));
        }
        if claim.counts_hash() != public.counts_hash {
            return Err(VoteBatchError::verification(
                "claimed counts do not hash to the proven counts_hash",
            ));
        }
        claim.check_consistency(self.config.max_options)?;
        if !self.registry().is_known_root(&public.merkle_root) {
            return Err(VoteBatchError::verification(
                "merkle_root is not in the credential root history",
            ));
        }
        ledger.spent.check_fresh(&claim.nullifiers)?;
        if let Some(other) =
            claim.nullifiers.iter().find_map(|n| ledger.pending.get(&fp_to_bytes(n)))
        {
            return Err(VoteBatchError::duplicate_nullifier(format!(
                "a nullifier of the batch is pending in {}",
                other
            )));
        }

        let deadline = self.clock.now().saturating_add(self.config.dispute_window_secs);
        for nullifier in &claim.nullifiers {
            ledger.pending.insert(fp_to_bytes(nullifier), batch_id);
        }
        ledger.accepted_claims.insert(claim_key);
        let votes = claim.total_votes();
        ledger
            .batches
            .insert(batch_id, AcceptedBatch { state: BatchState::Accepted, public, claim, deadline });
        info!(votes, deadline, "batch accepted");

        Ok(Acceptance { batch_id, public_signals: public, challenge_deadline: deadline })
    }

    /// Dispute an accepted batch during its window.
    ///
    /// An upheld challenge rolls the batch back and releases its nullifiers.
    /// A rejected one leaves it `Challenged`, still open to further challenges
    /// and finalized once the window closes. Challenges after the window
    /// closes are refused without being recorded.
    pub fn challenge(
        &self,
        batch_id: BatchId,
        challenger: impl Into<String>,
        counter_witness: CounterWitness,
    ) -> Result<ChallengeStatus> {
        let _span = info_span!("challenge", batch = %batch_id, evidence = %counter_witness).entered();
        let now = self.clock.now();
        let mut guard = self.lock();
        let ledger = &mut *guard;

        let entry =
            ledger.batches.get(&batch_id).ok_or_else(|| VoteBatchError::unknown_batch(batch_id))?;
        if !matches!(entry.state, BatchState::Accepted | BatchState::Challenged) {
            return Err(VoteBatchError::invalid_transition(format!(
                "{} is {}, only accepted batches can be challenged",
                batch_id, entry.state
            )));
        }
        if now >= entry.deadline {
            warn!(deadline = entry.deadline, now, "challenge arrived after the dispute window");
            return Err(VoteBatchError::window_expired(batch_id));
        }
        let upheld = self.evaluate(&*ledger, batch_id, entry, &counter_witness);

        let Some(entry) = ledger.batches.get_mut(&batch_id) else {
            return Err(VoteBatchError::unknown_batch(batch_id));
        };
        if entry.state == BatchState::Accepted {
            entry.advance(batch_id, BatchState::Challenged)?;
        }
        let status = if upheld {
            entry.advance(batch_id, BatchState::RolledBack)?;
            for nullifier in &entry.claim.nullifiers {
                ledger.pending.remove(&fp_to_bytes(nullifier));
            }
            ChallengeStatus::Upheld
        } else {
            ChallengeStatus::Rejected
        };
        info!(?status, "challenge resolved");

        ledger.challenges.push(ChallengeRecord {
            batch_id,
            challenger: challenger.into(),
            counter_witness,
            status,
            submitted_at: now,
        });
        Ok(status)
    }

    fn evaluate(
        &self,
        ledger: &Ledger,
        batch_id: BatchId,
        entry: &AcceptedBatch,
        witness: &CounterWitness,
    ) -> bool {
        let root = entry.public.merkle_root;
        match witness {
            CounterWitness::DuplicateNullifier { nullifier } => {
                let occurrences = entry.claim.nullifiers.iter().filter(|n| *n == nullifier).count();
                let key = fp_to_bytes(nullifier);
                let claimed_elsewhere =
                    ledger.pending.get(&key).is_some_and(|owner| *owner != batch_id);
                occurrences > 1
                    || (occurrences == 1 && (ledger.spent.contains(nullifier) || claimed_elsewhere))
            }
            CounterWitness::NonMemberCredential { commitment } => {
                entry.claim.credential_commitments.contains(commitment)
                    && !matches!(self.registry().contains_at(&root, commitment), Ok(true))
            }
            CounterWitness::UnknownRoot => !self.registry().is_known_root(&root),
        }
    }

    /// Merge a batch whose window has closed without an upheld challenge.
    ///
    /// Finalizing an already finalized batch is a no-op.
    pub fn finalize(&self, batch_id: BatchId) -> Result<FinalizeOutcome> {
        let now = self.clock.now();
        let mut guard = self.lock();
        let ledger = &mut *guard;

        let entry = ledger
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| VoteBatchError::unknown_batch(batch_id))?;
        match entry.state {
            BatchState::Finalized => {
                debug!(batch = %batch_id, "batch already finalized");
                return Ok(FinalizeOutcome::AlreadyFinalized);
            }
            BatchState::Accepted | BatchState::Challenged if now < entry.deadline => {
                return Err(VoteBatchError::invalid_transition(format!(
                    "{} is open to challenges until {}",
                    batch_id, entry.deadline
                )));
            }
            BatchState::Accepted | BatchState::Challenged => {}
            state => {
                return Err(VoteBatchError::invalid_transition(format!(
                    "{} is {} and cannot be finalized",
                    batch_id, state
                )));
            }
        }

        ledger.spent.insert_batch(batch_id, &entry.claim.nullifiers, &entry.claim.claimed_counts)?;
        entry.advance(batch_id, BatchState::Finalized)?;
        for nullifier in &entry.claim.nullifiers {
            ledger.pending.remove(&fp_to_bytes(nullifier));
        }
        info!(batch = %batch_id, tally = ?ledger.spent.tally(), "batch finalized");
        Ok(FinalizeOutcome::Finalized)
    }

    /// Finalize every accepted or challenged batch whose window has closed.
    pub fn finalize_due(&self) -> Result<Vec<BatchId>> {
        let now = self.clock.now();
        let due: Vec<BatchId> = self
            .lock()
            .batches
            .iter()
            .filter(|(_, entry)| {
                matches!(entry.state, BatchState::Accepted | BatchState::Challenged)
                    && entry.deadline <= now
            })
            .map(|(id, _)| *id)
            .collect();
        for batch_id in &due {
            self.finalize(*batch_id)?;
        }
        Ok(due)
    }

    pub fn status(&self, batch_id: BatchId) -> Option<BatchState> {
        self.lock().batches.get(&batch_id).map(|entry| entry.state)
    }

    pub fn challenge_deadline(&self, batch_id: BatchId) -> Option<u64> {
        self.lock().batches.get(&batch_id).map(|entry| entry.deadline)
    }

    /// Poll totals over finalized batches, one entry per option.
    pub fn tally(&self) -> Vec<u64> {
        let mut tally = self.lock().spent.tally().to_vec();
        tally.resize(self.config.max_options, 0);
        tally
    }

    pub fn challenges(&self, batch_id: BatchId) -> Vec<ChallengeRecord> {
        self.lock().challenges.iter().filter(|c| c.batch_id == batch_id).cloned().collect()
    }

    pub fn is_spent(&self, nullifier: &Fp) -> bool {
        self.lock().spent.contains(nullifier)
    }

    /// Whether the nullifier belongs to an accepted, not yet finalized batch.
    pub fn is_pending(&self, nullifier: &Fp) -> bool {
        self.lock().pending.contains_key(&fp_to_bytes(nullifier))
    }
}
