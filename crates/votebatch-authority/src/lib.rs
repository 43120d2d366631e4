//! votebatch authority
//!
//! The verifier-side service of the vote-batch protocol. It accepts a
//! [`votebatch_runtime::ProofBundle`] together with its [`votebatch_circuit::BatchClaim`],
//! guards against replays and double votes, keeps each accepted batch open
//! to public challenges for the poll's dispute window, and finally merges
//! nullifiers and tally into the poll state.
//!
//! Set-wide nullifier uniqueness lives here, not in the relation: the
//! relation proves each nullifier is derived correctly, the authority
//! keeps the spent and pending sets.

pub mod authority;
pub mod challenge;
pub mod verifier;

pub use authority::{Acceptance, Authority, FinalizeOutcome};
pub use challenge::{ChallengeRecord, ChallengeStatus, CounterWitness};
pub use verifier::BatchVerifier;
pub use votebatch_runtime::{Clock, ManualClock, SystemClock};
