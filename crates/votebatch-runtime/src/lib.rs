//! votebatch runtime
//!
//! Shared error handling, configuration and wire types for the votebatch
//! toolkit. Nothing in here depends on the proving backend.

pub mod clock;
pub mod config;
pub mod error;
pub mod state;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PollConfig, MAX_TREE_DEPTH};
pub use error::{ErrorKind, Result, VoteBatchError};
pub use state::BatchState;
pub use types::{BatchId, FieldBytes, ProofBundle, PUBLIC_SIGNAL_COUNT};
