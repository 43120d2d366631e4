//! votebatch ledger
//!
//! Durable, append-only poll state: the registered credential set with its
//! Merkle tree and root history, and the set of spent nullifiers. Both are
//! stored as JSON-lines logs and rebuilt by replay on open.

pub mod credentials;
pub mod nullifiers;
pub mod store;

pub use credentials::{CredentialRegistry, SharedRegistry};
pub use nullifiers::NullifierSet;
pub use store::AppendLog;
