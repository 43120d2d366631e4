//! Batch lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one vote batch.
///
/// ```text
/// Collecting -> Frozen -> Witnessed -> Proved -> Submitted -> Accepted -> Finalized
///                  |          |    \                  |          |
///                  v          v     v                 v          v
///               Aborted    Aborted  Failed        Rejected   Challenged -> RolledBack
///                                                                |
///                                                                v
///                                                            Finalized
/// ```
///
/// `Aborted` covers witness failures and unsatisfiable witnesses, `Failed`
/// a batch whose proving attempts ran out. A batch that survived a
/// challenge stays `Challenged` until its window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchState {
    Collecting,
    Frozen,
    Witnessed,
    Proved,
    Submitted,
    Accepted,
    Challenged,
    Finalized,
    RolledBack,
    Rejected,
    Aborted,
    Failed,
}

impl BatchState {
    pub const ALL: [BatchState; 12] = [
        BatchState::Collecting,
        BatchState::Frozen,
        BatchState::Witnessed,
        BatchState::Proved,
        BatchState::Submitted,
        BatchState::Accepted,
        BatchState::Challenged,
        BatchState::Finalized,
        BatchState::RolledBack,
        BatchState::Rejected,
        BatchState::Aborted,
        BatchState::Failed,
    ];

    pub fn can_transition_to(self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (Collecting, Frozen)
                | (Frozen, Witnessed)
                | (Frozen, Aborted)
                | (Witnessed, Proved)
                | (Witnessed, Aborted)
                | (Witnessed, Failed)
                | (Proved, Submitted)
                | (Submitted, Accepted)
                | (Submitted, Rejected)
                | (Accepted, Challenged)
                | (Accepted, Finalized)
                | (Challenged, Finalized)
                | (Challenged, RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        Self::ALL.iter().all(|next| !self.can_transition_to(*next))
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
