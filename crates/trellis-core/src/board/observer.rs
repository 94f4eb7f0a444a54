//! Change notification for board readers.
//!
//! Renderers subscribe to a [`BoardStore`](super::BoardStore) and are told
//! about every operation, including misses, after the snapshot has been
//! updated.

use std::fmt;

use serde::Serialize;

use crate::model::{Status, TaskId};

/// Result of a guarded or plain revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertOutcome {
    /// The prior status was written back.
    Restored,
    /// The task was written after the speculative change; nothing was touched.
    Stale,
    /// The task is no longer on the board; nothing was touched.
    Missing,
}

impl RevertOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restored => "restored",
            Self::Stale => "stale",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for RevertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One store operation, as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BoardChange {
    Replaced {
        count: usize,
        revision: u64,
    },
    Speculative {
        id: TaskId,
        from: Option<Status>,
        to: Status,
        /// Revision stamped on the entry; `None` on a miss.
        revision: Option<u64>,
    },
    Reverted {
        id: TaskId,
        to: Status,
        outcome: RevertOutcome,
        /// Revision captured by the undo token; `None` for a plain revert.
        token_revision: Option<u64>,
    },
}

impl BoardChange {
    /// Whether the snapshot was modified by this operation.
    #[must_use]
    pub const fn applied(&self) -> bool {
        match self {
            Self::Replaced { .. } => true,
            Self::Speculative { revision, .. } => revision.is_some(),
            Self::Reverted { outcome, .. } => matches!(outcome, RevertOutcome::Restored),
        }
    }

    /// The task this change targeted, if it targeted a single task.
    #[must_use]
    pub const fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Replaced { .. } => None,
            Self::Speculative { id, .. } | Self::Reverted { id, .. } => Some(id),
        }
    }
}

/// Receives a notification after every board operation.
pub trait BoardObserver {
    fn on_change(&mut self, change: &BoardChange);
}

impl<F> BoardObserver for F
where
    F: FnMut(&BoardChange),
{
    fn on_change(&mut self, change: &BoardChange) {
        self(change);
    }
}

#[cfg(test)]
mod tests {
    use super::RevertOutcome;

    #[test]
    fn outcome_display_matches_json() {
        for outcome in [RevertOutcome::Restored, RevertOutcome::Stale, RevertOutcome::Missing] {
            let json = serde_json::to_value(outcome).unwrap();
            assert_eq!(json, outcome.to_string());
        }
    }
}
