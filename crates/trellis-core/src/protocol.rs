//! Caller-side optimistic move protocol.
//!
//! A move is split in two so the authoritative request can happen anywhere
//! in between, possibly much later and out of order with other moves:
//!
//! 1. [`begin_move`] reads the current status and applies the new one to the
//!    board speculatively, returning a [`PendingMove`].
//! 2. The caller sends the change to its [`TaskSource`].
//! 3. [`PendingMove::settle`] receives the authoritative outcome. Confirmed
//!    moves need nothing more; rejected ones are reverted according to the
//!    [`RevertPolicy`].
//!
//! [`move_task`] runs all three steps back to back for synchronous callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::{BoardStore, RevertOutcome, UndoToken};
use crate::model::{Status, TaskId};
use crate::source::{SourceError, TaskSource};

/// How a rejected move is put back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevertPolicy {
    /// Revert through the undo token; skip if the task changed since.
    #[default]
    Guarded,
    /// Write the previous status back unconditionally.
    Forced,
}

impl RevertPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guarded => "guarded",
            Self::Forced => "forced",
        }
    }
}

impl fmt::Display for RevertPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the authoritative source said about a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Confirmed,
    Rejected(String),
}

impl From<Result<(), SourceError>> for MoveOutcome {
    fn from(result: Result<(), SourceError>) -> Self {
        match result {
            Ok(()) => Self::Confirmed,
            Err(e) => Self::Rejected(e.to_string()),
        }
    }
}

/// Final state of a move after settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "revert", rename_all = "snake_case")]
pub enum Settlement {
    Confirmed,
    /// Rejected, and the board snapped back to the previous status.
    Reverted,
    /// Rejected, but the revert did not touch the board.
    RevertSkipped(RevertOutcome),
}

/// A speculative move waiting for its authoritative outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending move must be settled or the board may show an unconfirmed status"]
pub struct PendingMove {
    token: UndoToken,
    requested: Status,
}

impl PendingMove {
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        self.token.id()
    }

    #[must_use]
    pub const fn previous(&self) -> Status {
        self.token.previous()
    }

    #[must_use]
    pub const fn requested(&self) -> Status {
        self.requested
    }

    #[must_use]
    pub const fn token(&self) -> &UndoToken {
        &self.token
    }

    /// Apply the authoritative outcome to the board.
    pub fn settle(
        self,
        store: &mut BoardStore,
        outcome: MoveOutcome,
        policy: RevertPolicy,
    ) -> Settlement {
        let reason = match outcome {
            MoveOutcome::Confirmed => {
                debug!(task = %self.id(), status = %self.requested, "move confirmed");
                return Settlement::Confirmed;
            }
            MoveOutcome::Rejected(reason) => reason,
        };

        debug!(
            task = %self.id(),
            from = %self.previous(),
            to = %self.requested,
            %reason,
            %policy,
            "move rejected by source; reverting"
        );

        let outcome = match policy {
            RevertPolicy::Guarded => store.revert(self.token),
            RevertPolicy::Forced => {
                if store.revert_status(self.token.id(), self.token.previous()) {
                    RevertOutcome::Restored
                } else {
                    RevertOutcome::Missing
                }
            }
        };

        match outcome {
            RevertOutcome::Restored => Settlement::Reverted,
            skipped => Settlement::RevertSkipped(skipped),
        }
    }
}

/// Speculatively move `id` to `status`.
///
/// Returns `None` when the task is not on the board; there is then nothing
/// to send to the source.
pub fn begin_move(store: &mut BoardStore, id: &TaskId, status: Status) -> Option<PendingMove> {
    store
        .apply_speculative_status(id, status)
        .map(|token| PendingMove {
            token,
            requested: status,
        })
}

/// Summary of a completed synchronous move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub id: TaskId,
    pub from: Status,
    pub to: Status,
    pub settlement: Settlement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

/// Run a whole move against `source`: speculate, send, settle.
///
/// A source failure is not an error here; it shows up as a reverted
/// settlement with the rejection reason attached. Returns `None` if the task
/// is not on the board.
pub fn move_task<S: TaskSource + ?Sized>(
    store: &mut BoardStore,
    source: &mut S,
    id: &TaskId,
    status: Status,
    policy: RevertPolicy,
) -> Option<MoveReport> {
    let pending = begin_move(store, id, status)?;
    let from = pending.previous();

    let outcome = MoveOutcome::from(source.set_status(id, status));
    let rejection = match &outcome {
        MoveOutcome::Confirmed => None,
        MoveOutcome::Rejected(reason) => Some(reason.clone()),
    };
    let settlement = pending.settle(store, outcome, policy);

    Some(MoveReport {
        id: id.clone(),
        from,
        to: status,
        settlement,
        rejection,
    })
}

/// Full load from `source` into the board.
///
/// # Errors
///
/// Returns the source's error if it cannot be read; the board is left as it
/// was.
pub fn reload<S: TaskSource + ?Sized>(
    store: &mut BoardStore,
    source: &mut S,
) -> Result<usize, SourceError> {
    let tasks = source.load_all()?;
    let count = tasks.len();
    store.replace_snapshot(tasks);
    debug!(count, "board reloaded from source");
    Ok(count)
}
