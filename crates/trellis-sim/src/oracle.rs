use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use trellis_core::{BoardChange, RevertOutcome, Status, Task, TaskId};

// ── Result types ─────────────────────────────────────────────────────────────

/// Outcome of one or more invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

/// A broken board invariant, with enough detail to replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// The same identifier appears twice on the board.
    DuplicateId { step: u64, id: TaskId },

    /// The board's identifier set drifted from the last reload without a
    /// reload happening.
    IdSetDrift {
        step: u64,
        expected: Vec<TaskId>,
        actual: Vec<TaskId>,
    },

    /// An operation on `target` changed some other task.
    CrossTaskLeak {
        step: u64,
        target: TaskId,
        leaked: TaskId,
    },

    /// A token revert restored a status over a write made after the
    /// speculative change it was undoing.
    GuardedClobber { id: TaskId, token_revision: u64 },

    /// After everything settled and the board reloaded, it disagreed with
    /// the source.
    Divergence {
        id: TaskId,
        board: Option<Status>,
        source: Option<Status>,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { step, id } => write!(f, "step {step}: duplicate id {id}"),
            Self::IdSetDrift {
                step,
                expected,
                actual,
            } => write!(
                f,
                "step {step}: id set drifted (expected {} ids, found {})",
                expected.len(),
                actual.len()
            ),
            Self::CrossTaskLeak {
                step,
                target,
                leaked,
            } => write!(f, "step {step}: operation on {target} changed {leaked}"),
            Self::GuardedClobber { id, token_revision } => write!(
                f,
                "guarded revert of {id} (token revision {token_revision}) overwrote a newer write"
            ),
            Self::Divergence { id, board, source } => write!(
                f,
                "{id} diverged after reload: board={} source={}",
                board.map_or("absent", Status::as_str),
                source.map_or("absent", Status::as_str)
            ),
        }
    }
}

// ── Step checks (run by the simulator as it goes) ────────────────────────────

/// Identifier uniqueness and drift against the last reload.
#[must_use]
pub fn check_id_set(step: u64, board: &[Task], last_reload: &BTreeSet<TaskId>) -> Vec<InvariantViolation> {
    let mut seen = BTreeSet::new();
    let mut violations = Vec::new();

    for task in board {
        if !seen.insert(task.id.clone()) {
            violations.push(InvariantViolation::DuplicateId {
                step,
                id: task.id.clone(),
            });
        }
    }

    if seen != *last_reload {
        violations.push(InvariantViolation::IdSetDrift {
            step,
            expected: last_reload.iter().cloned().collect(),
            actual: seen.into_iter().collect(),
        });
    }
    violations
}

/// Every task other than `target` is identical before and after.
#[must_use]
pub fn check_isolation(
    step: u64,
    target: &TaskId,
    before: &[Task],
    after: &[Task],
) -> Vec<InvariantViolation> {
    before
        .iter()
        .zip(after)
        .filter(|(b, a)| &b.id != target && b != a)
        .map(|(b, _)| InvariantViolation::CrossTaskLeak {
            step,
            target: target.clone(),
            leaked: b.id.clone(),
        })
        .collect()
}

// ── End-of-run checks ────────────────────────────────────────────────────────

/// Stateless checker over a finished run.
pub struct BoardOracle;

impl BoardOracle {
    /// A `Restored` token revert is only legal if the last write to that task
    /// before it was the speculative write the token came from.
    #[must_use]
    pub fn check_guarded_reverts(changes: &[BoardChange]) -> OracleResult {
        let mut violations = Vec::new();

        for (pos, change) in changes.iter().enumerate() {
            let BoardChange::Reverted {
                id,
                outcome: RevertOutcome::Restored,
                token_revision: Some(token_revision),
                ..
            } = change
            else {
                continue;
            };

            let last_write = changes[..pos].iter().rev().find(|c| match c {
                BoardChange::Replaced { .. } => true,
                other => other.applied() && other.task_id() == Some(id),
            });

            let matches_token = matches!(
                last_write,
                Some(BoardChange::Speculative { revision: Some(r), .. }) if r == token_revision
            );
            if !matches_token {
                violations.push(InvariantViolation::GuardedClobber {
                    id: id.clone(),
                    token_revision: *token_revision,
                });
            }
        }

        OracleResult::from_violations(violations)
    }

    /// After a final reload the board must mirror the source exactly.
    #[must_use]
    pub fn check_convergence(board: &[Task], source: &[Task]) -> OracleResult {
        if board == source {
            return OracleResult::pass();
        }

        let ids: BTreeSet<&TaskId> = board.iter().chain(source).map(|t| &t.id).collect();
        let status_in = |tasks: &[Task], id: &TaskId| tasks.iter().find(|t| &t.id == id).map(|t| t.status);

        let mut violations: Vec<InvariantViolation> = ids
            .into_iter()
            .filter_map(|id| {
                let on_board = status_in(board, id);
                let at_source = status_in(source, id);
                (on_board != at_source).then(|| InvariantViolation::Divergence {
                    id: id.clone(),
                    board: on_board,
                    source: at_source,
                })
            })
            .collect();

        // Same statuses but other payload or order differs.
        if violations.is_empty() {
            if let Some(first) = board.first().or_else(|| source.first()) {
                violations.push(InvariantViolation::Divergence {
                    id: first.id.clone(),
                    board: status_in(board, &first.id),
                    source: status_in(source, &first.id),
                });
            }
        }
        OracleResult::from_violations(violations)
    }

    /// Combine step violations with the end-of-run checks.
    #[must_use]
    pub fn check_all(
        step_violations: &[InvariantViolation],
        changes: &[BoardChange],
        board: &[Task],
        source: &[Task],
    ) -> OracleResult {
        OracleResult::from_violations(step_violations.to_vec())
            .merge(Self::check_guarded_reverts(changes))
            .merge(Self::check_convergence(board, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> TaskId {
        TaskId::from(raw)
    }

    fn speculative(raw: &str, revision: u64) -> BoardChange {
        BoardChange::Speculative {
            id: id(raw),
            from: Some(Status::Backlog),
            to: Status::Done,
            revision: Some(revision),
        }
    }

    fn token_revert(raw: &str, token_revision: u64, outcome: RevertOutcome) -> BoardChange {
        BoardChange::Reverted {
            id: id(raw),
            to: Status::Backlog,
            outcome,
            token_revision: Some(token_revision),
        }
    }

    #[test]
    fn restore_right_after_its_write_passes() {
        let log = vec![speculative("t1", 2), speculative("t2", 3), token_revert("t1", 2, RevertOutcome::Restored)];
        assert!(BoardOracle::check_guarded_reverts(&log).passed);
    }

    #[test]
    fn restore_over_newer_write_is_flagged() {
        let log = vec![speculative("t1", 2), speculative("t1", 3), token_revert("t1", 2, RevertOutcome::Restored)];
        let result = BoardOracle::check_guarded_reverts(&log);
        assert!(!result.passed);
        assert!(matches!(
            result.violations[0],
            InvariantViolation::GuardedClobber { token_revision: 2, .. }
        ));
    }

    #[test]
    fn restore_after_reload_is_flagged() {
        let log = vec![
            speculative("t1", 2),
            BoardChange::Replaced { count: 1, revision: 3 },
            token_revert("t1", 2, RevertOutcome::Restored),
        ];
        assert!(!BoardOracle::check_guarded_reverts(&log).passed);
    }

    #[test]
    fn skipped_reverts_are_ignored() {
        let log = vec![speculative("t1", 2), speculative("t1", 3), token_revert("t1", 2, RevertOutcome::Stale)];
        assert!(BoardOracle::check_guarded_reverts(&log).passed);
    }

    #[test]
    fn convergence_reports_each_divergent_task() {
        let board = vec![Task::new("t1", "a", Status::Done)];
        let source = vec![Task::new("t1", "a", Status::Backlog), Task::new("t2", "b", Status::Review)];
        let result = BoardOracle::check_convergence(&board, &source);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 2);
        let messages: Vec<String> = result.violations.iter().map(ToString::to_string).collect();
        assert!(messages.contains(&"t1 diverged after reload: board=done source=backlog".to_string()));
        assert!(messages.contains(&"t2 diverged after reload: board=absent source=review".to_string()));
    }

    #[test]
    fn id_set_drift_and_duplicates_are_detected() {
        let board = vec![Task::new("t1", "a", Status::Done), Task::new("t1", "b", Status::Done)];
        let expected: BTreeSet<TaskId> = [id("t1"), id("t2")].into_iter().collect();
        let violations = check_id_set(4, &board, &expected);
        assert!(matches!(violations[0], InvariantViolation::DuplicateId { step: 4, .. }));
        assert!(matches!(violations[1], InvariantViolation::IdSetDrift { .. }));
    }

    #[test]
    fn isolation_flags_other_tasks_only() {
        let before = vec![Task::new("t1", "a", Status::Backlog), Task::new("t2", "b", Status::Backlog)];
        let mut after = before.clone();
        after[0].status = Status::Done;
        assert!(check_isolation(1, &id("t1"), &before, &after).is_empty());

        after[1].status = Status::Review;
        let leaks = check_isolation(1, &id("t1"), &before, &after);
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].to_string(), "step 1: operation on t1 changed t2");
    }
}
