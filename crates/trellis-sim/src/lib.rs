//! trellis-sim library.
//!
//! Drives a [`BoardStore`] and a [`MemorySource`] through seeded random
//! interleavings of speculative moves, out-of-order settlements, reloads and
//! edits made by other clients, then hands the run to the oracle.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod campaign;
pub mod oracle;
pub mod rng;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use trellis_core::protocol::{self, MoveOutcome, PendingMove, RevertPolicy, Settlement};
use trellis_core::source::next_task_id;
use trellis_core::{BoardChange, BoardStore, MemorySource, RevertOutcome, Status, Task, TaskId, TaskSource};

use crate::oracle::{BoardOracle, InvariantViolation, OracleResult, check_id_set, check_isolation};
use crate::rng::SimRng;

/// Knobs for a single simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Tasks on the board at the start.
    pub task_count: usize,
    pub steps: u64,
    /// Chance that an authoritative write is rejected.
    pub fail_percent: u8,
    /// Chance per step that another client edits the source.
    pub external_change_percent: u8,
    /// Chance per step of a full reload.
    pub reload_percent: u8,
    /// Chance per step of delivering one pending completion.
    pub settle_percent: u8,
    /// Chance that a move targets an id that is not on the board.
    pub miss_percent: u8,
    pub policy: RevertPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            task_count: 6,
            steps: 64,
            fail_percent: 25,
            external_change_percent: 10,
            reload_percent: 8,
            settle_percent: 35,
            miss_percent: 5,
            policy: RevertPolicy::Guarded,
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error if the per-step percentages overflow 100 or the run
    /// would be empty.
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            bail!("steps must be > 0");
        }
        let per_step = u16::from(self.external_change_percent)
            + u16::from(self.reload_percent)
            + u16::from(self.settle_percent);
        if per_step > 100 {
            bail!("external_change_percent + reload_percent + settle_percent must be <= 100 (got {per_step})");
        }
        if self.fail_percent > 100 || self.miss_percent > 100 {
            bail!("percentages must be <= 100");
        }
        Ok(())
    }
}

/// What happened at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Begin { id: TaskId, to: Status, hit: bool },
    Settle { id: TaskId, settlement: Settlement },
    Reload { count: usize },
    ExternalStatus { id: TaskId, to: Status },
    ExternalCreate { id: TaskId },
    ExternalDelete { id: TaskId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub step: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// Counters for a run; summed across a campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub moves_begun: u64,
    pub misses: u64,
    pub confirmed: u64,
    pub reverted: u64,
    pub skipped_stale: u64,
    pub skipped_missing: u64,
    /// Forced reverts that overwrote a newer write (the known race).
    pub forced_clobbers: u64,
    pub reloads: u64,
    pub external_changes: u64,
    /// Tasks whose board status disagreed with the source once every move
    /// had settled, before the final reload.
    pub diverged_before_reload: u64,
}

impl SimStats {
    pub const fn absorb(&mut self, other: &Self) {
        self.moves_begun += other.moves_begun;
        self.misses += other.misses;
        self.confirmed += other.confirmed;
        self.reverted += other.reverted;
        self.skipped_stale += other.skipped_stale;
        self.skipped_missing += other.skipped_missing;
        self.forced_clobbers += other.forced_clobbers;
        self.reloads += other.reloads;
        self.external_changes += other.external_changes;
        self.diverged_before_reload += other.diverged_before_reload;
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub seed: u64,
    pub trace: Vec<TraceStep>,
    pub changes: Vec<BoardChange>,
    pub stats: SimStats,
    pub step_violations: Vec<InvariantViolation>,
    pub final_board: Vec<Task>,
    pub final_source: Vec<Task>,
}

impl SimulationResult {
    #[must_use]
    pub fn check(&self) -> OracleResult {
        BoardOracle::check_all(
            &self.step_violations,
            &self.changes,
            &self.final_board,
            &self.final_source,
        )
    }

    /// True if a stale revert was either skipped or forced through.
    #[must_use]
    pub const fn interesting(&self) -> bool {
        self.stats.skipped_stale > 0 || self.stats.forced_clobbers > 0
    }
}

struct InFlight {
    pending: PendingMove,
    outcome: MoveOutcome,
}

pub struct Simulator {
    config: SimulationConfig,
    rng: SimRng,
    store: BoardStore,
    source: MemorySource,
    changes: Rc<RefCell<Vec<BoardChange>>>,
    in_flight: Vec<InFlight>,
    last_reload: BTreeSet<TaskId>,
    trace: Vec<TraceStep>,
    stats: SimStats,
    violations: Vec<InvariantViolation>,
    step: u64,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the initial load fails.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = SimRng::new(config.seed);
        let mut source = MemorySource::new();
        for n in 0..config.task_count {
            let status = rng.status();
            source.insert(Task::new(next_task_id(source.tasks())?, format!("task {n}"), status).with_created_at(sim_time(n)));
        }

        let changes = Rc::new(RefCell::new(Vec::new()));
        let mut store = BoardStore::new();
        let sink = Rc::clone(&changes);
        store.subscribe(move |change: &BoardChange| sink.borrow_mut().push(change.clone()));

        let mut sim = Self {
            config,
            rng,
            store,
            source,
            changes,
            in_flight: Vec::new(),
            last_reload: BTreeSet::new(),
            trace: Vec::new(),
            stats: SimStats::default(),
            violations: Vec::new(),
            step: 0,
        };
        sim.reload()?;
        sim.stats.reloads = 0;
        sim.trace.clear();
        Ok(sim)
    }

    /// Run every step, settle whatever is still in flight, reload once more.
    ///
    /// # Errors
    ///
    /// Returns an error if a reload from the in-memory source fails or an
    /// external create runs out of task ids.
    pub fn run(mut self) -> Result<SimulationResult> {
        while self.step < self.config.steps {
            self.step += 1;
            self.run_step()?;
            self.violations.extend(check_id_set(
                self.step,
                &self.store.snapshot(),
                &self.last_reload,
            ));
        }

        while !self.in_flight.is_empty() {
            self.step += 1;
            self.settle_one();
        }

        self.stats.diverged_before_reload = self.count_divergent();
        self.step += 1;
        self.reload()?;

        let changes = self.changes.borrow().clone();
        debug!(seed = self.config.seed, steps = self.step, "simulation finished");
        Ok(SimulationResult {
            seed: self.config.seed,
            trace: self.trace,
            changes,
            stats: self.stats,
            step_violations: self.violations,
            final_board: self.store.snapshot(),
            final_source: self.source.tasks().to_vec(),
        })
    }

    fn run_step(&mut self) -> Result<()> {
        let roll = self.rng.percent();
        let reload_below = self.config.reload_percent;
        let external_below = reload_below + self.config.external_change_percent;
        let settle_below = external_below + self.config.settle_percent;

        if roll < reload_below {
            self.reload()?;
        } else if roll < external_below {
            self.external_change()?;
        } else if roll < settle_below && !self.in_flight.is_empty() {
            self.settle_one();
        } else {
            self.begin_one();
        }
        Ok(())
    }

    fn record(&mut self, action: Action) {
        trace!(step = self.step, ?action, "sim step");
        self.trace.push(TraceStep {
            step: self.step,
            action,
        });
    }

    fn reload(&mut self) -> Result<()> {
        let count = protocol::reload(&mut self.store, &mut self.source)?;
        self.last_reload = self.store.tasks().map(|t| t.id.clone()).collect();
        self.stats.reloads += 1;
        self.record(Action::Reload { count });
        Ok(())
    }

    fn begin_one(&mut self) {
        let id = if self.source.tasks().is_empty() || self.rng.chance(self.config.miss_percent) {
            TaskId::new(format!("ghost-{}", self.rng.index(4)))
        } else {
            let tasks = self.source.tasks();
            tasks[self.rng.index(tasks.len())].id.clone()
        };
        let to = self.rng.status();

        let before = self.store.snapshot();
        let pending = protocol::begin_move(&mut self.store, &id, to);
        self.violations.extend(check_isolation(self.step, &id, &before, &self.store.snapshot()));

        let hit = pending.is_some();
        if let Some(pending) = pending {
            self.stats.moves_begun += 1;
            if self.rng.chance(self.config.fail_percent) {
                self.source.fail_next(1);
            }
            let outcome = MoveOutcome::from(self.source.set_status(&id, to));
            self.source.clear_failures();
            self.in_flight.push(InFlight { pending, outcome });
        } else {
            self.stats.misses += 1;
        }
        self.record(Action::Begin { id, to, hit });
    }

    fn settle_one(&mut self) {
        let idx = self.rng.index(self.in_flight.len());
        let InFlight { pending, outcome } = self.in_flight.swap_remove(idx);
        let id = pending.id().clone();

        let rejected = matches!(outcome, MoveOutcome::Rejected(_));
        let written_since = self
            .store
            .entry_revision(&id)
            .is_some_and(|rev| rev != pending.token().revision());

        let before = self.store.snapshot();
        let settlement = pending.settle(&mut self.store, outcome, self.config.policy);
        self.violations.extend(check_isolation(self.step, &id, &before, &self.store.snapshot()));

        match settlement {
            Settlement::Confirmed => self.stats.confirmed += 1,
            Settlement::Reverted => {
                self.stats.reverted += 1;
                if rejected && written_since && self.config.policy == RevertPolicy::Forced {
                    self.stats.forced_clobbers += 1;
                }
            }
            Settlement::RevertSkipped(RevertOutcome::Stale) => self.stats.skipped_stale += 1,
            Settlement::RevertSkipped(_) => self.stats.skipped_missing += 1,
        }
        self.record(Action::Settle { id, settlement });
    }

    fn external_change(&mut self) -> Result<()> {
        self.stats.external_changes += 1;
        let roll = self.rng.percent();

        if roll < 15 || self.source.tasks().is_empty() {
            let n = self.source.tasks().len();
            let task = Task::new(next_task_id(self.source.tasks())?, format!("added {n}"), self.rng.status())
                .with_created_at(sim_time(n));
            let id = task.id.clone();
            self.source.insert(task);
            self.record(Action::ExternalCreate { id });
        } else if roll < 25 {
            let tasks = self.source.tasks();
            let id = tasks[self.rng.index(tasks.len())].id.clone();
            self.source.remove(&id);
            self.record(Action::ExternalDelete { id });
        } else {
            let tasks = self.source.tasks();
            let id = tasks[self.rng.index(tasks.len())].id.clone();
            let to = self.rng.status();
            self.source.force_status(&id, to);
            self.record(Action::ExternalStatus { id, to });
        }
        Ok(())
    }

    fn count_divergent(&self) -> u64 {
        let diverged = self
            .store
            .tasks()
            .filter(|t| self.source.get(&t.id).is_some_and(|s| s.status != t.status))
            .count();
        u64::try_from(diverged).unwrap_or(u64::MAX)
    }
}

fn sim_time(n: usize) -> DateTime<Utc> {
    let offset = i64::try_from(n).unwrap_or(0) * 60;
    DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap_or_default()
}

/// Run one configured simulation.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn simulate(config: SimulationConfig) -> Result<SimulationResult> {
    Simulator::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_passes_oracle() {
        let result = simulate(SimulationConfig::default()).unwrap();
        let oracle = result.check();
        assert!(oracle.passed, "violations: {:?}", oracle.violations);
        assert!(!result.trace.is_empty());
    }

    #[test]
    fn same_seed_replays_identically() {
        let config = SimulationConfig {
            seed: 42,
            ..SimulationConfig::default()
        };
        let a = simulate(config.clone()).unwrap();
        let b = simulate(config).unwrap();
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn no_failures_means_no_reverts() {
        let config = SimulationConfig {
            fail_percent: 0,
            external_change_percent: 0,
            reload_percent: 0,
            miss_percent: 0,
            ..SimulationConfig::default()
        };
        let result = simulate(config).unwrap();
        assert_eq!(result.stats.reverted, 0);
        assert_eq!(result.stats.skipped_stale + result.stats.skipped_missing, 0);
        assert_eq!(result.stats.confirmed, result.stats.moves_begun);
        assert_eq!(result.stats.diverged_before_reload, 0);
    }

    #[test]
    fn all_failures_without_interference_restore_everything() {
        let config = SimulationConfig {
            fail_percent: 100,
            external_change_percent: 0,
            reload_percent: 0,
            settle_percent: 100,
            miss_percent: 0,
            ..SimulationConfig::default()
        };
        let result = simulate(config).unwrap();
        // Each move settles on the very next step, so nothing is ever stale.
        assert_eq!(result.stats.reverted, result.stats.moves_begun);
        assert_eq!(result.stats.diverged_before_reload, 0);
        assert!(result.check().passed);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            reload_percent: 60,
            settle_percent: 60,
            ..SimulationConfig::default()
        };
        assert!(Simulator::new(config).is_err());

        let config = SimulationConfig {
            steps: 0,
            ..SimulationConfig::default()
        };
        assert!(simulate(config).is_err());
    }
}
