//! Campaign runner for deterministic simulation campaigns.
//!
//! Runs many seeds with the same knobs, collecting pass/fail results and the
//! first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trellis_core::RevertPolicy;

use crate::oracle::OracleResult;
use crate::{SimStats, SimulationConfig, SimulationResult, simulate};

/// Campaign-level configuration: which seeds to run and with what knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub task_count: usize,
    pub steps: u64,
    pub fail_percent: u8,
    pub external_change_percent: u8,
    pub reload_percent: u8,
    pub settle_percent: u8,
    pub miss_percent: u8,
    pub policy: RevertPolicy,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            task_count: sim.task_count,
            steps: sim.steps,
            fail_percent: sim.fail_percent,
            external_change_percent: sim.external_change_percent,
            reload_percent: sim.reload_percent,
            settle_percent: sim.settle_percent,
            miss_percent: sim.miss_percent,
            policy: sim.policy,
        }
    }
}

impl CampaignConfig {
    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            task_count: self.task_count,
            steps: self.steps,
            fail_percent: self.fail_percent,
            external_change_percent: self.external_change_percent,
            reload_percent: self.reload_percent,
            settle_percent: self.settle_percent,
            miss_percent: self.miss_percent,
            policy: self.policy,
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        self.sim_config_for_seed(self.seed_range.start).validate()
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds where a stale revert was skipped or forced through.
    pub interesting_seeds: usize,
    /// Counters summed over every seed.
    pub totals: SimStats,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single seed replayed with its oracle verdict.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_seeds: 0,
        totals: SimStats::default(),
    };

    for seed in config.seed_range.clone() {
        let DetailedTrace { result, oracle } = replay_seed(seed, config)?;
        report.seeds_run += 1;
        report.totals.absorb(&result.stats);
        if result.interesting() {
            report.interesting_seeds += 1;
        }

        if oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: oracle.violations.iter().map(ToString::to_string).collect(),
            });
        }
    }

    info!(
        seeds_run = report.seeds_run,
        seeds_passed = report.seeds_passed,
        policy = %config.policy,
        "campaign finished"
    );
    Ok(report)
}

/// Replay a single seed with full trace details for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let result = simulate(config.sim_config_for_seed(seed))?;
    let oracle = result.check();
    Ok(DetailedTrace { result, oracle })
}
