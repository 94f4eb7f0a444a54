//! `tl sim`: deterministic simulation campaign over the move protocol.
//!
//! Runs seeded interleavings of speculative moves, out-of-order settlements,
//! reloads and edits from other clients, and checks the board invariants
//! after each seed.

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use trellis_core::RevertPolicy;
use trellis_sim::SimStats;
use trellis_sim::campaign::{CampaignConfig, CampaignReport, SeedFailure, run_campaign};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Guarded,
    Forced,
}

impl From<PolicyArg> for RevertPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Guarded => Self::Guarded,
            PolicyArg::Forced => Self::Forced,
        }
    }
}

#[derive(Args, Debug)]
pub struct SimArgs {
    /// Number of seeds to run.
    #[arg(long, default_value = "100")]
    pub seeds: u64,

    /// First seed.
    #[arg(long, default_value = "0")]
    pub seed_start: u64,

    /// Steps per seed.
    #[arg(long, default_value = "64")]
    pub steps: u64,

    /// Tasks on the board at the start of each seed.
    #[arg(long, default_value = "6")]
    pub tasks: usize,

    /// Percent of authoritative writes that fail.
    #[arg(long, default_value = "25", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub fail_percent: u8,

    /// How rejected moves are reverted.
    #[arg(long, value_enum, default_value = "guarded")]
    pub policy: PolicyArg,
}

impl SimArgs {
    fn campaign_config(&self) -> CampaignConfig {
        CampaignConfig {
            seed_range: self.seed_start..self.seed_start.saturating_add(self.seeds),
            task_count: self.tasks,
            steps: self.steps,
            fail_percent: self.fail_percent,
            policy: self.policy.into(),
            ..CampaignConfig::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct SimOutput {
    policy: RevertPolicy,
    seeds_run: usize,
    seeds_passed: usize,
    seeds_failed: usize,
    first_failure: Option<u64>,
    interesting_seeds: usize,
    all_passed: bool,
    totals: SimStats,
    failures: Vec<SeedFailure>,
}

impl SimOutput {
    fn new(policy: RevertPolicy, report: CampaignReport) -> Self {
        Self {
            policy,
            seeds_run: report.seeds_run,
            seeds_passed: report.seeds_passed,
            seeds_failed: report.failures.len(),
            first_failure: report.first_failure,
            interesting_seeds: report.interesting_seeds,
            all_passed: report.failures.is_empty(),
            totals: report.totals,
            failures: report.failures,
        }
    }
}

fn write_sim_text(w: &mut dyn Write, out: &SimOutput) -> io::Result<()> {
    let t = &out.totals;
    writeln!(
        w,
        "campaign policy={} seeds_run={} passed={} failed={} interesting={}",
        out.policy, out.seeds_run, out.seeds_passed, out.seeds_failed, out.interesting_seeds
    )?;
    writeln!(
        w,
        "moves begun={} confirmed={} reverted={} skipped_stale={} skipped_missing={} forced_clobbers={}",
        t.moves_begun, t.confirmed, t.reverted, t.skipped_stale, t.skipped_missing, t.forced_clobbers
    )?;
    for failure in out.failures.iter().take(5) {
        writeln!(w, "failure seed={} violations={}", failure.seed, failure.violations.len())?;
    }
    if out.failures.len() > 5 {
        writeln!(w, "failures_truncated count={}", out.failures.len() - 5)?;
    }
    Ok(())
}

fn write_sim_pretty(w: &mut dyn Write, out: &SimOutput) -> io::Result<()> {
    let t = &out.totals;
    pretty_section(w, "Simulation Campaign")?;
    pretty_kv(w, "Policy", out.policy.as_str())?;
    pretty_kv(w, "Seeds", out.seeds_run.to_string())?;
    pretty_kv(
        w,
        "Results",
        format!(
            "{} passed / {} failed ({} interesting)",
            out.seeds_passed, out.seeds_failed, out.interesting_seeds
        ),
    )?;
    pretty_kv(
        w,
        "Moves",
        format!(
            "{} begun, {} confirmed, {} reverted, {} missed",
            t.moves_begun, t.confirmed, t.reverted, t.misses
        ),
    )?;
    pretty_kv(
        w,
        "Skipped",
        format!("{} stale, {} missing", t.skipped_stale, t.skipped_missing),
    )?;
    pretty_kv(w, "Clobbers", t.forced_clobbers.to_string())?;
    pretty_kv(w, "Diverged", format!("{} before final reload", t.diverged_before_reload))?;

    if out.all_passed {
        return pretty_kv(w, "Status", "all seeds passed");
    }

    writeln!(w)?;
    pretty_section(w, "Failure Samples")?;
    for failure in out.failures.iter().take(5) {
        writeln!(w, "seed {:<8} violations={}", failure.seed, failure.violations.len())?;
        for violation in &failure.violations {
            writeln!(w, "  - {violation}")?;
        }
    }
    if out.failures.len() > 5 {
        writeln!(w, "... and {} more failures", out.failures.len() - 5)?;
    }
    Ok(())
}

/// Execute `tl sim`.
///
/// # Errors
///
/// Returns an error if the campaign config is invalid or any seed fails.
pub fn run_sim(args: &SimArgs, output: OutputMode) -> Result<()> {
    let config = args.campaign_config();
    let report = run_campaign(&config)?;
    let out = SimOutput::new(config.policy, report);

    render_mode(output, &out, |o, w| write_sim_text(w, o), |o, w| write_sim_pretty(w, o))?;

    if !out.all_passed {
        anyhow::bail!(
            "{} of {} seeds failed (first at seed {})",
            out.seeds_failed,
            out.seeds_run,
            out.first_failure.unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: SimArgs,
    }

    #[test]
    fn sim_args_defaults() {
        let w = Wrapper::parse_from(["test"]);
        assert_eq!(w.args.seeds, 100);
        assert_eq!(w.args.steps, 64);
        assert_eq!(w.args.tasks, 6);
        assert_eq!(w.args.fail_percent, 25);
        assert_eq!(w.args.policy, PolicyArg::Guarded);
    }

    #[test]
    fn sim_args_build_campaign_config() {
        let w = Wrapper::parse_from(["test", "--seeds", "10", "--seed-start", "5", "--policy", "forced"]);
        let config = w.args.campaign_config();
        assert_eq!(config.seed_range, 5..15);
        assert_eq!(config.policy, RevertPolicy::Forced);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fail_percent_above_100_is_rejected() {
        assert!(Wrapper::try_parse_from(["test", "--fail-percent", "101"]).is_err());
    }

    #[test]
    fn small_guarded_campaign_passes() {
        let w = Wrapper::parse_from(["test", "--seeds", "5", "--steps", "24"]);
        let config = w.args.campaign_config();
        let out = SimOutput::new(config.policy, run_campaign(&config).unwrap());
        assert!(out.all_passed);
        assert_eq!(out.seeds_run, 5);

        let mut buf = Vec::new();
        write_sim_text(&mut buf, &out).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("campaign policy=guarded seeds_run=5 passed=5 failed=0"));

        let mut buf = Vec::new();
        write_sim_pretty(&mut buf, &out).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("Policy:      guarded\n"));
    }
}
