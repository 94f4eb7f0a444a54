#![forbid(unsafe_code)]

use anyhow::Result;
use trellis_sim::campaign::{CampaignConfig, run_campaign};

fn main() -> Result<()> {
    let report = run_campaign(&CampaignConfig::default())?;

    if std::env::args().any(|arg| arg == "--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "campaign complete: seeds={} passed={} interesting={} first_failure={}",
            report.seeds_run,
            report.seeds_passed,
            report.interesting_seeds,
            report.first_failure.map_or_else(|| "none".to_string(), |seed| seed.to_string())
        );
    }

    if !report.all_passed() {
        anyhow::bail!("{} seed(s) failed", report.failures.len());
    }
    Ok(())
}
