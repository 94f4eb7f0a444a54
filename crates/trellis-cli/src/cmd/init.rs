//! `tl init`: set up `.trellis/` in the current directory.

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tracing::info;
use trellis_core::JsonFileSource;
use trellis_core::config::{BOARD_DIR, load_project_config};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config even if `.trellis/` already exists. Existing tasks are kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[board]\n\
    revert_policy = \"guarded\"\n\
    \n\
    [source]\n\
    path = \"tasks.json\"\n\
    lock_timeout_ms = 2000\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    board_dir: String,
    config: String,
    tasks_file: String,
}

/// Execute `tl init`. Creates:
///
/// ```text
/// .trellis/
///   config.toml   (default project config)
///   tasks.json    (empty task list)
/// ```
///
/// # Errors
///
/// Returns an error if `.trellis/` already exists and `--force` is not set,
/// or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let board_dir = project_root.join(BOARD_DIR);

    if board_dir.exists() && !args.force {
        render_error(
            output,
            &CliError::with_details(
                format!("{BOARD_DIR}/ already exists"),
                "Use `tl init --force` to reinitialize.",
                "already_initialized",
            ),
        )?;
        anyhow::bail!("{BOARD_DIR}/ already exists");
    }

    std::fs::create_dir_all(&board_dir)
        .with_context(|| format!("Failed to create {}", board_dir.display()))?;

    let config_path = board_dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let config = load_project_config(project_root)?;
    let source = JsonFileSource::new(
        config.source.resolve_path(project_root),
        config.source.lock_timeout(),
    );
    source.ensure_exists()?;
    info!(path = %source.path().display(), "board initialized");

    let out = InitOutput {
        board_dir: board_dir.display().to_string(),
        config: config_path.display().to_string(),
        tasks_file: source.path().display().to_string(),
    };

    render_mode(
        output,
        &out,
        |o, w| writeln!(w, "initialized {}", o.board_dir),
        |o, w| {
            writeln!(w, "✓ Initialized {BOARD_DIR}/")?;
            writeln!(w)?;
            pretty_section(w, "Files")?;
            pretty_kv(w, "Config", &o.config)?;
            pretty_kv(w, "Tasks", &o.tasks_file)?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  tl add --title \"My first task\"")?;
            writeln!(w, "  tl board")
        },
    )
}
