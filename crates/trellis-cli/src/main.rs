#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use trellis_core::config::load_user_config;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "trellis: a task board with optimistic moves",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, `FORMAT` and the user config.
    fn output_mode(&self) -> OutputMode {
        let user_output = match load_user_config() {
            Ok(cfg) => cfg.output,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "ignoring unreadable user config");
                None
            }
        };
        output::resolve_output_mode(self.format, self.json, user_output.as_deref())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a trellis board",
        long_about = "Create .trellis/ with a default config and an empty task file.",
        after_help = "EXAMPLES:\n    # Initialize a board in the current directory\n    tl init\n\n    # Rewrite the config, keeping tasks\n    tl init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Add a task",
        long_about = "Create a task in the task file. New tasks start in backlog unless --status is given.",
        after_help = "EXAMPLES:\n    # Add a task\n    tl add --title \"Write release notes\"\n\n    # Add straight into review with an owner and due date\n    tl add --title \"Ship v2\" --status review --assignee sam --due 2026-03-31"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Read",
        about = "List tasks",
        after_help = "EXAMPLES:\n    # All tasks\n    tl list\n\n    # Only what is in review, as JSON\n    tl list --status review --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show tasks grouped by column",
        after_help = "EXAMPLES:\n    # Kanban view\n    tl board\n\n    # Skip empty columns\n    tl board --hide-empty"
    )]
    Board(cmd::board::BoardArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one task",
        after_help = "EXAMPLES:\n    # Show a task\n    tl show t3\n\n    # Emit machine-readable output\n    tl show t3 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Move a task to another column",
        long_about = "Move a task optimistically: the board changes first, then the task file.\n\
                      If the file refuses the change the board snaps back.",
        after_help = "EXAMPLES:\n    # Move a task into review\n    tl move t3 review\n\n    # Watch a refused move snap back\n    tl move t3 done --reject"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        next_help_heading = "Development",
        about = "Run a deterministic simulation campaign",
        long_about = "Run seeded interleavings of moves, out-of-order settlements, reloads and\n\
                      edits from other clients, and check board invariants for every seed.",
        after_help = "EXAMPLES:\n    # 100 seeds with defaults\n    tl sim\n\n    # See the forced-revert race\n    tl sim --seeds 200 --fail-percent 50 --policy forced"
    )]
    Sim(cmd::sim::SimArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TRELLIS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "trellis=debug,info"
        } else {
            "trellis=info,warn"
        })
    });

    let format = env::var("TRELLIS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Add(ref args) => cmd::add::run_add(args, output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Board(ref args) => cmd::board::run_board(args, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
        Commands::Move(ref args) => cmd::move_cmd::run_move(args, output, &project_root),
        Commands::Sim(ref args) => cmd::sim::run_sim(args, output),
    }
}
