//! `tl add`: create a task in the authoritative task file.

use crate::cmd::{OpenSource, open_source, parse_status, show};
use crate::output::{CliError, OutputMode, render_error, render_mode};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use std::path::Path;
use tracing::info;
use trellis_core::NewTask;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task title.
    #[arg(long)]
    pub title: String,

    /// Starting column (default: backlog).
    #[arg(short, long)]
    pub status: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    /// Due date as YYYY-MM-DD.
    #[arg(long)]
    pub due: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,
}

fn parse_due(raw: &str, output: OutputMode) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").or_else(|e| {
        render_error(
            output,
            &CliError::with_details(
                format!("invalid due date '{raw}': {e}"),
                "Use YYYY-MM-DD, e.g. 2026-03-31",
                "invalid_date",
            ),
        )?;
        anyhow::bail!("invalid due date '{raw}'")
    })
}

/// Execute `tl add`.
///
/// # Errors
///
/// Returns an error if the board is not initialized, an argument does not
/// parse, or the task file cannot be written.
pub fn run_add(args: &AddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        render_error(
            output,
            &CliError::with_details("title must not be empty", "Pass --title \"...\"", "empty_title"),
        )?;
        anyhow::bail!("title must not be empty");
    }

    let status = args
        .status
        .as_deref()
        .map(|raw| parse_status(raw, output))
        .transpose()?;

    let due = args.due.as_deref().map(|raw| parse_due(raw, output)).transpose()?;

    let OpenSource { source, .. } = open_source(project_root, output)?;

    let draft = NewTask {
        title: title.to_string(),
        status,
        description: args.description.clone(),
        assignee: args.assignee.clone(),
        project: args.project.clone(),
        due,
    };

    let task = match source.create(draft) {
        Ok(task) => task,
        Err(e) => {
            render_error(output, &CliError::from(&e))?;
            return Err(e.into());
        }
    };
    info!(task = %task.id, status = %task.status, "task created");

    render_mode(
        output,
        &task,
        |t, w| writeln!(w, "{}  {}  {}", t.id, t.status, t.title),
        |t, w| {
            writeln!(w, "✓ Created {}", t.id)?;
            show::write_task_detail(w, t)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: AddArgs,
    }

    #[test]
    fn add_args_require_title() {
        assert!(Wrapper::try_parse_from(["test"]).is_err());
        let w = Wrapper::parse_from(["test", "--title", "Write docs"]);
        assert_eq!(w.args.title, "Write docs");
        assert!(w.args.status.is_none());
        assert!(w.args.due.is_none());
    }

    #[test]
    fn add_args_accept_all_fields() {
        let w = Wrapper::parse_from([
            "test",
            "--title",
            "Ship",
            "-s",
            "review",
            "--assignee",
            "sam",
            "--project",
            "web",
            "--due",
            "2026-03-31",
            "-d",
            "cut the release",
        ]);
        assert_eq!(w.args.status.as_deref(), Some("review"));
        assert_eq!(w.args.assignee.as_deref(), Some("sam"));
        assert_eq!(w.args.project.as_deref(), Some("web"));
        assert_eq!(w.args.due.as_deref(), Some("2026-03-31"));
        assert_eq!(w.args.description.as_deref(), Some("cut the release"));
    }
}
