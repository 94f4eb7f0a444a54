//! `tl list`: list tasks in source order.

use crate::cmd::{load_board, parse_status};
use crate::output::{OutputMode, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use trellis_core::Task;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show tasks in this column: backlog, in-progress, review, done.
    #[arg(short, long)]
    pub status: Option<String>,
}

/// One text row: `ID  STATUS  TITLE`, plus assignee when set.
pub fn write_task_row(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    write!(w, "{}  {}  {}", task.id, task.status, task.title)?;
    if let Some(assignee) = &task.assignee {
        write!(w, "  @{assignee}")?;
    }
    writeln!(w)
}

fn write_list_pretty(w: &mut dyn Write, tasks: &[&Task]) -> io::Result<()> {
    pretty_section(w, &format!("Tasks ({})", tasks.len()))?;
    if tasks.is_empty() {
        return writeln!(w, "(none)");
    }
    for task in tasks {
        write!(w, "{:<6} {:<12} {}", task.id.as_str(), task.status.title(), task.title)?;
        if let Some(assignee) = &task.assignee {
            write!(w, "  @{assignee}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Execute `tl list`.
///
/// # Errors
///
/// Returns an error if the board cannot be loaded or `--status` is invalid.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let filter = args
        .status
        .as_deref()
        .map(|raw| parse_status(raw, output))
        .transpose()?;

    let board = load_board(project_root, output)?;
    let tasks: Vec<&Task> = board
        .store
        .tasks()
        .filter(|t| filter.is_none_or(|s| t.status == s))
        .collect();

    render_mode(
        output,
        tasks.as_slice(),
        |tasks, w| {
            for task in tasks {
                write_task_row(w, task)?;
            }
            Ok(())
        },
        |tasks, w| write_list_pretty(w, tasks),
    )
}
