//! `tl board`: tasks grouped into status columns.

use crate::cmd::list::write_task_row;
use crate::cmd::load_board;
use crate::output::{OutputMode, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use trellis_core::{Status, Task};

#[derive(Args, Debug)]
pub struct BoardArgs {
    /// Leave out columns with no tasks.
    #[arg(long)]
    pub hide_empty: bool,
}

#[derive(Debug, Serialize)]
struct Column<'a> {
    status: Status,
    title: &'static str,
    tasks: Vec<&'a Task>,
}

fn write_board_text(w: &mut dyn Write, columns: &[Column<'_>]) -> io::Result<()> {
    for column in columns {
        writeln!(w, "{} {}", column.status, column.tasks.len())?;
        for task in &column.tasks {
            write!(w, "  ")?;
            write_task_row(w, task)?;
        }
    }
    Ok(())
}

fn write_board_pretty(w: &mut dyn Write, columns: &[Column<'_>]) -> io::Result<()> {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        pretty_section(w, &format!("{} ({})", column.title, column.tasks.len()))?;
        for task in &column.tasks {
            write!(w, "  {:<6} {}", task.id.as_str(), task.title)?;
            if let Some(assignee) = &task.assignee {
                write!(w, "  @{assignee}")?;
            }
            if let Some(due) = task.due {
                write!(w, "  due {due}")?;
            }
            writeln!(w)?;
        }
    }
    Ok(())
}

/// Execute `tl board`.
///
/// # Errors
///
/// Returns an error if the board cannot be loaded.
pub fn run_board(args: &BoardArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let board = load_board(project_root, output)?;
    let columns: Vec<Column<'_>> = board
        .store
        .columns()
        .into_iter()
        .filter(|(_, tasks)| !(args.hide_empty && tasks.is_empty()))
        .map(|(status, tasks)| Column {
            status,
            title: status.title(),
            tasks,
        })
        .collect();

    render_mode(
        output,
        columns.as_slice(),
        |columns, w| write_board_text(w, columns),
        |columns, w| write_board_pretty(w, columns),
    )
}
