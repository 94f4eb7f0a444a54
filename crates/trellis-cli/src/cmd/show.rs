//! `tl show`: display one task.

use crate::cmd::{load_board, task_not_found};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use chrono::Local;
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use trellis_core::{Task, TaskId};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task ID, e.g. `t3`.
    pub id: String,
}

/// Pretty detail block shared by `show` and `add`.
pub fn write_task_detail(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    pretty_section(w, &format!("{}  {}", task.id, task.title))?;
    pretty_kv(w, "Status", task.status.title())?;
    if let Some(assignee) = &task.assignee {
        pretty_kv(w, "Assignee", assignee)?;
    }
    if let Some(project) = &task.project {
        pretty_kv(w, "Project", project)?;
    }
    if let Some(due) = task.due {
        pretty_kv(w, "Due", due.format("%Y-%m-%d").to_string())?;
    }
    pretty_kv(
        w,
        "Created",
        task.created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )?;
    if let Some(description) = &task.description {
        writeln!(w)?;
        for line in description.lines() {
            writeln!(w, "  {line}")?;
        }
    }
    Ok(())
}

/// Text rendering: one `key=value` per line.
fn write_task_text(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    writeln!(w, "id={}", task.id)?;
    writeln!(w, "status={}", task.status)?;
    writeln!(w, "title={}", task.title)?;
    if let Some(assignee) = &task.assignee {
        writeln!(w, "assignee={assignee}")?;
    }
    if let Some(project) = &task.project {
        writeln!(w, "project={project}")?;
    }
    if let Some(due) = task.due {
        writeln!(w, "due={due}")?;
    }
    writeln!(w, "created_at={}", task.created_at.to_rfc3339())?;
    if let Some(description) = &task.description {
        writeln!(w, "description={}", description.replace('\n', "\\n"))?;
    }
    Ok(())
}

/// Execute `tl show <id>`.
///
/// # Errors
///
/// Returns an error if the board cannot be loaded or the task is not on it.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let board = load_board(project_root, output)?;
    let id = TaskId::new(args.id.trim());

    let Some(task) = board.store.get(&id) else {
        return Err(task_not_found(id.as_str(), output));
    };

    render_mode(
        output,
        task,
        |t, w| write_task_text(w, t),
        |t, w| write_task_detail(w, t),
    )
}
