//! `tl move`: move a task to another column through the optimistic protocol.
//!
//! The board is updated first, then the task file. If the file write fails
//! (or `--reject` stands in for a failure), the board snaps back according to
//! the configured revert policy.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use crate::cmd::{LoadedBoard, load_board, parse_status, task_not_found};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::debug;
use trellis_core::{
    BoardChange, MoveReport, RevertPolicy, Settlement, SourceError, Status, Task, TaskId, TaskSource, protocol,
};

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Task ID to move.
    pub id: String,

    /// Target column: backlog, in-progress, review, done.
    pub status: String,

    /// Have the task file refuse the change, to see the board snap back.
    #[arg(long)]
    pub reject: bool,
}

/// Source wrapper that refuses every status change.
struct Rejecting<'a, S: TaskSource> {
    inner: &'a mut S,
}

impl<S: TaskSource> TaskSource for Rejecting<'_, S> {
    fn load_all(&mut self) -> Result<Vec<Task>, SourceError> {
        self.inner.load_all()
    }

    fn set_status(&mut self, id: &TaskId, _status: Status) -> Result<(), SourceError> {
        Err(SourceError::Rejected {
            id: id.clone(),
            reason: "refused by --reject".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MoveOutput {
    #[serde(flatten)]
    report: MoveReport,
    policy: RevertPolicy,
    /// Status on the board once the move settled.
    now: Option<Status>,
    changes: Vec<BoardChange>,
}

fn settlement_label(settlement: Settlement) -> &'static str {
    match settlement {
        Settlement::Confirmed => "confirmed",
        Settlement::Reverted => "reverted",
        Settlement::RevertSkipped(_) => "revert skipped",
    }
}

fn write_move_text(w: &mut dyn Write, out: &MoveOutput) -> io::Result<()> {
    let r = &out.report;
    write!(w, "{} {} -> {} {}", r.id, r.from, r.to, settlement_label(r.settlement))?;
    if let Some(now) = out.now {
        write!(w, " now={now}")?;
    }
    writeln!(w)?;
    if let Some(reason) = &r.rejection {
        writeln!(w, "rejection={reason}")?;
    }
    Ok(())
}

fn write_move_pretty(w: &mut dyn Write, out: &MoveOutput) -> io::Result<()> {
    let r = &out.report;
    match r.settlement {
        Settlement::Confirmed => writeln!(w, "✓ Moved {} from {} to {}", r.id, r.from.title(), r.to.title())?,
        Settlement::Reverted => writeln!(w, "✗ Move of {} rejected; snapped back to {}", r.id, r.from.title())?,
        Settlement::RevertSkipped(outcome) => {
            writeln!(w, "✗ Move of {} rejected; board left as is ({outcome})", r.id)?;
        }
    }
    if let Some(reason) = &r.rejection {
        writeln!(w)?;
        pretty_section(w, "Rejection")?;
        pretty_kv(w, "Reason", reason)?;
        pretty_kv(w, "Policy", out.policy.as_str())?;
    }
    Ok(())
}

/// Execute `tl move <id> <status>`.
///
/// A rejected move is reported, not treated as a command failure.
///
/// # Errors
///
/// Returns an error if the board cannot be loaded, the status is invalid or
/// the task is not on the board.
pub fn run_move(args: &MoveArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let to = parse_status(&args.status, output)?;
    let LoadedBoard {
        config,
        mut source,
        mut store,
    } = load_board(project_root, output)?;
    let policy = config.board.revert_policy;
    let id = TaskId::new(args.id.trim());

    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    store.subscribe(move |change: &BoardChange| {
        debug!(?change, "board changed");
        sink.borrow_mut().push(change.clone());
    });

    let report = if args.reject {
        protocol::move_task(&mut store, &mut Rejecting { inner: &mut source }, &id, to, policy)
    } else {
        protocol::move_task(&mut store, &mut source, &id, to, policy)
    };
    let Some(report) = report else {
        return Err(task_not_found(id.as_str(), output));
    };

    let out = MoveOutput {
        now: store.status_of(&id),
        report,
        policy,
        changes: changes.take(),
    };

    render_mode(output, &out, |o, w| write_move_text(w, o), |o, w| write_move_pretty(w, o))
}
