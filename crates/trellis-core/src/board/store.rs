//! The board state store.
//!
//! Holds the client's view of every task on the board and applies three
//! kinds of change to it:
//!
//! | Operation | Effect |
//! |---|---|
//! | [`BoardStore::replace_snapshot`] | wholesale replacement from the authoritative source |
//! | [`BoardStore::apply_speculative_status`] | set one task's status before the source confirms |
//! | [`BoardStore::revert_status`] / [`BoardStore::revert`] | put a rejected change back |
//!
//! The store does no I/O and never fails. A status write that targets an
//! absent identifier is a silent miss, since callers routinely race with
//! reloads.
//!
//! Every entry carries a private revision drawn from one store-wide counter.
//! Reloads stamp all entries, status writes stamp the written entry. An
//! [`UndoToken`] remembers the revision its speculative write produced, so
//! [`BoardStore::revert`] can tell whether anything has touched the task
//! since and refuse to clobber a newer value.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use super::observer::{BoardChange, BoardObserver, RevertOutcome};
use crate::model::{Status, Task, TaskId};

#[derive(Debug, Clone)]
struct Entry {
    task: Task,
    revision: u64,
}

/// Proof of a speculative status write, consumed by [`BoardStore::revert`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping the token loses the ability to revert safely"]
pub struct UndoToken {
    id: TaskId,
    previous: Status,
    revision: u64,
}

impl UndoToken {
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Status the task had before the speculative write.
    #[must_use]
    pub const fn previous(&self) -> Status {
        self.previous
    }

    /// Entry revision produced by the speculative write.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}

/// Client-side board snapshot with speculative status updates.
#[derive(Default)]
pub struct BoardStore {
    entries: Vec<Entry>,
    index: HashMap<TaskId, usize>,
    revision: u64,
    observers: Vec<Box<dyn BoardObserver>>,
}

impl fmt::Debug for BoardStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardStore")
            .field("tasks", &self.entries.len())
            .field("revision", &self.revision)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl BoardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store already holding `tasks`. Observers added later are not
    /// told about this initial load.
    #[must_use]
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut store = Self::new();
        store.load(tasks);
        store
    }

    /// Register an observer that is notified after every operation.
    pub fn subscribe(&mut self, observer: impl BoardObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Replace the whole snapshot with authoritative data.
    ///
    /// The snapshot afterwards is exactly `tasks`, in order. If the source
    /// hands back the same identifier twice, the later task wins and keeps
    /// the earlier position.
    pub fn replace_snapshot(&mut self, tasks: impl IntoIterator<Item = Task>) {
        let revision = self.load(tasks);
        debug!(count = self.entries.len(), revision, "board snapshot replaced");
        self.notify(&BoardChange::Replaced {
            count: self.entries.len(),
            revision,
        });
    }

    /// Set `id`'s status ahead of authoritative confirmation.
    ///
    /// Returns `None` and leaves the snapshot untouched when `id` is absent.
    pub fn apply_speculative_status(&mut self, id: &TaskId, status: Status) -> Option<UndoToken> {
        let written = self.write_status(id, status);
        let token = written.map(|(previous, revision)| UndoToken {
            id: id.clone(),
            previous,
            revision,
        });

        match &token {
            Some(t) => debug!(task = %id, from = %t.previous, to = %status, "speculative status applied"),
            None => debug!(task = %id, to = %status, "speculative status missed: task not on board"),
        }

        self.notify(&BoardChange::Speculative {
            id: id.clone(),
            from: token.as_ref().map(UndoToken::previous),
            to: status,
            revision: token.as_ref().map(UndoToken::revision),
        });
        token
    }

    /// Write `previous` back onto `id` unconditionally.
    ///
    /// Mechanically identical to [`apply_speculative_status`]; it cannot tell
    /// a genuine revert from any other status write and will overwrite a
    /// change made since the speculative write. Returns whether the task was
    /// present.
    ///
    /// [`apply_speculative_status`]: Self::apply_speculative_status
    pub fn revert_status(&mut self, id: &TaskId, previous: Status) -> bool {
        let hit = self.write_status(id, previous).is_some();
        let outcome = if hit {
            debug!(task = %id, to = %previous, "status reverted");
            RevertOutcome::Restored
        } else {
            debug!(task = %id, to = %previous, "revert missed: task not on board");
            RevertOutcome::Missing
        };

        self.notify(&BoardChange::Reverted {
            id: id.clone(),
            to: previous,
            outcome,
            token_revision: None,
        });
        hit
    }

    /// Undo a speculative write only if nothing has written the task since.
    pub fn revert(&mut self, token: UndoToken) -> RevertOutcome {
        let outcome = match self.entry_revision(&token.id) {
            None => RevertOutcome::Missing,
            Some(current) if current != token.revision => RevertOutcome::Stale,
            Some(_) => {
                self.write_status(&token.id, token.previous);
                RevertOutcome::Restored
            }
        };

        match outcome {
            RevertOutcome::Restored => {
                debug!(task = %token.id, to = %token.previous, "speculative status undone");
            }
            RevertOutcome::Stale => debug!(
                task = %token.id,
                token_revision = token.revision,
                "skipping stale revert: task changed after speculative write"
            ),
            RevertOutcome::Missing => {
                debug!(task = %token.id, "revert missed: task not on board");
            }
        }

        self.notify(&BoardChange::Reverted {
            id: token.id,
            to: token.previous,
            outcome,
            token_revision: Some(token.revision),
        });
        outcome
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current snapshot in authoritative order.
    pub fn tasks(&self) -> impl ExactSizeIterator<Item = &Task> + '_ {
        self.entries.iter().map(|e| &e.task)
    }

    /// Owned copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.entries[pos].task)
    }

    #[must_use]
    pub fn status_of(&self, id: &TaskId) -> Option<Status> {
        self.get(id).map(|t| t.status)
    }

    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tasks grouped into one column per status, in [`Status::ALL`] order.
    /// Empty columns are included.
    #[must_use]
    pub fn columns(&self) -> Vec<(Status, Vec<&Task>)> {
        Status::ALL
            .iter()
            .map(|&status| {
                let tasks = self.tasks().filter(|t| t.status == status).collect();
                (status, tasks)
            })
            .collect()
    }

    /// Store-wide revision counter. Changes whenever the snapshot does.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision of the last write to `id`.
    #[must_use]
    pub fn entry_revision(&self, id: &TaskId) -> Option<u64> {
        self.index.get(id).map(|&pos| self.entries[pos].revision)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn load(&mut self, tasks: impl IntoIterator<Item = Task>) -> u64 {
        let revision = self.next_revision();
        let mut entries: Vec<Entry> = Vec::new();
        let mut index = HashMap::new();

        for task in tasks {
            if let Some(&pos) = index.get(&task.id) {
                warn!(task = %task.id, "authoritative snapshot repeats a task id; keeping the later copy");
                entries[pos] = Entry { task, revision };
                continue;
            }
            index.insert(task.id.clone(), entries.len());
            entries.push(Entry { task, revision });
        }

        self.entries = entries;
        self.index = index;
        revision
    }

    /// Returns the previous status and the new entry revision on a hit.
    fn write_status(&mut self, id: &TaskId, status: Status) -> Option<(Status, u64)> {
        let pos = *self.index.get(id)?;
        let revision = self.next_revision();
        let entry = &mut self.entries[pos];
        let previous = std::mem::replace(&mut entry.task.status, status);
        entry.revision = revision;
        Some((previous, revision))
    }

    fn notify(&mut self, change: &BoardChange) {
        for observer in &mut self.observers {
            observer.on_change(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn task(id: &str, status: Status) -> Task {
        Task::new(id, format!("task {id}"), status)
    }

    fn id(raw: &str) -> TaskId {
        TaskId::from(raw)
    }

    fn recording_store(tasks: Vec<Task>) -> (BoardStore, Rc<RefCell<Vec<BoardChange>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut store = BoardStore::with_tasks(tasks);
        let sink = Rc::clone(&log);
        store.subscribe(move |change: &BoardChange| sink.borrow_mut().push(change.clone()));
        (store, log)
    }

    #[test]
    fn scenario_move_revert_miss_replace() {
        let t1 = task("t1", Status::Backlog);
        let t2 = task("t2", Status::Done);
        let mut store = BoardStore::new();
        store.replace_snapshot(vec![t1.clone(), t2.clone()]);
        let original = store.snapshot();

        let token = store.apply_speculative_status(&id("t1"), Status::InProgress);
        assert!(token.is_some());
        assert_eq!(store.status_of(&id("t1")), Some(Status::InProgress));
        assert_eq!(store.get(&id("t2")), Some(&t2));

        assert!(store.revert_status(&id("t1"), Status::Backlog));
        assert_eq!(store.snapshot(), original);

        assert!(store.apply_speculative_status(&id("t9"), Status::Done).is_none());
        assert_eq!(store.snapshot(), original);

        let t3 = task("t3", Status::Review);
        store.replace_snapshot(vec![t3.clone()]);
        assert_eq!(store.snapshot(), vec![t3]);
        assert!(!store.contains(&id("t1")));
        assert!(!store.contains(&id("t2")));
    }

    #[test]
    fn speculative_write_touches_only_status() {
        let t1 = task("t1", Status::Backlog).with_assignee("ari").with_project("web");
        let mut store = BoardStore::with_tasks(vec![t1.clone()]);

        let _ = store.apply_speculative_status(&id("t1"), Status::Review);

        let after = store.get(&id("t1")).unwrap();
        assert_eq!(after.status, Status::Review);
        assert_eq!(Task { status: Status::Backlog, ..after.clone() }, t1);
    }

    #[test]
    fn token_captures_previous_status() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Review)]);
        let token = store.apply_speculative_status(&id("t1"), Status::Done).unwrap();
        assert_eq!(token.id(), &id("t1"));
        assert_eq!(token.previous(), Status::Review);
        assert_eq!(store.entry_revision(&id("t1")), Some(token.revision()));
    }

    #[test]
    fn guarded_revert_restores_when_untouched() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let before = store.snapshot();

        let token = store.apply_speculative_status(&id("t1"), Status::Done).unwrap();
        assert_eq!(store.revert(token), RevertOutcome::Restored);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn guarded_revert_is_stale_after_reload() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let token = store.apply_speculative_status(&id("t1"), Status::InProgress).unwrap();

        // Someone else moved it to review; the reload brings that in.
        store.replace_snapshot(vec![task("t1", Status::Review)]);

        assert_eq!(store.revert(token), RevertOutcome::Stale);
        assert_eq!(store.status_of(&id("t1")), Some(Status::Review));
    }

    #[test]
    fn guarded_revert_is_stale_after_later_move() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let first = store.apply_speculative_status(&id("t1"), Status::InProgress).unwrap();
        let _second = store.apply_speculative_status(&id("t1"), Status::Review).unwrap();

        assert_eq!(store.revert(first), RevertOutcome::Stale);
        assert_eq!(store.status_of(&id("t1")), Some(Status::Review));
    }

    #[test]
    fn guarded_revert_reports_missing_after_task_disappears() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let token = store.apply_speculative_status(&id("t1"), Status::Done).unwrap();
        store.replace_snapshot(vec![task("t2", Status::Backlog)]);

        assert_eq!(store.revert(token), RevertOutcome::Missing);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn plain_revert_overwrites_newer_change() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let _ = store.apply_speculative_status(&id("t1"), Status::InProgress);
        store.replace_snapshot(vec![task("t1", Status::Review)]);

        assert!(store.revert_status(&id("t1"), Status::Backlog));
        assert_eq!(store.status_of(&id("t1")), Some(Status::Backlog));
    }

    #[test]
    fn plain_revert_misses_absent_task() {
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let before = store.snapshot();
        assert!(!store.revert_status(&id("gone"), Status::Done));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn duplicate_ids_keep_last_copy_at_first_position() {
        let store = BoardStore::with_tasks(vec![
            task("t1", Status::Backlog),
            task("t2", Status::Review),
            task("t1", Status::Done),
        ]);

        let ids: Vec<&str> = store.tasks().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2"]);
        assert_eq!(store.status_of(&id("t1")), Some(Status::Done));
    }

    #[test]
    fn columns_follow_status_order_and_keep_snapshot_order() {
        let store = BoardStore::with_tasks(vec![
            task("a", Status::Done),
            task("b", Status::Backlog),
            task("c", Status::Done),
        ]);

        let columns = store.columns();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[0].0, Status::Backlog);
        assert_eq!(columns[0].1.len(), 1);
        assert!(columns[1].1.is_empty());
        assert!(columns[2].1.is_empty());
        let done: Vec<&str> = columns[3].1.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(done, ["a", "c"]);
    }

    #[test]
    fn every_operation_notifies_once() {
        let (mut store, log) = recording_store(vec![task("t1", Status::Backlog)]);
        let second = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&second);
        store.subscribe(move |change: &BoardChange| sink.borrow_mut().push(change.clone()));

        store.replace_snapshot(vec![task("t1", Status::Backlog)]);
        let token = store.apply_speculative_status(&id("t1"), Status::Done).unwrap();
        let _ = store.apply_speculative_status(&id("nope"), Status::Done);
        store.revert_status(&id("nope"), Status::Backlog);
        store.revert(token);

        let log = log.borrow();
        assert_eq!(log.len(), 5);
        // Each subscriber gets exactly one call per operation, in the same order.
        assert_eq!(*second.borrow(), *log);
        assert!(matches!(log[0], BoardChange::Replaced { count: 1, .. }));
        assert!(log[1].applied());
        assert!(!log[2].applied());
        assert!(!log[3].applied());
        assert!(matches!(
            log[4],
            BoardChange::Reverted {
                outcome: RevertOutcome::Restored,
                token_revision: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn observers_see_state_after_mutation() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let sink = Rc::clone(&seen);
        store.subscribe(move |change: &BoardChange| {
            if let BoardChange::Speculative { from, to, .. } = change {
                sink.borrow_mut().push((*from, *to));
            }
        });

        let _ = store.apply_speculative_status(&id("t1"), Status::Review);
        assert_eq!(*seen.borrow(), vec![(Some(Status::Backlog), Status::Review)]);
    }

    #[test]
    fn revision_advances_on_every_write() {
        let mut store = BoardStore::new();
        let r0 = store.revision();
        store.replace_snapshot(vec![task("t1", Status::Backlog)]);
        let r1 = store.revision();
        let _ = store.apply_speculative_status(&id("t1"), Status::Done);
        let r2 = store.revision();
        assert!(r0 < r1 && r1 < r2);

        let _ = store.apply_speculative_status(&id("missing"), Status::Done);
        assert_eq!(store.revision(), r2);
    }

    #[test]
    fn debug_output_is_summary() {
        let store = BoardStore::with_tasks(vec![task("t1", Status::Backlog)]);
        let text = format!("{store:?}");
        assert!(text.contains("tasks: 1"));
    }
}
