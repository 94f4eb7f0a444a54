//! In-process authoritative source with scripted failures.
//!
//! Stands in for the database-backed service in tests and in the simulator.
//! It can be told to reject upcoming writes, to reject writes to particular
//! tasks, and to change tasks behind the board's back.

use std::collections::HashSet;

use chrono::Utc;

use super::{SourceError, TaskSource, next_task_id};
use crate::model::{NewTask, Status, Task, TaskId};

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tasks: Vec<Task>,
    fail_next: u32,
    fail_ids: HashSet<TaskId>,
    writes: u64,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Number of status writes that were durably applied.
    #[must_use]
    pub const fn applied_writes(&self) -> u64 {
        self.writes
    }

    /// Create a task under the next free `t<N>` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::IdsExhausted`] if no identifier is left.
    pub fn create(&mut self, draft: NewTask) -> Result<Task, SourceError> {
        let task = draft.into_task(next_task_id(&self.tasks)?, Utc::now());
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Add or replace a task as-is, keeping its identifier.
    pub fn insert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Delete a task, as another client would. Returns whether it existed.
    pub fn remove(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| &t.id != id);
        self.tasks.len() != before
    }

    /// Change a status without going through [`TaskSource::set_status`],
    /// ignoring injected failures. Models a concurrent edit by someone else.
    pub fn force_status(&mut self, id: &TaskId, status: Status) -> bool {
        match self.tasks.iter_mut().find(|t| &t.id == id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    /// Reject the next `count` calls to `set_status`.
    pub const fn fail_next(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Reject every `set_status` for `id` until cleared.
    pub fn fail_on(&mut self, id: impl Into<TaskId>) {
        self.fail_ids.insert(id.into());
    }

    pub fn clear_failures(&mut self) {
        self.fail_next = 0;
        self.fail_ids.clear();
    }
}

impl TaskSource for MemorySource {
    fn load_all(&mut self) -> Result<Vec<Task>, SourceError> {
        Ok(self.tasks.clone())
    }

    fn set_status(&mut self, id: &TaskId, status: Status) -> Result<(), SourceError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SourceError::Rejected {
                id: id.clone(),
                reason: "injected failure".to_string(),
            });
        }
        if self.fail_ids.contains(id) {
            return Err(SourceError::Rejected {
                id: id.clone(),
                reason: "writes to this task are failing".to_string(),
            });
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        task.status = status;
        self.writes += 1;
        Ok(())
    }
}
