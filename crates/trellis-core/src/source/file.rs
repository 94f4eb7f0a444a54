//! Task source backed by a JSON array on disk.
//!
//! Every operation takes an exclusive [`SourceLock`] on `<file>.lock` so
//! concurrent `tl` processes see whole writes. Writes go to a temporary
//! sibling first and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::{SourceError, TaskSource, next_task_id};
use crate::lock::SourceLock;
use crate::model::{NewTask, Status, Task, TaskId};

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty task list if the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken or the file cannot be
    /// written.
    pub fn ensure_exists(&self) -> Result<(), SourceError> {
        let _lock = SourceLock::acquire(&self.lock_path, self.lock_timeout)?;
        if !self.path.exists() {
            self.write_tasks(&[])?;
        }
        Ok(())
    }

    /// Append a task under the next free `t<N>` identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoded or written, or
    /// if the `t<N>` identifiers are used up.
    pub fn create(&self, draft: NewTask) -> Result<Task, SourceError> {
        let _lock = SourceLock::acquire(&self.lock_path, self.lock_timeout)?;
        let mut tasks = self.read_tasks()?;
        let task = draft.into_task(next_task_id(&tasks)?, Utc::now());
        tasks.push(task.clone());
        self.write_tasks(&tasks)?;
        debug!(task = %task.id, path = %self.path.display(), "task created");
        Ok(task)
    }

    fn read_tasks(&self) -> Result<Vec<Task>, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| SourceError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn write_tasks(&self, tasks: &[Task]) -> Result<(), SourceError> {
        let write_err = |source: std::io::Error| SourceError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut body = serde_json::to_string_pretty(tasks).map_err(|e| write_err(e.into()))?;
        body.push('\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

impl TaskSource for JsonFileSource {
    fn load_all(&mut self) -> Result<Vec<Task>, SourceError> {
        let _lock = SourceLock::acquire(&self.lock_path, self.lock_timeout)?;
        self.read_tasks()
    }

    fn set_status(&mut self, id: &TaskId, status: Status) -> Result<(), SourceError> {
        let _lock = SourceLock::acquire(&self.lock_path, self.lock_timeout)?;
        let mut tasks = self.read_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        task.status = status;
        self.write_tasks(&tasks)?;
        debug!(task = %id, %status, path = %self.path.display(), "status persisted");
        Ok(())
    }
}
