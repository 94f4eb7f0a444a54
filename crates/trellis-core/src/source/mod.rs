//! Authoritative task sources.
//!
//! The board store never talks to a source itself; callers load from a
//! [`TaskSource`] into the store and send status changes to it, as laid out
//! in [`crate::protocol`].

pub mod file;
pub mod memory;

use std::io;
use std::path::PathBuf;

use crate::error::ErrorCode;
use crate::lock::LockError;
use crate::model::{Status, Task, TaskId};

pub use file::JsonFileSource;
pub use memory::MemorySource;

/// System of record for task data.
pub trait TaskSource {
    /// Return every task, in the source's order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_all(&mut self) -> Result<Vec<Task>, SourceError>;

    /// Durably set `id`'s status.
    ///
    /// # Errors
    ///
    /// Any error means the change was not applied and the caller should
    /// revert its speculative copy.
    fn set_status(&mut self, id: &TaskId, status: Status) -> Result<(), SourceError>;
}

impl<S: TaskSource + ?Sized> TaskSource for &mut S {
    fn load_all(&mut self) -> Result<Vec<Task>, SourceError> {
        (**self).load_all()
    }

    fn set_status(&mut self, id: &TaskId, status: Status) -> Result<(), SourceError> {
        (**self).set_status(id, status)
    }
}

/// Failure reported by an authoritative source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("change to {id} rejected: {reason}")]
    Rejected { id: TaskId, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no task id left after t{highest}")]
    IdsExhausted { highest: u64 },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl SourceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::TaskNotFound,
            Self::Rejected { .. } => ErrorCode::MutationRejected,
            Self::Read { .. } | Self::Decode { .. } => ErrorCode::SourceReadFailed,
            Self::Write { .. } => ErrorCode::SourceWriteFailed,
            Self::IdsExhausted { .. } => ErrorCode::IdSpaceExhausted,
            Self::Lock(e) => e.code(),
        }
    }
}

/// Next free identifier of the form `t<N>`, one past the highest in use.
///
/// Identifiers that do not follow the pattern are ignored.
///
/// # Errors
///
/// Returns [`SourceError::IdsExhausted`] if the highest id in use is
/// `t18446744073709551615`.
pub fn next_task_id(tasks: &[Task]) -> Result<TaskId, SourceError> {
    let highest = tasks
        .iter()
        .filter_map(|t| t.id.as_str().strip_prefix('t'))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    let next = highest
        .checked_add(1)
        .ok_or(SourceError::IdsExhausted { highest })?;
    Ok(TaskId::new(format!("t{next}")))
}
