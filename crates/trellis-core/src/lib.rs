//! trellis-core library.
//!
//! A client-side task board that applies status moves speculatively and
//! reconciles them against an authoritative source.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` errors at library seams (`SourceError`,
//!   `ParseStatusError`), each mapped to an [`error::ErrorCode`];
//!   `anyhow::Result` for config loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod board;
pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod protocol;
pub mod source;

pub use board::{BoardChange, BoardObserver, BoardStore, RevertOutcome, UndoToken};
pub use model::{NewTask, Status, Task, TaskId};
pub use protocol::{MoveOutcome, MoveReport, PendingMove, RevertPolicy, Settlement};
pub use source::{JsonFileSource, MemorySource, SourceError, TaskSource};
