pub mod add;
pub mod board;
pub mod init;
pub mod list;
pub mod move_cmd;
pub mod show;
pub mod sim;

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use trellis_core::config::{self, ProjectConfig};
use trellis_core::error::ErrorCode;
use trellis_core::{BoardStore, JsonFileSource, Status, protocol};

use crate::output::{CliError, OutputMode, render_error};

/// The authoritative file plus the project config it was found through.
pub struct OpenSource {
    pub config: ProjectConfig,
    pub source: JsonFileSource,
}

/// A board freshly loaded from its file source.
pub struct LoadedBoard {
    pub config: ProjectConfig,
    pub source: JsonFileSource,
    pub store: BoardStore,
}

/// Locate `.trellis/`, read its config and build the file source.
///
/// # Errors
///
/// Renders and returns an error if the directory is not initialized or the
/// config does not parse.
pub fn open_source(project_root: &Path, output: OutputMode) -> Result<OpenSource> {
    if !config::is_initialized(project_root) {
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::NotInitialized,
                format!("no {} directory in {}", config::BOARD_DIR, project_root.display()),
            ),
        )?;
        anyhow::bail!("board not initialized");
    }

    let config = match config::load_project_config(project_root) {
        Ok(c) => c,
        Err(e) => {
            render_error(output, &CliError::from_code(ErrorCode::ConfigParseError, format!("{e:#}")))?;
            return Err(e);
        }
    };

    let source = JsonFileSource::new(
        config.source.resolve_path(project_root),
        config.source.lock_timeout(),
    );
    Ok(OpenSource { config, source })
}

/// [`open_source`], then a full reload into a new [`BoardStore`].
///
/// # Errors
///
/// Renders and returns an error if the source cannot be opened or read.
pub fn load_board(project_root: &Path, output: OutputMode) -> Result<LoadedBoard> {
    let OpenSource { config, mut source } = open_source(project_root, output)?;
    let mut store = BoardStore::new();
    if let Err(e) = protocol::reload(&mut store, &mut source) {
        render_error(output, &CliError::from(&e))?;
        return Err(e.into());
    }
    Ok(LoadedBoard {
        config,
        source,
        store,
    })
}

/// Parse a user-supplied status, rendering `InvalidStatus` on failure.
///
/// # Errors
///
/// Returns an error if `raw` names no status.
pub fn parse_status(raw: &str, output: OutputMode) -> Result<Status> {
    match Status::from_str(raw) {
        Ok(status) => Ok(status),
        Err(e) => {
            render_error(output, &CliError::from_code(e.code(), e.to_string()))?;
            Err(e.into())
        }
    }
}

/// Render `TaskNotFound` for `id` and return the matching error.
pub fn task_not_found(id: &str, output: OutputMode) -> anyhow::Error {
    let message = format!("task not found: {id}");
    if let Err(e) = render_error(output, &CliError::from_code(ErrorCode::TaskNotFound, &message)) {
        return e;
    }
    anyhow::anyhow!(message)
}
