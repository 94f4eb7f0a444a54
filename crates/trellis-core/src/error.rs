use std::fmt;

/// Machine-readable error codes surfaced by the CLI and adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    TaskNotFound,
    InvalidStatus,
    SourceReadFailed,
    SourceWriteFailed,
    MutationRejected,
    IdSpaceExhausted,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::TaskNotFound => "E2001",
            Self::InvalidStatus => "E2002",
            Self::SourceReadFailed => "E3001",
            Self::SourceWriteFailed => "E3002",
            Self::MutationRejected => "E3003",
            Self::IdSpaceExhausted => "E3004",
            Self::LockContention => "E5002",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tl init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .trellis/config.toml and retry."),
            Self::TaskNotFound => Some("Use `tl list` to see available tasks."),
            Self::InvalidStatus => Some("Use one of: backlog, in-progress, review, done."),
            Self::SourceReadFailed => Some("Check that the task file exists and is valid JSON."),
            Self::SourceWriteFailed => Some("Check disk space and write permissions."),
            Self::MutationRejected => None,
            Self::IdSpaceExhausted => Some("Renumber the highest `t<N>` task in the task file."),
            Self::LockContention => Some("Retry after the other `tl` process releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
