use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ErrorCode;

/// The closed set of workflow states a task can be in.
///
/// Declaration order is board column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Backlog,
    InProgress,
    Review,
    Done,
}

impl Status {
    /// Every status, in column order.
    pub const ALL: [Self; 4] = [Self::Backlog, Self::InProgress, Self::Review, Self::Done];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }

    /// Column heading used by board renderers.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a [`Status`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status: '{got}' (expected backlog, in-progress, review or done)")]
pub struct ParseStatusError {
    pub got: String,
}

impl ParseStatusError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidStatus
    }
}

impl FromStr for Status {
    type Err = ParseStatusError;

    /// Accepts the kebab-case form as well as `InProgress`, `in_progress`
    /// and `in progress` spellings, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "backlog" => Ok(Self::Backlog),
            "inprogress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "done" => Ok(Self::Done),
            _ => Err(ParseStatusError { got: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>(), Ok(status));
        }
    }

    #[test]
    fn from_str_accepts_common_spellings() {
        assert_eq!("InProgress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("in_progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("  In Progress ".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("DONE".parse::<Status>(), Ok(Status::Done));
    }

    #[test]
    fn from_str_rejects_unknown_values() {
        let err = "archived".parse::<Status>().unwrap_err();
        assert_eq!(err.got, "archived");
        assert_eq!(err.code(), ErrorCode::InvalidStatus);
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let back: Status = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(back, Status::Review);
    }

    #[test]
    fn all_is_in_column_order() {
        let mut sorted = Status::ALL;
        sorted.sort();
        assert_eq!(sorted, Status::ALL);
    }
}
