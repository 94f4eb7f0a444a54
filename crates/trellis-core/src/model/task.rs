use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Status, TaskId};

/// A unit of work on the board.
///
/// Only `id` and `status` mean anything to the board store; the rest is
/// payload carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: Status,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build a task with empty payload, stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            status,
            title: title.into(),
            description: None,
            assignee: None,
            project: None,
            due: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn with_due(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }

    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Fields supplied when asking an authoritative source to create a task.
///
/// The source assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    pub title: String,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub project: Option<String>,
    pub due: Option<NaiveDate>,
}

impl NewTask {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Materialize the draft under the identifier chosen by the source.
    #[must_use]
    pub fn into_task(self, id: TaskId, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            status: self.status.unwrap_or(Status::Backlog),
            title: self.title,
            description: self.description,
            assignee: self.assignee,
            project: self.project,
            due: self.due,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_payload_is_omitted_from_json() {
        let task = Task::new("t1", "Write docs", Status::Backlog);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["status"], "backlog");
        assert!(json.get("assignee").is_none());
        assert!(json.get("due").is_none());
    }

    #[test]
    fn json_round_trip_keeps_payload() {
        let task = Task::new("t7", "Ship release", Status::Review)
            .with_assignee("dana")
            .with_project("platform")
            .with_due(NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
        let text = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&text).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn new_task_defaults_to_backlog() {
        let created_at = Utc::now();
        let task = NewTask::titled("Triage inbox").into_task(TaskId::from("t3"), created_at);
        assert_eq!(task.status, Status::Backlog);
        assert_eq!(task.id.as_str(), "t3");
        assert_eq!(task.created_at, created_at);
    }
}
