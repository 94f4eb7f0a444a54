use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use trellis_core::{Status, Task, TaskId};

pub fn arb_status() -> impl Strategy<Value = Status> + Clone {
    prop_oneof![
        Just(Status::Backlog),
        Just(Status::InProgress),
        Just(Status::Review),
        Just(Status::Done),
    ]
}

pub fn arb_task(id: String) -> impl Strategy<Value = Task> {
    (
        arb_status(),
        "[a-z ]{1,24}",
        proptest::option::of("[a-z]{3,8}"),
        proptest::option::of("[a-z]{3,8}"),
        0i64..2_000_000_000,
    )
        .prop_map(move |(status, title, assignee, project, secs)| {
            let mut task = Task::new(id.as_str(), title, status)
                .with_created_at(Utc.timestamp_opt(secs, 0).unwrap());
            task.assignee = assignee;
            task.project = project;
            task
        })
}

/// Snapshot with unique `t<N>` ids, offset so separate calls can avoid
/// sharing identifiers.
pub fn arb_snapshot_from(first_id: usize, max_len: usize) -> impl Strategy<Value = Vec<Task>> {
    (0..=max_len).prop_flat_map(move |len| {
        (first_id..first_id + len)
            .map(|n| arb_task(format!("t{n}")))
            .collect::<Vec<_>>()
    })
}

pub fn arb_snapshot() -> impl Strategy<Value = Vec<Task>> {
    arb_snapshot_from(0, 12)
}

pub fn arb_nonempty_snapshot() -> impl Strategy<Value = Vec<Task>> {
    arb_snapshot_from(0, 12).prop_filter("needs a task", |tasks| !tasks.is_empty())
}

/// An identifier that may or may not be present in a snapshot of up to 12.
pub fn arb_task_id() -> impl Strategy<Value = TaskId> {
    (0usize..16).prop_map(|n| TaskId::new(format!("t{n}")))
}
