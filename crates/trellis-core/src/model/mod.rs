pub mod status;
pub mod task;
pub mod task_id;

pub use status::{ParseStatusError, Status};
pub use task::{NewTask, Task};
pub use task_id::TaskId;
