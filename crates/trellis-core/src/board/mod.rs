pub mod observer;
pub mod store;

pub use observer::{BoardChange, BoardObserver, RevertOutcome};
pub use store::{BoardStore, UndoToken};
