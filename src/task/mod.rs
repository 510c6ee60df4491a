//! Task module - background provider requests and their on-disk cache.
//!
//! Lifecycle of a task:
//! 1. `submit` writes a `running` record and launches the provider
//! 2. the watcher records the exit status once the provider exits
//! 3. `pend` reads the record and the provider's output file
//! 4. `TaskStore::sweep` evicts old records at startup

pub mod poll;
pub mod record;
pub mod store;
pub mod submit;
pub mod watcher;

pub use poll::{pend, PendReply, TaskReply};
pub use record::{generate_task_id, TaskRecord, TaskStatus};
pub use store::TaskStore;
pub use submit::{submit, SubmitReceipt, Submitted};
