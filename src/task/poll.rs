//! Polling - `pend` against the task cache, with the synchronous fallback.

use std::path::PathBuf;

use serde::Serialize;

use super::record::{TaskRecord, TaskStatus};
use super::store::TaskStore;
use crate::config::Config;
use crate::error::ToolError;
use crate::provider::command::{self, FallbackReply};
use crate::provider::Provider;
use crate::tools::PendArgs;

/// Status of a cached task as seen by the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskReply {
    pub task_id: String,
    pub status: TaskStatus,
    pub reply: String,
    pub output_file: PathBuf,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PendReply {
    Task(TaskReply),
    Fallback(FallbackReply),
}

/// Report on `args.task_id`, or on the provider's latest task when absent.
///
/// Without a task id and without any cached task for `provider`, the
/// provider's own `pend` command is asked instead.
pub async fn pend(
    config: &Config,
    store: &TaskStore,
    provider: Provider,
    args: PendArgs,
) -> Result<PendReply, ToolError> {
    let record = match args.task_id {
        Some(task_id) => match store.get(&task_id) {
            Some(record) => record,
            None => return Err(ToolError::UnknownTask(task_id)),
        },
        None => match store.latest_for_provider(provider) {
            Some(record) => record,
            None => {
                tracing::debug!(provider = %provider, "No cached task, using provider pend");
                let reply = command::pend(config, provider, args.session_file.as_deref()).await?;
                return Ok(PendReply::Fallback(reply));
            }
        },
    };

    task_reply(store, record).map(PendReply::Task)
}

/// Build the client view of a record.
///
/// A non-empty output file means the provider finished writing its reply,
/// and that wins over a record still marked `running`: the watcher may not
/// have recorded the exit yet. The stored exit code is reported either way.
fn task_reply(store: &TaskStore, record: TaskRecord) -> Result<TaskReply, ToolError> {
    let mut status = record.status;
    let mut reply = String::new();

    match std::fs::read(&record.output_file) {
        Ok(bytes) => {
            reply = String::from_utf8_lossy(&bytes).trim().to_string();
            if !reply.is_empty() {
                status = TaskStatus::Completed;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Eviction removes the record before the output, so a vanished
            // record here means the task was evicted mid-poll.
            if !store.contains(&record.task_id) {
                return Err(ToolError::UnknownTask(record.task_id));
            }
        }
        Err(e) => {
            tracing::debug!(task_id = %record.task_id, error = %e, "Failed to read task output");
        }
    }

    Ok(TaskReply {
        task_id: record.task_id,
        status,
        reply,
        output_file: record.output_file,
        exit_code: record.exit_code,
    })
}
