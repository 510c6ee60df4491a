//! Completion watcher - one per submitted task.
//!
//! The watcher owns the provider `Child`, awaits its exit and writes the
//! final status into the task record exactly once. Nothing it does can fail
//! the submission that spawned it: every error is logged and dropped.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::record::{now_secs, TaskRecord};
use super::store::TaskStore;
use crate::provider::Provider;

/// Identity of the task a watcher is responsible for.
#[derive(Debug, Clone)]
pub struct WatchedTask {
    pub task_id: String,
    pub provider: Provider,
    pub output_file: PathBuf,
}

/// Spawn the watcher for `child`. The handle may be dropped; the watcher keeps running.
///
/// `input` is written to the provider's stdin, which is then closed. The write
/// runs beside the wait so a provider that never reads does not stall the exit.
pub fn spawn(
    store: TaskStore,
    task: WatchedTask,
    mut child: Child,
    input: Option<(ChildStdin, String)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some((stdin, message)) = input {
            tokio::spawn(deliver(stdin, message, task.task_id.clone()));
        }
        // No timeout here: the provider enforces the timeout it was given.
        let exit_code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "Failed to wait for provider process");
                None
            }
        };
        record_exit(&store, &task, exit_code);
    })
}

async fn deliver(mut stdin: ChildStdin, message: String, task_id: String) {
    // The provider may still answer from its session, so this is not fatal.
    if let Err(e) = stdin.write_all(message.as_bytes()).await {
        warn!(task_id = %task_id, error = %e, "Failed to write message to provider stdin");
    }
}

/// Write the exit of `task` into its record.
///
/// An unreadable record is replaced by a bare one carrying only the task's
/// identity, so the final status is never lost.
pub fn record_exit(store: &TaskStore, task: &WatchedTask, exit_code: Option<i32>) {
    let mut record = store.get(&task.task_id).unwrap_or_else(|| {
        warn!(task_id = %task.task_id, "Task record unreadable at completion, rewriting it");
        TaskRecord::running(task.task_id.clone(), task.provider, task.output_file.clone(), None)
    });

    if !record.finish(exit_code, now_secs()) {
        warn!(task_id = %task.task_id, status = %record.status, "Task already finished, leaving record as is");
        return;
    }

    match store.update(&record) {
        Ok(()) => info!(
            task_id = %task.task_id,
            status = %record.status,
            exit_code = ?exit_code,
            "Task finished"
        ),
        Err(e) => warn!(task_id = %task.task_id, error = %e, "Failed to record task completion"),
    }
}
