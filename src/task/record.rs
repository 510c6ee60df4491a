//! Persisted task record and task-id generation.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Lifecycle state of a background task.
///
/// Transitions are `Running -> Completed` or `Running -> Error`, never back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one submitted provider request, stored as `<task_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub task_id: String,
    pub provider: Provider,
    /// File the provider process writes its reply to.
    pub output_file: PathBuf,
    #[serde(default)]
    pub session_file: Option<String>,
    pub status: TaskStatus,
    /// Unix seconds.
    pub started_at: i64,
    #[serde(default)]
    pub finished_at: Option<i64>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub pid: Option<u32>,
}

impl TaskRecord {
    /// A freshly submitted task in the `running` state.
    pub fn running(
        task_id: impl Into<String>,
        provider: Provider,
        output_file: PathBuf,
        session_file: Option<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            provider,
            output_file,
            session_file,
            status: TaskStatus::Running,
            started_at: now_secs(),
            finished_at: None,
            exit_code: None,
            pid: None,
        }
    }

    /// Apply the process exit. Exit code `0` completes the task, anything else
    /// (including an unknown code) is an error.
    ///
    /// Returns `false` and leaves the record untouched if it is already terminal.
    pub fn finish(&mut self, exit_code: Option<i32>, finished_at: i64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.exit_code = exit_code;
        self.finished_at = Some(finished_at);
        self.status = if exit_code == Some(0) {
            TaskStatus::Completed
        } else {
            TaskStatus::Error
        };
        true
    }
}

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `<provider>-<unix-seconds>-<4 hex chars>`.
pub fn generate_task_id(provider: Provider) -> String {
    let suffix: [u8; 2] = rand::random();
    format!("{}-{}-{}", provider.as_str(), now_secs(), hex::encode(suffix))
}

/// Task ids name files in the cache directory, so only a safe alphabet is accepted.
pub fn is_valid_task_id(task_id: &str) -> bool {
    !task_id.is_empty()
        && task_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
