//! Error types shared by the task subsystem and the tool handlers.

use thiserror::Error;

/// Failures reported to the MCP client as tool-level errors (`isError: true`).
///
/// None of these escalate to JSON-RPC errors; the `Display` text is the
/// message the client sees.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("message is required")]
    MessageRequired,

    #[error("session_file not found: {0}")]
    SessionFileNotFound(String),

    #[error("unknown task_id: {0}")]
    UnknownTask(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("failed to launch provider command")]
    LaunchFailed(#[source] std::io::Error),

    #[error("failed to record task: {0}")]
    RecordFailed(#[from] StoreError),

    #[error("pend failed: {0}")]
    PendFailed(#[source] std::io::Error),

    #[error("ping failed: {0}")]
    PingFailed(#[source] std::io::Error),

    /// A provider command ran but reported failure; carries its output text.
    #[error("{0}")]
    Provider(String),
}

/// Errors from the on-disk task cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid task id: {0}")]
    InvalidTaskId(String),
}
