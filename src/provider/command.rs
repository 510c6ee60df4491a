//! Synchronous provider commands: the `pend` fallback and `ping`.
//!
//! Both run the provider command to completion and report its output. Neither
//! touches the task cache.

use std::process::{Output, Stdio};

use serde::Serialize;

use super::{Operation, Provider};
use crate::config::Config;
use crate::error::ToolError;
use crate::tools::expand_home;

/// Reply of a fallback `pend`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FallbackReply {
    pub status: String,
    pub reply: String,
}

/// Reply of `ping`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PingReply {
    pub available: bool,
    pub message: String,
}

/// Run `<pend-cmd> [--session-file <path>]` and return its stdout.
pub async fn pend(
    config: &Config,
    provider: Provider,
    session_file: Option<&str>,
) -> Result<FallbackReply, ToolError> {
    let output = run(config, provider, Operation::Pend, session_file)
        .await
        .map_err(ToolError::PendFailed)?;

    let stdout = output_text(&output.stdout);
    if !output.status.success() {
        let stderr = output_text(&output.stderr);
        let message = [stdout, stderr]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| "pend failed".to_string());
        tracing::info!(provider = %provider, code = ?output.status.code(), "Fallback pend failed");
        return Err(ToolError::Provider(message));
    }

    Ok(FallbackReply {
        status: "completed".to_string(),
        reply: stdout,
    })
}

/// Run `<ping-cmd> [--session-file <path>]`; exit code 0 means available.
pub async fn ping(
    config: &Config,
    provider: Provider,
    session_file: Option<&str>,
) -> Result<PingReply, ToolError> {
    let output = run(config, provider, Operation::Ping, session_file)
        .await
        .map_err(ToolError::PingFailed)?;

    let stdout = output_text(&output.stdout);
    let message = if stdout.is_empty() {
        output_text(&output.stderr)
    } else {
        stdout
    };

    Ok(PingReply {
        available: output.status.success(),
        message,
    })
}

async fn run(
    config: &Config,
    provider: Provider,
    operation: Operation,
    session_file: Option<&str>,
) -> std::io::Result<Output> {
    let mut cmd = config.commands.get(provider, operation).to_command();
    if let Some(session_file) = session_file {
        cmd.arg("--session-file").arg(expand_home(session_file));
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(provider = %provider, operation = %operation, "Running provider command");
    cmd.output().await
}

fn output_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
