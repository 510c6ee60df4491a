//! Task submission - launches a provider `ask` in the background.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::record::{generate_task_id, now_secs, TaskRecord};
use super::store::TaskStore;
use super::watcher::{self, WatchedTask};
use crate::config::Config;
use crate::error::ToolError;
use crate::provider::{Operation, Provider};
use crate::tools::{expand_home, AskArgs};

/// What the client gets back from a successful `ask`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitReceipt {
    pub task_id: String,
    pub status: &'static str,
    pub output_file: PathBuf,
}

/// A submitted task and the handle of its completion watcher.
///
/// Dropping `watcher` detaches it; it still updates the record on exit.
#[derive(Debug)]
pub struct Submitted {
    pub receipt: SubmitReceipt,
    pub watcher: JoinHandle<()>,
}

/// Validate `args`, record the task, launch the provider and start its watcher.
///
/// Returns as soon as the provider is running; it is never awaited here.
pub async fn submit(
    config: &Config,
    store: &TaskStore,
    provider: Provider,
    args: AskArgs,
) -> Result<Submitted, ToolError> {
    let message = args.message.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return Err(ToolError::MessageRequired);
    }

    let session_file = match args.session_file {
        Some(raw) => {
            let path = expand_home(&raw);
            if !path.exists() {
                return Err(ToolError::SessionFileNotFound(raw));
            }
            Some(path.to_string_lossy().into_owned())
        }
        None => None,
    };

    let task_id = unique_task_id(store, provider);
    let output_file = store.output_path(&task_id);
    let mut record = TaskRecord::running(&task_id, provider, output_file.clone(), session_file.clone());
    store.create(&record)?;

    let mut cmd = config.commands.get(provider, Operation::Ask).to_command();
    cmd.arg("--sync")
        .arg("--output")
        .arg(&output_file)
        .arg("--timeout")
        .arg(args.timeout_s.to_string())
        .arg("-q");
    if let Some(session_file) = &session_file {
        cmd.arg("--session-file").arg(session_file);
    }
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(provider_stderr(config))
        .kill_on_drop(false);
    detach(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(task_id = %task_id, provider = %provider, error = %e, "Failed to launch provider command");
            // No watcher will ever run for this task, so close the record now.
            record.finish(None, now_secs());
            if let Err(e) = store.update(&record) {
                warn!(task_id = %task_id, error = %e, "Failed to mark unlaunched task");
            }
            return Err(ToolError::LaunchFailed(e));
        }
    };

    record.pid = child.id();
    if let Err(e) = store.update(&record) {
        warn!(task_id = %task_id, error = %e, "Failed to record provider pid");
    }

    // The message is delivered by the watcher so a provider that is slow to
    // read its stdin cannot hold up this request.
    let input = child.stdin.take().map(|stdin| (stdin, message.to_string()));
    let watcher = watcher::spawn(
        store.clone(),
        WatchedTask {
            task_id: task_id.clone(),
            provider,
            output_file: output_file.clone(),
        },
        child,
        input,
    );

    info!(task_id = %task_id, provider = %provider, pid = ?record.pid, "Submitted task");

    Ok(Submitted {
        receipt: SubmitReceipt {
            task_id,
            status: "submitted",
            output_file,
        },
        watcher,
    })
}

fn unique_task_id(store: &TaskStore, provider: Provider) -> String {
    loop {
        let task_id = generate_task_id(provider);
        if !store.contains(&task_id) {
            return task_id;
        }
    }
}

/// Provider stderr goes to the server log so failures can be diagnosed later.
fn provider_stderr(config: &Config) -> Stdio {
    match OpenOptions::new().create(true).append(true).open(&config.log_path) {
        Ok(file) => Stdio::from(file),
        Err(e) => {
            warn!(path = %config.log_path.display(), error = %e, "Cannot open log for provider stderr");
            Stdio::null()
        }
    }
}

/// Run the provider in its own session so it outlives this server.
#[cfg(unix)]
fn detach(cmd: &mut Command) {
    // SAFETY: setsid is async-signal-safe and only affects the child.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn detach(_cmd: &mut Command) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CommandLine;
    use crate::task::record::TaskStatus;
    use tempfile::tempdir;

    fn ask(message: &str) -> AskArgs {
        AskArgs {
            message: Some(message.to_string()),
            timeout_s: 5.0,
            session_file: None,
        }
    }

    fn record_count(store: &TaskStore) -> usize {
        std::fs::read_dir(store.dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let temp = tempdir().unwrap();
        let config = Config::new(temp.path(), 0);
        let store = TaskStore::new(temp.path());

        for message in ["", "   \n\t"] {
            let err = submit(&config, &store, Provider::Codex, ask(message)).await.unwrap_err();
            assert!(matches!(err, ToolError::MessageRequired));
        }
        let err = submit(
            &config,
            &store,
            Provider::Codex,
            AskArgs {
                message: None,
                timeout_s: 120.0,
                session_file: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "message is required");
        assert_eq!(record_count(&store), 0);
    }

    #[tokio::test]
    async fn test_missing_session_file_rejected_before_spawn() {
        let temp = tempdir().unwrap();
        let marker = temp.path().join("spawned");
        let mut config = Config::new(temp.path(), 0);
        config.commands.set(
            Provider::Codex,
            Operation::Ask,
            CommandLine::with_args("sh", vec!["-c".to_string(), format!("touch {}", marker.display())]),
        );
        let store = TaskStore::new(temp.path());
        let missing = temp.path().join("nope/.codex-session");

        let mut args = ask("hello");
        args.session_file = Some(missing.display().to_string());
        let err = submit(&config, &store, Provider::Codex, args).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("session_file not found: {}", missing.display())
        );
        assert_eq!(record_count(&store), 0);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_launch_failure_is_tool_error() {
        let temp = tempdir().unwrap();
        let mut config = Config::new(temp.path(), 0);
        config.commands.set(
            Provider::Gemini,
            Operation::Ask,
            CommandLine::new("/nonexistent/ccb-gask"),
        );
        let store = TaskStore::new(temp.path());

        let err = submit(&config, &store, Provider::Gemini, ask("hello")).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to launch provider command");

        let record = store.latest_for_provider(Provider::Gemini).unwrap();
        assert_eq!(record.status, TaskStatus::Error);
        assert_eq!(record.pid, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_passes_flags_and_stdin() {
        let temp = tempdir().unwrap();
        let session = temp.path().join(".codex-session");
        std::fs::write(&session, "{}").unwrap();

        // Echo the argv and the message into the output file.
        let script = r#"out=""; args="$*"
while [ $# -gt 0 ]; do case "$1" in --output) out="$2"; shift 2;; *) shift;; esac; done
msg=$(cat); printf '%s|%s' "$args" "$msg" > "$out""#;
        let mut config = Config::new(temp.path(), 0);
        config.commands.set(
            Provider::Codex,
            Operation::Ask,
            CommandLine::with_args("sh", ["-c", script, "stub"]),
        );
        let store = TaskStore::new(temp.path());

        let mut args = ask("  ping  ");
        args.session_file = Some(session.display().to_string());
        let submitted = submit(&config, &store, Provider::Codex, args).await.unwrap();
        let receipt = submitted.receipt.clone();
        submitted.watcher.await.unwrap();

        assert_eq!(receipt.status, "submitted");
        assert!(receipt.task_id.starts_with("codex-"));
        assert_eq!(receipt.output_file, store.output_path(&receipt.task_id));

        let written = std::fs::read_to_string(&receipt.output_file).unwrap();
        let expected_args = format!(
            "--sync --output {} --timeout 5 -q --session-file {}",
            receipt.output_file.display(),
            session.display()
        );
        assert_eq!(written, format!("{}|ping", expected_args));

        let record = store.get(&receipt.task_id).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.exit_code, Some(0));
        assert!(record.pid.is_some());
        assert_eq!(record.session_file, Some(session.display().to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_does_not_wait_for_stdin() {
        let temp = tempdir().unwrap();
        let mut config = Config::new(temp.path(), 0);
        // Never reads its stdin, so a large message fills the pipe.
        config.commands.set(
            Provider::Codex,
            Operation::Ask,
            CommandLine::with_args("sh", ["-c", "sleep 3"]),
        );
        let store = TaskStore::new(temp.path());

        let message = "x".repeat(1024 * 1024);
        let started = std::time::Instant::now();
        let submitted = submit(&config, &store, Provider::Codex, ask(&message)).await.unwrap();
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "submit took {:?}",
            started.elapsed()
        );

        let task_id = submitted.receipt.task_id.clone();
        let record = store.get(&task_id).unwrap();
        assert_eq!(record.status, TaskStatus::Running);
        assert!(record.pid.is_some());

        submitted.watcher.await.unwrap();
        assert_eq!(store.get(&task_id).unwrap().status, TaskStatus::Completed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_task_ids_unique() {
        let temp = tempdir().unwrap();
        let mut config = Config::new(temp.path(), 0);
        config.commands.set(
            Provider::Claude,
            Operation::Ask,
            CommandLine::with_args("sh", ["-c", "cat > /dev/null"]),
        );
        let store = TaskStore::new(temp.path());

        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let submitted = submit(&config, &store, Provider::Claude, ask("hi")).await.unwrap();
            submitted.watcher.await.unwrap();
            assert!(ids.insert(submitted.receipt.task_id));
        }
        assert_eq!(record_count(&store), 20);
    }
}
