//! MCP server loop.
//!
//! Reads one JSON-RPC message per line, handles it to completion and writes
//! at most one response line. Tool calls never wait on provider processes;
//! completion is tracked by the task watchers on the runtime.

use std::io::{BufRead, ErrorKind, Write};
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::protocol::{
    parse_line, CallToolParams, JsonRpcResponse, ProtocolError, Request, ToolResult,
};
use crate::config::Config;
use crate::error::ToolError;
use crate::provider::command;
use crate::task::{self, TaskStore};
use crate::tools::{ToolCall, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "ccb-delegation";

/// Result of handling one line.
#[derive(Debug)]
pub struct Reply {
    /// `None` for notifications.
    pub response: Option<JsonRpcResponse>,
    /// Set by `shutdown` / `exit`.
    pub stop: bool,
}

enum Dispatched {
    Result(Value),
    Silent,
    Stop,
}

pub struct Server {
    config: Config,
    store: TaskStore,
    registry: ToolRegistry,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let store = TaskStore::new(config.cache_dir.clone());
        Self {
            config,
            store,
            registry: ToolRegistry::new(),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Evict expired task records. Run once at startup.
    pub fn sweep(&self) -> usize {
        let evicted = self.store.sweep(self.config.ttl_secs);
        if evicted > 0 {
            info!(evicted, ttl_secs = self.config.ttl_secs, "Evicted expired tasks");
        }
        evicted
    }

    /// Serve requests from `reader` until EOF or `shutdown`/`exit`.
    pub fn serve<R: BufRead, W: Write>(
        &self,
        runtime: &tokio::runtime::Runtime,
        mut reader: R,
        mut writer: W,
    ) -> std::io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Failed to read request line");
                    break;
                }
            }

            let Ok(line) = std::str::from_utf8(&buf) else {
                debug!("Skipping non-UTF-8 line");
                continue;
            };

            if line.trim().is_empty() {
                continue;
            }

            let Some(reply) = runtime.block_on(self.handle_line(line)) else {
                debug!("Skipping malformed line");
                continue;
            };

            if let Some(response) = reply.response {
                let encoded = serde_json::to_string(&response)?;
                writeln!(writer, "{}", encoded)?;
                writer.flush()?;
            }

            if reply.stop {
                info!("Shutdown requested");
                break;
            }
        }
        Ok(())
    }

    /// Handle a single input line. Returns `None` for lines that are skipped.
    pub async fn handle_line(&self, line: &str) -> Option<Reply> {
        let incoming = parse_line(line)?;
        let id = incoming.id;

        let outcome = match incoming.request {
            Ok(request) => AssertUnwindSafe(self.dispatch(request))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ProtocolError::Internal("handler panicked".to_string()))),
            Err(e) => Err(e),
        };

        let (result, stop) = match outcome {
            Ok(Dispatched::Result(value)) => (Ok(value), false),
            Ok(Dispatched::Silent) => return Some(Reply { response: None, stop: false }),
            Ok(Dispatched::Stop) => (Ok(json!({})), true),
            Err(e) => {
                if let ProtocolError::Internal(detail) = &e {
                    error!(id = ?id, error = %detail, "Request handling failed");
                }
                (Err(e), false)
            }
        };

        let response = id.map(|id| match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, e.code(), e.to_string()),
        });

        Some(Reply { response, stop })
    }

    async fn dispatch(&self, request: Request) -> Result<Dispatched, ProtocolError> {
        match request {
            Request::Initialize { protocol_version } => Ok(Dispatched::Result(json!({
                "protocolVersion": protocol_version.as_deref().unwrap_or(PROTOCOL_VERSION),
                "capabilities": {
                    "tools": {
                        "list": true
                    }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }))),
            Request::Initialized => Ok(Dispatched::Silent),
            Request::ListTools => Ok(Dispatched::Result(json!({ "tools": self.registry.list() }))),
            Request::CallTool(params) => {
                let result = self.call_tool(params).await?;
                Ok(Dispatched::Result(serde_json::to_value(result)?))
            }
            Request::Shutdown => Ok(Dispatched::Stop),
            Request::Unknown(method) => Err(ProtocolError::MethodNotFound(method)),
        }
    }

    /// Resolve and run a tool. Tool failures become `isError` results.
    pub async fn call_tool(&self, params: CallToolParams) -> Result<ToolResult, ProtocolError> {
        debug!(tool = %params.name, "tools/call");

        let (provider, operation) = match self.registry.resolve(&params.name) {
            Ok(resolved) => resolved,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let call = ToolCall::decode(provider, operation, params.arguments).map_err(|e| {
            ProtocolError::InvalidParams(format!("invalid arguments for {}: {}", params.name, e))
        })?;

        match call {
            ToolCall::Ask(provider, args) => {
                // The watcher handle is dropped; it keeps running detached.
                let submitted = task::submit(&self.config, &self.store, provider, args).await;
                tool_result(submitted.map(|s| s.receipt))
            }
            ToolCall::Pend(provider, args) => {
                tool_result(task::pend(&self.config, &self.store, provider, args).await)
            }
            ToolCall::Ping(provider, args) => tool_result(
                command::ping(&self.config, provider, args.session_file.as_deref()).await,
            ),
        }
    }
}

fn tool_result<T: Serialize>(outcome: Result<T, ToolError>) -> Result<ToolResult, ProtocolError> {
    match outcome {
        Ok(payload) => Ok(ToolResult::json(&payload)?),
        Err(e) => {
            debug!(error = %e, "Tool returned an error");
            Ok(ToolResult::error(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CommandLine, Operation, Provider};
    use tempfile::tempdir;

    fn server() -> (tempfile::TempDir, Server) {
        let temp = tempdir().unwrap();
        let server = Server::new(Config::new(temp.path(), 3600));
        (temp, server)
    }

    async fn call(server: &Server, line: &str) -> JsonRpcResponse {
        server.handle_line(line).await.unwrap().response.unwrap()
    }

    fn tool_text(response: &JsonRpcResponse) -> (String, bool) {
        let result = response.result.as_ref().unwrap();
        let text = result["content"][0]["text"].as_str().unwrap().to_string();
        let is_error = result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false);
        (text, is_error)
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let (_temp, server) = server();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["capabilities"]["tools"]["list"], true);

        let response = call(&server, r#"{"jsonrpc":"2.0","id":2,"method":"initialize"}"#).await;
        assert_eq!(response.result.unwrap()["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let (_temp, server) = server();
        let reply = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"initialized"}"#)
            .await
            .unwrap();
        assert!(reply.response.is_none());
        assert!(!reply.stop);

        let reply = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"bogus/notify"}"#)
            .await
            .unwrap();
        assert!(reply.response.is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let (_temp, server) = server();
        assert!(server.handle_line("{oops").await.is_none());
        assert!(server.handle_line("42").await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let (_temp, server) = server();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 24);
        assert_eq!(tools[0]["name"], "ccb_ask_codex");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_temp, server) = server();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":9,"method":"prompts/list"}"#).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "unknown method: prompts/list");
        assert_eq!(response.id, json!(9));
    }

    #[tokio::test]
    async fn test_missing_tool_name() {
        let (_temp, server) = server();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"arguments":{}}}"#,
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.message, "missing tool name");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_tool_error() {
        let (_temp, server) = server();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"ccb_ask_unknownprovider","arguments":{}}}"#,
        )
        .await;
        assert!(response.error.is_none());
        assert_eq!(
            tool_text(&response),
            ("unknown tool: ccb_ask_unknownprovider".to_string(), true)
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_is_protocol_error() {
        let (_temp, server) = server();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"cask","arguments":"hello"}}"#,
        )
        .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_validation_errors_are_tool_errors() {
        let (_temp, server) = server();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"ccb_ask_codex","arguments":{"message":"  "}}}"#,
        )
        .await;
        assert_eq!(tool_text(&response), ("message is required".to_string(), true));

        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"cpend","arguments":{"task_id":"codex-1-dead"}}}"#,
        )
        .await;
        assert_eq!(
            tool_text(&response),
            ("unknown task_id: codex-1-dead".to_string(), true)
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops() {
        let (_temp, server) = server();
        for method in ["shutdown", "exit"] {
            let line = format!(r#"{{"jsonrpc":"2.0","id":1,"method":"{}"}}"#, method);
            let reply = server.handle_line(&line).await.unwrap();
            assert!(reply.stop);
            assert_eq!(reply.response.unwrap().result, Some(json!({})));
        }
    }

    #[test]
    fn test_serve_skips_non_utf8_line() {
        let (_temp, server) = server();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let mut input = Vec::new();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n");
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n");

        let mut output = Vec::new();
        server.serve(&runtime, input.as_slice(), &mut output).unwrap();

        let ids: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ping_tool() {
        let temp = tempdir().unwrap();
        let mut config = Config::new(temp.path(), 3600);
        config.commands.set(
            Provider::Gemini,
            Operation::Ping,
            CommandLine::with_args("sh", ["-c", "echo 'gemini ready'"]),
        );
        let server = Server::new(config);

        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"gping"}}"#,
        )
        .await;
        let (text, is_error) = tool_text(&response);
        assert!(!is_error);
        let payload: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload, json!({"available": true, "message": "gemini ready"}));
    }
}
