//! Tool registry - the static catalog exposed through `tools/list`.
//!
//! Each provider gets three canonical tools (`ccb_ask_<provider>`,
//! `ccb_pend_<provider>`, `ccb_ping_<provider>`) plus a short alias per
//! (provider, operation) pair, e.g. `cask` for codex ask.

mod args;

pub use args::{expand_home, AskArgs, PendArgs, PingArgs, ToolCall, DEFAULT_TIMEOUT_SECS};

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::provider::{Operation, Provider};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Immutable tool catalog plus alias lookup.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    aliases: HashMap<&'static str, (Provider, Operation)>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut definitions = Vec::new();

        for provider in Provider::ALL {
            for operation in Operation::ALL {
                definitions.push(ToolDefinition {
                    name: operation.canonical_name(provider),
                    description: canonical_description(provider, operation),
                    input_schema: input_schema(operation),
                });
            }
        }

        let mut aliases = HashMap::new();
        for operation in Operation::ALL {
            for provider in Provider::ALL {
                let alias = provider.alias(operation);
                aliases.insert(alias, (provider, operation));
                definitions.push(ToolDefinition {
                    name: alias.to_string(),
                    description: format!("Alias for {}.", operation.canonical_name(provider)),
                    input_schema: input_schema(operation),
                });
            }
        }

        Self {
            definitions,
            aliases,
        }
    }

    /// Map a tool name to its (provider, operation).
    ///
    /// Aliases are looked up directly. Canonical names match when they end
    /// with a provider name and start with that operation's `ccb_<op>_` prefix.
    pub fn resolve(&self, name: &str) -> Result<(Provider, Operation), ToolError> {
        if let Some(&hit) = self.aliases.get(name) {
            return Ok(hit);
        }

        let unknown = || ToolError::UnknownTool(name.to_string());
        let provider = Provider::ALL
            .into_iter()
            .find(|p| name.ends_with(p.as_str()))
            .ok_or_else(unknown)?;
        let operation = Operation::ALL
            .into_iter()
            .find(|op| name.starts_with(op.canonical_prefix()))
            .ok_or_else(unknown)?;

        Ok((provider, operation))
    }

    pub fn list(&self) -> &[ToolDefinition] {
        &self.definitions
    }
}

fn canonical_description(provider: Provider, operation: Operation) -> String {
    match operation {
        Operation::Ask => format!("Submit a background request to {} (CCB).", provider),
        Operation::Pend => format!("Fetch the result of a background {} request.", provider),
        Operation::Ping => format!("Check availability for {} in CCB.", provider),
    }
}

fn input_schema(operation: Operation) -> Value {
    match operation {
        Operation::Ask => json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Request text to send to the provider."
                },
                "timeout_s": {
                    "type": "number",
                    "description": "Timeout in seconds for the provider request.",
                    "default": DEFAULT_TIMEOUT_SECS
                },
                "session_file": {
                    "type": "string",
                    "description": "Path to the provider session file (e.g., .codex-session)."
                }
            },
            "required": ["message"]
        }),
        Operation::Pend => json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Task id returned by ccb_ask_* (optional: latest)."
                },
                "session_file": {
                    "type": "string",
                    "description": "Path to the provider session file (optional fallback)."
                }
            },
            "required": []
        }),
        Operation::Ping => json!({
            "type": "object",
            "properties": {
                "session_file": {
                    "type": "string",
                    "description": "Path to the provider session file (optional)."
                }
            },
            "required": []
        }),
    }
}
