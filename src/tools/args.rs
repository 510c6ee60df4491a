//! Typed tool arguments, decoded once from the `tools/call` payload.
//!
//! Decoding is lenient in the same places MCP clients tend to be sloppy:
//! numbers sent as strings, empty strings for "not set", `null` fields.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::provider::{Operation, Provider};

pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;

/// Arguments of `ccb_ask_*`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AskArgs {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default = "default_timeout", deserialize_with = "lenient_timeout")]
    pub timeout_s: f64,
    #[serde(default, deserialize_with = "optional_path")]
    pub session_file: Option<String>,
}

/// Arguments of `ccb_pend_*`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PendArgs {
    #[serde(default, deserialize_with = "optional_path")]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "optional_path")]
    pub session_file: Option<String>,
}

/// Arguments of `ccb_ping_*`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PingArgs {
    #[serde(default, deserialize_with = "optional_path")]
    pub session_file: Option<String>,
}

/// A resolved tool invocation with its decoded arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Ask(Provider, AskArgs),
    Pend(Provider, PendArgs),
    Ping(Provider, PingArgs),
}

impl ToolCall {
    /// Decode `arguments` for the given operation. `null` means no arguments.
    pub fn decode(
        provider: Provider,
        operation: Operation,
        arguments: Value,
    ) -> Result<Self, serde_json::Error> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Ok(match operation {
            Operation::Ask => Self::Ask(provider, serde_json::from_value(arguments)?),
            Operation::Pend => Self::Pend(provider, serde_json::from_value(arguments)?),
            Operation::Ping => Self::Ping(provider, serde_json::from_value(arguments)?),
        })
    }
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

/// Strings pass through, other scalars are stringified, `null` is unset.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Like [`lenient_string`], but trimmed and with empty treated as unset.
fn optional_path<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Numbers and numeric strings are accepted; anything else falls back to the default.
fn lenient_timeout<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed
        .filter(|secs| secs.is_finite())
        .unwrap_or(DEFAULT_TIMEOUT_SECS))
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}
