//! JSON-RPC 2.0 and MCP wire types.
//!
//! Incoming lines are decoded once into a closed [`Request`] enum; nothing
//! downstream inspects raw JSON objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// JSON-RPC Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<Value>,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Failures answered with a JSON-RPC error object.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{0}")]
    InvalidParams(String),

    #[error("unknown method: {0}")]
    MethodNotFound(String),

    /// Details are logged; the client only sees "internal error".
    #[error("internal error")]
    Internal(String),
}

impl ProtocolError {
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParams(_) => -32602,
            Self::MethodNotFound(_) => -32601,
            Self::Internal(_) => -32603,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Value,
}

/// Every method this server understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Initialize { protocol_version: Option<String> },
    Initialized,
    ListTools,
    CallTool(CallToolParams),
    /// `shutdown` or `exit`.
    Shutdown,
    Unknown(String),
}

impl Request {
    pub fn decode(method: &str, params: Value) -> Result<Self, ProtocolError> {
        Ok(match method {
            "initialize" => Self::Initialize {
                protocol_version: params
                    .get("protocolVersion")
                    .and_then(|v| v.as_str())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            },
            "initialized" | "notifications/initialized" => Self::Initialized,
            "tools/list" => Self::ListTools,
            "tools/call" => Self::CallTool(decode_call(params)?),
            "shutdown" | "exit" => Self::Shutdown,
            other => Self::Unknown(other.to_string()),
        })
    }
}

fn decode_call(params: Value) -> Result<CallToolParams, ProtocolError> {
    let mut params = match params {
        Value::Null => serde_json::Map::new(),
        Value::Object(map) => map,
        _ => return Err(ProtocolError::InvalidParams("invalid params".to_string())),
    };

    let name = match params.remove("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ProtocolError::InvalidParams("missing tool name".to_string()))?;

    Ok(CallToolParams {
        name,
        arguments: params.remove("arguments").unwrap_or(Value::Null),
    })
}

/// One decoded input line.
#[derive(Debug)]
pub struct Incoming {
    /// `None` marks a notification: it never gets a response.
    pub id: Option<Value>,
    pub request: Result<Request, ProtocolError>,
}

/// Decode a line. Anything that is not a JSON object yields `None`.
pub fn parse_line(line: &str) -> Option<Incoming> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    if !value.is_object() {
        return None;
    }
    let raw: RawMessage = serde_json::from_value(value).ok()?;

    let request = match raw.method {
        Some(Value::String(method)) => Request::decode(&method, raw.params),
        Some(other) => Ok(Request::Unknown(other.to_string())),
        None => Ok(Request::Unknown("None".to_string())),
    };

    Some(Incoming {
        id: raw.id,
        request,
    })
}

// =============================================================================
// MCP Types
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolResult {
    /// A single text item holding `payload` serialized as JSON.
    pub fn json<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            content: vec![ToolContent::Text {
                text: serde_json::to_string(payload)?,
            }],
            is_error: false,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}
