//! MCP (Model Context Protocol) front-end.
//!
//! Line-delimited JSON-RPC 2.0 over stdio: `initialize`, `tools/list`,
//! `tools/call`, `shutdown`/`exit`.

mod protocol;
mod server;

pub use protocol::{
    parse_line, CallToolParams, Incoming, JsonRpcError, JsonRpcResponse, ProtocolError, Request,
    ToolContent, ToolResult,
};
pub use server::{Reply, Server, PROTOCOL_VERSION, SERVER_NAME};
