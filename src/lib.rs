//! # CCB Delegation
//!
//! An MCP stdio server that hands long-running requests to the CCB provider
//! command-line tools (codex, gemini, claude, opencode) and lets the client
//! poll for the replies later.
//!
//! ## Architecture
//!
//! ```text
//!   MCP client ──stdio──▶ mcp::Server ──▶ tools::ToolRegistry
//!                              │
//!              ┌───────────────┼─────────────────┐
//!              ▼               ▼                 ▼
//!        task::submit     task::pend      provider::command
//!              │               │          (pend fallback, ping)
//!              ▼               ▼
//!        task::watcher ──▶ task::TaskStore ({cache_dir}/{task_id}.json|.out)
//! ```
//!
//! ## Task Flow
//! 1. `ccb_ask_<provider>` writes a `running` record and launches the provider in the background
//! 2. A watcher records the exit status when the provider exits
//! 3. `ccb_pend_<provider>` reads the record and the provider's output file
//! 4. Old records are swept at startup
//!
//! ## Modules
//! - `config`: cache directory, TTL and provider commands
//! - `mcp`: JSON-RPC front-end
//! - `provider`: provider catalog and synchronous commands
//! - `task`: task records, cache store, submission, watcher, polling
//! - `tools`: tool catalog and typed arguments

pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod provider;
pub mod task;
pub mod tools;

pub use config::Config;
pub use error::{StoreError, ToolError};
pub use mcp::Server;
