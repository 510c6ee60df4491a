//! Server configuration.
//!
//! Built once at startup and passed to every component that touches the
//! cache directory. Environment variables:
//! - `CCB_DELEGATION_CACHE_DIR` - cache directory (default `~/.cache/ccb/delegation`)
//! - `CCB_DELEGATION_TTL_S` - record time-to-live in seconds (default one day, `<= 0` disables eviction)

use std::path::PathBuf;

use crate::provider::ProviderCommands;

pub const DEFAULT_TTL_SECS: i64 = 60 * 60 * 24;

const LOG_FILE_NAME: &str = "mcp-server.log";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding task records, output artifacts and the server log.
    pub cache_dir: PathBuf,
    /// Records older than this are evicted at startup. `<= 0` disables eviction.
    pub ttl_secs: i64,
    /// Append-only log shared by the server and provider stderr.
    pub log_path: PathBuf,
    /// Commands invoked for each (provider, operation) pair.
    pub commands: ProviderCommands,
}

impl Config {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl_secs: i64) -> Self {
        let cache_dir = cache_dir.into();
        let log_path = cache_dir.join(LOG_FILE_NAME);
        Self {
            cache_dir,
            ttl_secs,
            log_path,
            commands: ProviderCommands::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("CCB_DELEGATION_CACHE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        let ttl_secs = parse_ttl(std::env::var("CCB_DELEGATION_TTL_S").ok().as_deref());

        Self::new(cache_dir, ttl_secs)
    }

    pub fn ensure_cache_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)
    }
}

fn default_cache_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    PathBuf::from(home).join(".cache").join("ccb").join("delegation")
}

fn parse_ttl(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_TTL_SECS;
    };
    match raw.parse::<i64>() {
        Ok(ttl) => ttl,
        Err(_) => {
            // Logging is not installed yet when config is loaded.
            eprintln!(
                "[ccb-delegation] ignoring invalid CCB_DELEGATION_TTL_S={:?}, using {}",
                raw, DEFAULT_TTL_SECS
            );
            DEFAULT_TTL_SECS
        }
    }
}
