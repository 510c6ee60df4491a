//! Tracing setup.
//!
//! stdout carries the protocol, so logs are appended to the server log file
//! in the cache directory. Falls back to stderr when the file cannot be opened.
//! The filter comes from `RUST_LOG` and defaults to `info`.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = config
        .ensure_cache_dir()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&config.log_path));

    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(e) => {
            eprintln!(
                "[ccb-delegation] cannot open log file {}: {}, logging to stderr",
                config.log_path.display(),
                e
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init()
        }
    }
}
