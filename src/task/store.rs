//! On-disk task cache.
//!
//! ## Layout
//!
//! ```text
//! {cache_dir}/
//!   {task_id}.json      TaskRecord
//!   {task_id}.out       provider reply, written by the provider process
//!   {task_id}.json.tmp  in-flight atomic write
//!   mcp-server.log      shared server log
//! ```
//!
//! Every record write goes through a temp file and a rename, so readers see
//! either the previous or the new record, never a partial one.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::record::{is_valid_task_id, TaskRecord};
use crate::error::StoreError;
use crate::provider::Provider;

const RECORD_EXT: &str = "json";
const OUTPUT_EXT: &str = "out";

/// Directory-backed store of task records.
#[derive(Debug, Clone)]
pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", task_id, RECORD_EXT))
    }

    pub fn output_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", task_id, OUTPUT_EXT))
    }

    pub fn contains(&self, task_id: &str) -> bool {
        is_valid_task_id(task_id) && self.record_path(task_id).exists()
    }

    /// Write a new record.
    pub fn create(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.write(record)?;
        debug!(task_id = %record.task_id, "Created task record");
        Ok(())
    }

    /// Replace an existing record in full.
    pub fn update(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.write(record)
    }

    fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        if !is_valid_task_id(&record.task_id) {
            return Err(StoreError::InvalidTaskId(record.task_id.clone()));
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.record_path(&record.task_id);
        let contents = serde_json::to_vec(record)?;
        atomic_write(&path, &contents)
    }

    /// Read a record. Missing, unreadable, and malformed records are all `None`.
    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        if !is_valid_task_id(task_id) {
            return None;
        }
        read_record(&self.record_path(task_id))
    }

    /// The record for `provider` whose file was modified most recently.
    ///
    /// Ties on modification time keep the first record in directory order,
    /// which is not stable across runs.
    pub fn latest_for_provider(&self, provider: Provider) -> Option<TaskRecord> {
        let mut latest: Option<(SystemTime, TaskRecord)> = None;
        for path in self.record_files() {
            let Some(record) = read_record(&path) else {
                continue;
            };
            if record.provider != provider {
                continue;
            }
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let newer = latest
                .as_ref()
                .map_or(true, |(best, _)| modified > *best);
            if newer {
                latest = Some((modified, record));
            }
        }
        latest.map(|(_, record)| record)
    }

    /// Evict records (and their output files) older than `ttl_secs`.
    ///
    /// Returns the number of records removed. `ttl_secs <= 0` is a no-op.
    pub fn sweep(&self, ttl_secs: i64) -> usize {
        self.sweep_at(ttl_secs, SystemTime::now())
    }

    /// [`sweep`](Self::sweep) against an explicit clock.
    pub fn sweep_at(&self, ttl_secs: i64, now: SystemTime) -> usize {
        if ttl_secs <= 0 {
            return 0;
        }
        let ttl = Duration::from_secs(ttl_secs as u64);
        let mut evicted = 0;

        for path in self.record_files() {
            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping record during sweep");
                    continue;
                }
            };
            // A modification time in the future counts as age zero.
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= ttl {
                continue;
            }

            // Record first: a concurrent poll then sees "unknown task" rather
            // than a record whose reply has vanished.
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to evict task record");
                continue;
            }
            let output = path.with_extension(OUTPUT_EXT);
            if let Err(e) = std::fs::remove_file(&output) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %output.display(), error = %e, "Failed to evict task output");
                }
            }
            evicted += 1;
        }

        evicted
    }

    /// Paths of all `*.json` files in the cache directory.
    fn record_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(dir = %self.dir.display(), error = %e, "Failed to list task cache");
                }
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|e| e == RECORD_EXT).unwrap_or(false))
            .collect()
    }
}

fn read_record(path: &Path) -> Option<TaskRecord> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring malformed task record");
            None
        }
    }
}

/// Write `data` to a `.tmp` sibling, then rename it over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, data)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
