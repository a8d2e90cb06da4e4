//! Durable download history, surviving process restarts.
//!
//! One JSON document (`downloads.json` under the data directory) holding a
//! single `downloads` collection. The store is the exclusive owner of durable
//! writes; the registry owns live state. Records are written on task creation
//! and on every status transition — never on progress ticks, which bounds
//! write volume to lifecycle changes.
//!
//! Persistence failures are non-fatal by contract: callers log and continue,
//! and the in-memory registry stays authoritative for the session.

use crate::core::task::{Task, TaskStatus};
use crate::utils::atomic_write::atomic_write;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Durable projection of a task's non-transient fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub id: String,
    pub url: String,
    pub file_name: String,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub path: Option<String>,
    pub status: TaskStatus,
    /// Unix seconds.
    pub created_at: u64,
}

impl HistoryRecord {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            url: task.source_url.clone(),
            file_name: task.display_name.clone(),
            total: task.total_bytes,
            path: task
                .destination_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            status: task.status,
            created_at: task
                .created_at
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    /// Rebuild a live task from a rehydrated terminal record.
    pub fn into_task(self) -> Task {
        Task {
            received_bytes: self.total.unwrap_or(0),
            id: self.id,
            source_url: self.url,
            display_name: self.file_name,
            total_bytes: self.total,
            current_speed: 0,
            status: self.status,
            destination_path: self.path.map(PathBuf::from),
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(self.created_at),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    downloads: Vec<HistoryRecord>,
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    /// Open the store, loading whatever the previous session left behind.
    ///
    /// Records still marked `downloading` or `paused` belong to tasks that no
    /// longer exist in any engine — this core makes no resumability guarantee
    /// — so they are pruned here rather than presented as live. A missing or
    /// unreadable file degrades to an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HistoryFile>(&content) {
                Ok(file) => file.downloads,
                Err(e) => {
                    warn!(
                        event = "history_parse_failure",
                        path = %path.display(),
                        error = %e,
                        "History file unreadable, starting empty"
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let before = records.len();
        records.retain(|r| r.status.is_terminal());
        let pruned = before - records.len();

        let store = Self { path, records };
        if pruned > 0 {
            info!(
                event = "history_pruned",
                count = pruned,
                "Dropped non-terminal records from a previous session"
            );
            if let Err(e) = store.save() {
                warn!(event = "history_save_failure", error = %e, "Failed to rewrite pruned history");
            }
        }
        store
    }

    /// All persisted records, terminal-only after `open`.
    pub fn load_all(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Insert or replace the record with the same id, then persist.
    pub fn upsert(&mut self, record: HistoryRecord) -> Result<()> {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        self.save()
    }

    /// Drop the record for a deleted task, then persist.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Ok(());
        }
        self.save()
    }

    fn save(&self) -> Result<()> {
        let file = HistoryFile {
            downloads: self.records.clone(),
        };
        let content = serde_json::to_vec_pretty(&file)?;
        atomic_write(&self.path, &content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
