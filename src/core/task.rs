//! Download task entity and its lifecycle state machine.
//!
//! A `Task` is one download unit tracked end-to-end by a stable identifier
//! assigned by the transfer engine. The status field is the single source of
//! truth for lifecycle position — there are no auxiliary boolean flags — and
//! every transition is validated against `TaskStatus::can_transition`.
//! Deletion is not a status: a deleted task is simply absent from the
//! registry and the history file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

// ── Task Status ──────────────────────────────────────────────────────────────

/// All states a live task can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The engine is (or should be) transferring bytes for this task.
    Downloading,
    /// A cancel request was confirmed by the engine; eligible for resume.
    Paused,
    /// All bytes received and the file moved into place.
    Finished,
    /// The engine reported an unrecoverable error.
    Failed,
}

impl TaskStatus {
    /// Terminal states accept no further notifications.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Failed)
    }

    /// The lifecycle transition table. Everything not listed here is illegal
    /// and must be ignored by the registry, not patched around at call sites.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Downloading, TaskStatus::Finished)
                | (TaskStatus::Downloading, TaskStatus::Failed)
                | (TaskStatus::Downloading, TaskStatus::Paused)
                | (TaskStatus::Paused, TaskStatus::Downloading)
        )
    }
}

// ── Task ─────────────────────────────────────────────────────────────────────

/// One download tracked by the registry.
#[derive(Debug, Clone)]
pub struct Task {
    /// Opaque, stable identifier assigned by the transfer engine.
    pub id: String,
    pub source_url: String,
    pub display_name: String,
    /// Known size in bytes, or `None` until the engine first reports one.
    pub total_bytes: Option<u64>,
    /// Monotonically non-decreasing while the task is non-terminal.
    pub received_bytes: u64,
    /// Instantaneous throughput estimate; zero when not actively transferring.
    pub current_speed: u64,
    pub status: TaskStatus,
    /// Resolved once known — may precede completion.
    pub destination_path: Option<PathBuf>,
    pub created_at: SystemTime,
}

/// Fields supplied by a `started` notification when (re)creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub url: String,
    pub file_name: String,
    pub total: Option<u64>,
    pub dest_dir: Option<String>,
}

impl Task {
    /// Build a fresh task in `Downloading` state from a `started` payload.
    pub fn create(id: String, fields: NewTask, now: SystemTime) -> Self {
        let destination_path = fields
            .dest_dir
            .map(|dir| PathBuf::from(dir).join(&fields.file_name));
        Self {
            id,
            source_url: fields.url,
            display_name: fields.file_name,
            total_bytes: fields.total.filter(|t| *t > 0),
            received_bytes: 0,
            current_speed: 0,
            status: TaskStatus::Downloading,
            destination_path,
            created_at: now,
        }
    }

    /// Task age relative to `now`. Clock skew yields zero, never a panic.
    pub fn age(&self, now: SystemTime) -> std::time::Duration {
        now.duration_since(self.created_at).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_accepts_lifecycle_edges() {
        use TaskStatus::*;
        assert!(Downloading.can_transition(Finished));
        assert!(Downloading.can_transition(Failed));
        assert!(Downloading.can_transition(Paused));
        assert!(Paused.can_transition(Downloading));
    }

    #[test]
    fn transition_table_rejects_everything_else() {
        use TaskStatus::*;
        assert!(!Paused.can_transition(Finished));
        assert!(!Paused.can_transition(Failed));
        assert!(!Finished.can_transition(Downloading));
        assert!(!Failed.can_transition(Paused));
        assert!(!Downloading.can_transition(Downloading));
    }

    #[test]
    fn zero_total_is_treated_as_unknown() {
        let task = Task::create(
            "t1".into(),
            NewTask {
                url: "https://x/y.bin".into(),
                file_name: "y.bin".into(),
                total: Some(0),
                dest_dir: None,
            },
            SystemTime::now(),
        );
        assert_eq!(task.total_bytes, None);
    }

    #[test]
    fn dest_dir_resolves_destination_early() {
        let task = Task::create(
            "t1".into(),
            NewTask {
                url: "https://x/y.bin".into(),
                file_name: "y.bin".into(),
                total: Some(1000),
                dest_dir: Some("/downloads".into()),
            },
            SystemTime::now(),
        );
        assert_eq!(
            task.destination_path,
            Some(PathBuf::from("/downloads/y.bin"))
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Finished).unwrap(),
            "\"finished\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"downloading\"").unwrap(),
            TaskStatus::Downloading
        );
    }
}
