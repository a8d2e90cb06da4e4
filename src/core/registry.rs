//! Task registry: the authoritative in-memory map of task id → task state.
//!
//! The registry is the single owner of live task state for the lifetime of a
//! session and the sole enforcer of the lifecycle transition table. It is a
//! plain single-threaded structure — the event-loop worker is the only code
//! that ever touches it, so it needs no locking.
//!
//! Race tolerance lives here, not in callers: any mutation referencing an
//! unknown id or a terminal task returns `Applied::Ignored` with a reason.
//! This is the primary defense against delayed or duplicate notifications
//! arriving after completion or deletion.

use crate::core::task::{NewTask, Task, TaskStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

// ── Mutation results ─────────────────────────────────────────────────────────

/// Why a mutation was dropped without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The id is not (or no longer) present in the registry.
    UnknownId,
    /// The task is in a terminal status and accepts no further mutations.
    TerminalStatus,
    /// The requested status change is not in the transition table.
    IllegalTransition,
}

/// Result of `apply_progress` / `transition`: either the mutation committed
/// or it was a deliberate no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Committed,
    Ignored(IgnoreReason),
}

impl Applied {
    pub fn is_committed(&self) -> bool {
        matches!(self, Applied::Committed)
    }
}

/// Extra data accompanying a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionExtra {
    /// Final file path, reported by a `completed` notification.
    pub path: Option<PathBuf>,
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
    /// Insertion order of ids, for a stable display order. Reinitializing an
    /// existing id keeps its position.
    order: Vec<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, or reinitialize the entry if the id is already present.
    ///
    /// A `started` notification always lands here regardless of prior state:
    /// an id re-queued by the engine supersedes whatever stale entry carried
    /// it before, reset to `Downloading` with the newest fields.
    pub fn create(&mut self, id: &str, fields: NewTask, now: SystemTime) -> &Task {
        let task = Task::create(id.to_string(), fields, now);
        if self.tasks.insert(id.to_string(), task).is_some() {
            debug!(event = "task_reinitialized", id = %id, "Existing task superseded by new started notification");
        } else {
            self.order.push(id.to_string());
        }
        &self.tasks[id]
    }

    /// Apply a progress report. No-op for unknown or terminal tasks.
    ///
    /// `received_bytes` never regresses while non-terminal, and is clamped to
    /// `total_bytes` once the size is known; a duplicate or late progress
    /// report can therefore never make the display move backwards.
    pub fn apply_progress(
        &mut self,
        id: &str,
        received: u64,
        total: Option<u64>,
        speed: u64,
    ) -> Applied {
        let Some(task) = self.tasks.get_mut(id) else {
            return Applied::Ignored(IgnoreReason::UnknownId);
        };
        if task.status.is_terminal() {
            return Applied::Ignored(IgnoreReason::TerminalStatus);
        }

        if let Some(t) = total.filter(|t| *t > 0) {
            task.total_bytes = Some(t);
        }
        let mut received = received.max(task.received_bytes);
        if let Some(t) = task.total_bytes {
            received = received.min(t);
        }
        task.received_bytes = received;
        task.current_speed = speed;
        Applied::Committed
    }

    /// Transition a task to a new status, validated against the table.
    /// No-op for unknown ids, terminal tasks, and illegal edges.
    pub fn transition(&mut self, id: &str, to: TaskStatus, extra: TransitionExtra) -> Applied {
        let Some(task) = self.tasks.get_mut(id) else {
            return Applied::Ignored(IgnoreReason::UnknownId);
        };
        if task.status.is_terminal() {
            return Applied::Ignored(IgnoreReason::TerminalStatus);
        }
        if !task.status.can_transition(to) {
            debug!(
                event = "illegal_transition",
                id = %id,
                from = ?task.status,
                to = ?to,
                "Transition rejected by lifecycle table"
            );
            return Applied::Ignored(IgnoreReason::IllegalTransition);
        }

        task.status = to;
        if let Some(path) = extra.path {
            task.destination_path = Some(path);
        }
        match to {
            TaskStatus::Finished => {
                // A finished task shows a full bar even if the last progress
                // tick never arrived.
                if let Some(t) = task.total_bytes {
                    task.received_bytes = t;
                } else {
                    task.total_bytes = Some(task.received_bytes);
                }
                task.current_speed = 0;
            }
            TaskStatus::Failed | TaskStatus::Paused => task.current_speed = 0,
            TaskStatus::Downloading => {}
        }
        Applied::Committed
    }

    /// Remove a task unconditionally. The only path to deletion; works from
    /// any status, including mid-transfer.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let removed = self.tasks.remove(id);
        if removed.is_some() {
            self.order.retain(|o| o != id);
        }
        removed
    }

    /// Insert an already-built task (history rehydration). Skips ids that are
    /// somehow already live.
    pub fn restore(&mut self, task: Task) {
        if !self.tasks.contains_key(&task.id) {
            self.order.push(task.id.clone());
            self.tasks.insert(task.id.clone(), task);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// All live tasks in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(url: &str, name: &str, total: Option<u64>) -> NewTask {
        NewTask {
            url: url.into(),
            file_name: name.into(),
            total,
            dest_dir: None,
        }
    }

    fn registry_with(id: &str, total: Option<u64>) -> TaskRegistry {
        let mut reg = TaskRegistry::new();
        reg.create(id, fields("https://x/y.bin", "y.bin", total), SystemTime::now());
        reg
    }

    #[test]
    fn progress_is_monotonic_until_terminal() {
        let mut reg = registry_with("a", Some(1000));
        assert!(reg.apply_progress("a", 300, Some(1000), 10).is_committed());
        assert!(reg.apply_progress("a", 200, Some(1000), 10).is_committed());
        assert_eq!(reg.get("a").unwrap().received_bytes, 300);
        assert!(reg.apply_progress("a", 700, Some(1000), 10).is_committed());
        assert_eq!(reg.get("a").unwrap().received_bytes, 700);
    }

    #[test]
    fn progress_clamps_to_known_total() {
        let mut reg = registry_with("a", Some(1000));
        reg.apply_progress("a", 5000, Some(1000), 10);
        assert_eq!(reg.get("a").unwrap().received_bytes, 1000);
    }

    #[test]
    fn progress_on_unknown_id_changes_nothing() {
        let mut reg = registry_with("a", Some(1000));
        assert_eq!(
            reg.apply_progress("ghost", 500, Some(1000), 10),
            Applied::Ignored(IgnoreReason::UnknownId)
        );
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("a").unwrap().received_bytes, 0);
    }

    #[test]
    fn progress_on_terminal_task_is_ignored() {
        let mut reg = registry_with("a", Some(1000));
        reg.transition("a", TaskStatus::Finished, TransitionExtra::default());
        assert_eq!(
            reg.apply_progress("a", 500, Some(1000), 10),
            Applied::Ignored(IgnoreReason::TerminalStatus)
        );
        assert_eq!(reg.get("a").unwrap().received_bytes, 1000);
    }

    #[test]
    fn duplicate_create_reinitializes_single_entry() {
        let mut reg = registry_with("a", Some(1000));
        reg.apply_progress("a", 800, Some(1000), 10);
        reg.create(
            "a",
            fields("https://x/z.bin", "z.bin", Some(2000)),
            SystemTime::now(),
        );
        assert_eq!(reg.len(), 1);
        let task = reg.get("a").unwrap();
        assert_eq!(task.status, TaskStatus::Downloading);
        assert_eq!(task.display_name, "z.bin");
        assert_eq!(task.total_bytes, Some(2000));
        assert_eq!(task.received_bytes, 0);
    }

    #[test]
    fn create_preserves_display_order_on_reinit() {
        let mut reg = registry_with("a", None);
        reg.create("b", fields("https://x/b", "b", None), SystemTime::now());
        reg.create("a", fields("https://x/a2", "a2", None), SystemTime::now());
        let ids: Vec<&str> = reg.all().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn illegal_transition_is_ignored() {
        let mut reg = registry_with("a", Some(1000));
        reg.transition("a", TaskStatus::Paused, TransitionExtra::default());
        assert_eq!(
            reg.transition("a", TaskStatus::Finished, TransitionExtra::default()),
            Applied::Ignored(IgnoreReason::IllegalTransition)
        );
        assert_eq!(reg.get("a").unwrap().status, TaskStatus::Paused);
    }

    #[test]
    fn finish_records_path_and_zeroes_speed() {
        let mut reg = registry_with("a", Some(1000));
        reg.apply_progress("a", 500, Some(1000), 50);
        let applied = reg.transition(
            "a",
            TaskStatus::Finished,
            TransitionExtra {
                path: Some("/d/y.bin".into()),
            },
        );
        assert!(applied.is_committed());
        let task = reg.get("a").unwrap();
        assert_eq!(task.destination_path, Some("/d/y.bin".into()));
        assert_eq!(task.current_speed, 0);
        assert_eq!(task.received_bytes, 1000);
    }

    #[test]
    fn finish_without_known_total_adopts_received() {
        let mut reg = registry_with("a", None);
        reg.apply_progress("a", 345, None, 50);
        reg.transition("a", TaskStatus::Finished, TransitionExtra::default());
        assert_eq!(reg.get("a").unwrap().total_bytes, Some(345));
    }

    #[test]
    fn remove_works_from_any_status() {
        let mut reg = registry_with("a", Some(1000));
        reg.apply_progress("a", 500, Some(1000), 50);
        assert!(reg.remove("a").is_some());
        assert!(reg.is_empty());
        assert!(reg.remove("a").is_none());
    }
}
