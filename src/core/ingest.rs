//! Lifecycle event ingestor: engine notifications → registry mutations.
//!
//! Pure translation, one notification at a time, in arrival order. No
//! buffering, no reordering, no compensation: the registry's no-op policy
//! for unknown ids, terminal tasks, and illegal edges is the entire defense
//! against delayed or duplicate notifications, and an ignored notification
//! is logged at debug and surfaced nowhere else.

use crate::core::events::EngineNotification;
use crate::core::registry::{Applied, TaskRegistry, TransitionExtra};
use crate::core::task::{NewTask, TaskStatus};
use std::time::SystemTime;
use tracing::debug;

/// What a notification did to the registry, as the session needs to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A task was created or reinitialized (`started`).
    Created,
    /// Byte counters advanced; no lifecycle change.
    Progressed,
    /// A status transition committed.
    Transitioned(TaskStatus),
    /// The notification was stale and changed nothing.
    Ignored,
}

impl IngestOutcome {
    /// Did this notification change durable state (anything but progress)?
    pub fn is_lifecycle_change(&self) -> bool {
        matches!(self, IngestOutcome::Created | IngestOutcome::Transitioned(_))
    }
}

/// Apply one notification to the registry.
pub fn apply(
    registry: &mut TaskRegistry,
    notification: &EngineNotification,
    now: SystemTime,
) -> IngestOutcome {
    let applied = match notification {
        EngineNotification::Started {
            id,
            url,
            file_name,
            total,
            dest_dir,
        } => {
            registry.create(
                id,
                NewTask {
                    url: url.clone(),
                    file_name: file_name.clone(),
                    total: *total,
                    dest_dir: dest_dir.clone(),
                },
                now,
            );
            return IngestOutcome::Created;
        }
        EngineNotification::Progress {
            id,
            received,
            total,
            speed,
        } => {
            // Zero total means the engine does not know the size yet.
            let total = (*total > 0).then_some(*total);
            match registry.apply_progress(id, *received, total, *speed) {
                Applied::Committed => return IngestOutcome::Progressed,
                ignored => ignored,
            }
        }
        EngineNotification::Completed { id, path } => registry.transition(
            id,
            TaskStatus::Finished,
            TransitionExtra {
                path: Some(path.into()),
            },
        ),
        EngineNotification::Failed { id, error } => {
            debug!(event = "task_failed", id = %id, error = %error);
            registry.transition(id, TaskStatus::Failed, TransitionExtra::default())
        }
        // The engine's cancel confirmation; pause becomes real here.
        EngineNotification::Canceled { id } => {
            registry.transition(id, TaskStatus::Paused, TransitionExtra::default())
        }
    };

    match applied {
        Applied::Committed => {
            let status = match notification {
                EngineNotification::Completed { .. } => TaskStatus::Finished,
                EngineNotification::Failed { .. } => TaskStatus::Failed,
                EngineNotification::Canceled { .. } => TaskStatus::Paused,
                _ => unreachable!("progress and started return early"),
            };
            IngestOutcome::Transitioned(status)
        }
        Applied::Ignored(reason) => {
            debug!(
                event = "stale_notification",
                id = %notification.task_id(),
                reason = ?reason,
                "Notification dropped"
            );
            IngestOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> EngineNotification {
        EngineNotification::Started {
            id: id.into(),
            url: format!("https://x/{id}"),
            file_name: format!("{id}.bin"),
            total: Some(1000),
            dest_dir: None,
        }
    }

    #[test]
    fn full_lifecycle_flows_through_registry() {
        let mut reg = TaskRegistry::new();
        let now = SystemTime::now();

        assert_eq!(apply(&mut reg, &started("a"), now), IngestOutcome::Created);
        assert_eq!(
            apply(
                &mut reg,
                &EngineNotification::Progress {
                    id: "a".into(),
                    received: 400,
                    total: 1000,
                    speed: 50,
                },
                now,
            ),
            IngestOutcome::Progressed
        );
        assert_eq!(
            apply(
                &mut reg,
                &EngineNotification::Completed {
                    id: "a".into(),
                    path: "/d/a.bin".into(),
                },
                now,
            ),
            IngestOutcome::Transitioned(TaskStatus::Finished)
        );
        let task = reg.get("a").unwrap();
        assert_eq!(task.status, TaskStatus::Finished);
        assert_eq!(task.received_bytes, 1000);
    }

    #[test]
    fn canceled_commits_the_pause() {
        let mut reg = TaskRegistry::new();
        let now = SystemTime::now();
        apply(&mut reg, &started("a"), now);
        assert_eq!(
            apply(&mut reg, &EngineNotification::Canceled { id: "a".into() }, now),
            IngestOutcome::Transitioned(TaskStatus::Paused)
        );
    }

    #[test]
    fn progress_after_completion_is_ignored() {
        let mut reg = TaskRegistry::new();
        let now = SystemTime::now();
        apply(&mut reg, &started("a"), now);
        apply(
            &mut reg,
            &EngineNotification::Completed {
                id: "a".into(),
                path: "/d/a.bin".into(),
            },
            now,
        );
        assert_eq!(
            apply(
                &mut reg,
                &EngineNotification::Progress {
                    id: "a".into(),
                    received: 999,
                    total: 1000,
                    speed: 10,
                },
                now,
            ),
            IngestOutcome::Ignored
        );
    }

    #[test]
    fn unknown_id_is_ignored_without_creating_anything() {
        let mut reg = TaskRegistry::new();
        assert_eq!(
            apply(
                &mut reg,
                &EngineNotification::Failed {
                    id: "ghost".into(),
                    error: "404".into(),
                },
                SystemTime::now(),
            ),
            IngestOutcome::Ignored
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn zero_progress_total_keeps_size_unknown() {
        let mut reg = TaskRegistry::new();
        let now = SystemTime::now();
        apply(
            &mut reg,
            &EngineNotification::Started {
                id: "a".into(),
                url: "https://x".into(),
                file_name: "x".into(),
                total: None,
                dest_dir: None,
            },
            now,
        );
        apply(
            &mut reg,
            &EngineNotification::Progress {
                id: "a".into(),
                received: 100,
                total: 0,
                speed: 5,
            },
            now,
        );
        assert_eq!(reg.get("a").unwrap().total_bytes, None);
    }
}
