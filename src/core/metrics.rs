//! Aggregate metrics derived from the live task set.
//!
//! Recomputed synchronously after every registry mutation and pushed outward
//! with each render update. No persisted state of its own.

use crate::core::registry::TaskRegistry;
use crate::core::task::TaskStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AggregateStats {
    /// Number of live tasks, any status.
    pub item_count: usize,
    /// Tasks that are `Downloading` with nonzero speed. A queued or stalled
    /// download does not count as active.
    pub active_count: usize,
    /// Combined throughput over exactly the active set, bytes per second.
    pub total_speed: u64,
}

impl AggregateStats {
    pub fn recompute(registry: &TaskRegistry) -> Self {
        let mut stats = AggregateStats {
            item_count: registry.len(),
            ..Default::default()
        };
        for task in registry.all() {
            if task.status == TaskStatus::Downloading && task.current_speed > 0 {
                stats.active_count += 1;
                stats.total_speed += task.current_speed;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::TransitionExtra;
    use crate::core::task::NewTask;
    use std::time::SystemTime;

    fn add(reg: &mut TaskRegistry, id: &str) {
        reg.create(
            id,
            NewTask {
                url: format!("https://x/{id}"),
                file_name: id.into(),
                total: Some(1000),
                dest_dir: None,
            },
            SystemTime::now(),
        );
    }

    #[test]
    fn active_set_is_downloading_with_nonzero_speed() {
        let mut reg = TaskRegistry::new();
        add(&mut reg, "a");
        add(&mut reg, "b");
        add(&mut reg, "c");
        reg.apply_progress("a", 100, Some(1000), 100);
        // b: paused, speed forced to zero by the transition
        reg.apply_progress("b", 100, Some(1000), 80);
        reg.transition("b", TaskStatus::Paused, TransitionExtra::default());
        // c: downloading but stalled
        reg.apply_progress("c", 100, Some(1000), 0);

        let stats = AggregateStats::recompute(&reg);
        assert_eq!(stats.item_count, 3);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.total_speed, 100);
    }

    #[test]
    fn empty_registry_yields_zeroes() {
        let stats = AggregateStats::recompute(&TaskRegistry::new());
        assert_eq!(stats, AggregateStats::default());
    }

    #[test]
    fn finished_tasks_contribute_nothing() {
        let mut reg = TaskRegistry::new();
        add(&mut reg, "a");
        reg.apply_progress("a", 1000, Some(1000), 50);
        reg.transition("a", TaskStatus::Finished, TransitionExtra::default());
        let stats = AggregateStats::recompute(&reg);
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.total_speed, 0);
    }
}
