//! Read-only projections pushed through the render hook.
//!
//! The presentation layer never reaches into the registry: after every
//! committed mutation the session emits a `RenderUpdate` carrying a
//! `TaskView` snapshot of the affected task plus the current aggregate
//! stats. Rendering technology is out of scope here — the view only
//! preformats what every frontend needs.

use crate::core::metrics::AggregateStats;
use crate::core::scheduler::AgeBucket;
use crate::core::task::{Task, TaskStatus};
use serde::Serialize;
use std::time::SystemTime;

// ── Formatting helpers ───────────────────────────────────────────────────────

/// Converts bytes to human-readable file size format.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Throughput label; an em-dash placeholder when idle.
pub fn format_speed(bytes_per_sec: u64) -> String {
    if bytes_per_sec == 0 {
        "—".to_string()
    } else {
        format!("{}/s", format_file_size(bytes_per_sec))
    }
}

// ── Task view ────────────────────────────────────────────────────────────────

/// Snapshot of one task, safe to hand to any presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskView {
    pub id: String,
    pub url: String,
    pub name: String,
    pub status: TaskStatus,
    pub received: u64,
    pub total: Option<u64>,
    pub speed: u64,
    pub path: Option<String>,
    /// "500.00 KB / 1.00 MB" while sizing is known, otherwise just received.
    pub size_label: String,
    pub speed_label: String,
    /// 0..=100 when the total is known.
    pub percent: Option<u8>,
    /// Relative-age pair for the date column: value in `age_unit`s ago.
    pub age_value: u64,
    pub age_unit: &'static str,
}

impl TaskView {
    pub fn project(task: &Task, now: SystemTime) -> Self {
        let size_label = match task.total_bytes {
            Some(total) if task.status == TaskStatus::Downloading => format!(
                "{} / {}",
                format_file_size(task.received_bytes),
                format_file_size(total)
            ),
            Some(total) => format_file_size(total),
            None if task.received_bytes > 0 => format_file_size(task.received_bytes),
            None => "—".to_string(),
        };
        let percent = task.total_bytes.filter(|t| *t > 0).map(|total| {
            (task.received_bytes.saturating_mul(100) / total).min(100) as u8
        });
        let age = task.age(now);
        let bucket = AgeBucket::for_age(age);

        Self {
            id: task.id.clone(),
            url: task.source_url.clone(),
            name: task.display_name.clone(),
            status: task.status,
            received: task.received_bytes,
            total: task.total_bytes,
            speed: task.current_speed,
            path: task
                .destination_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            size_label,
            speed_label: format_speed(task.current_speed),
            percent,
            age_value: bucket.value(age),
            age_unit: bucket.unit(),
        }
    }
}

// ── Render hook payload ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Upsert(TaskView),
    Remove(String),
}

/// One committed mutation, as seen by the presentation collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUpdate {
    pub op: RenderOp,
    pub stats: AggregateStats,
}
