//! Centralized configuration constants for Downdeck.
//!
//! All tunable parameters live here so they can be reviewed and adjusted in a
//! single place. Serialization details (history record field names, bridge
//! line tags) stay with their respective modules.

// ── Engine Commands ──────────────────────────────────────────────────────────

/// Default number of connections the engine uses per download.
pub const DEFAULT_THREADS: u8 = 4;

/// Connection-count clamp bounds for start/resume requests.
/// The engine rejects anything outside this range, so clamp before sending.
pub const MIN_THREADS: u8 = 1;
pub const MAX_THREADS: u8 = 32;

// ── Persistence ──────────────────────────────────────────────────────────────

/// Filename of the durable download history, under the data directory.
/// A single JSON document holding one `downloads` collection; single-writer,
/// no concurrent-process access assumed.
pub const HISTORY_FILE: &str = "downloads.json";

// ── Refresh Scheduling ───────────────────────────────────────────────────────

/// Age-bucket boundaries for relative-time labels, in seconds.
/// Below `MINUTE` a task's age renders in seconds, below `HOUR` in minutes,
/// below `DAY` in hours, and in days beyond that.
pub const MINUTE_SECS: u64 = 60;
pub const HOUR_SECS: u64 = 3600;
pub const DAY_SECS: u64 = 86400;

/// Clamp a requested connection count to what the engine accepts.
pub fn clamp_threads(threads: u8) -> u8 {
    threads.clamp(MIN_THREADS, MAX_THREADS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_clamping() {
        assert_eq!(clamp_threads(0), 1);
        assert_eq!(clamp_threads(4), 4);
        assert_eq!(clamp_threads(200), 32);
    }
}
