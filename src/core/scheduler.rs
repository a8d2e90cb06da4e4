//! Presentation refresh scheduler for relative-age labels.
//!
//! A task's age label ("42 seconds ago", "3 days ago") only changes when its
//! age crosses a bucket boundary, so refreshing on a fixed global tick wastes
//! O(tasks) wakeups per tick. Instead, every task owns exactly one pending
//! entry in a single priority queue keyed by its next boundary-crossing
//! instant; the event-loop worker sleeps until the earliest deadline and
//! refreshes only the tasks that are actually due.
//!
//! Superseded and cancelled entries are tombstoned lazily: the heap keeps the
//! stale entry, and a per-id sequence number marks it dead when popped.

use crate::core::config::{DAY_SECS, HOUR_SECS, MINUTE_SECS};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

// ── Age buckets ──────────────────────────────────────────────────────────────

/// Granularity of a relative-age label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    Second,
    Minute,
    Hour,
    Day,
}

impl AgeBucket {
    pub fn for_age(age: Duration) -> Self {
        let secs = age.as_secs();
        if secs < MINUTE_SECS {
            AgeBucket::Second
        } else if secs < HOUR_SECS {
            AgeBucket::Minute
        } else if secs < DAY_SECS {
            AgeBucket::Hour
        } else {
            AgeBucket::Day
        }
    }

    /// Unit label as the presentation layer expects it.
    pub fn unit(&self) -> &'static str {
        match self {
            AgeBucket::Second => "second",
            AgeBucket::Minute => "minute",
            AgeBucket::Hour => "hour",
            AgeBucket::Day => "day",
        }
    }

    /// The age expressed in this bucket's unit, floored.
    pub fn value(&self, age: Duration) -> u64 {
        let secs = age.as_secs();
        match self {
            AgeBucket::Second => secs,
            AgeBucket::Minute => secs / MINUTE_SECS,
            AgeBucket::Hour => secs / HOUR_SECS,
            AgeBucket::Day => secs / DAY_SECS,
        }
    }
}

/// Time until the age label next changes: the next boundary of the current
/// bucket. A task aged 45 s is due in 15 s (the minute mark); a task aged
/// 3 days is due at the 4-day mark.
pub fn next_refresh_delay(age: Duration) -> Duration {
    let secs = age.as_secs();
    let step = match AgeBucket::for_age(age) {
        AgeBucket::Second => return Duration::from_secs(MINUTE_SECS - secs),
        AgeBucket::Minute => MINUTE_SECS,
        AgeBucket::Hour => HOUR_SECS,
        AgeBucket::Day => DAY_SECS,
    };
    Duration::from_secs(step - (secs % step))
}

// ── Scheduler ────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    due: Instant,
    seq: u64,
    id: String,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due
            .cmp(&other.due)
            .then(self.seq.cmp(&other.seq))
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct RefreshScheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    /// Sequence number of the one live entry per id. Heap entries with any
    /// other seq are tombstones.
    live: HashMap<String, u64>,
    next_seq: u64,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)schedule the single pending refresh for `id`, given its current
    /// age. Any previous entry for the id becomes a tombstone.
    pub fn schedule(&mut self, id: &str, age: Duration, now: Instant) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.live.insert(id.to_string(), seq);
        self.heap.push(Reverse(Entry {
            due: now + next_refresh_delay(age),
            seq,
            id: id.to_string(),
        }));
    }

    /// Drop the pending refresh for a deleted task.
    pub fn cancel(&mut self, id: &str) {
        self.live.remove(id);
    }

    /// Earliest live deadline, if any. Pops tombstones encountered on the way.
    pub fn next_due(&mut self) -> Option<Instant> {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.live.get(&entry.id) == Some(&entry.seq) {
                return Some(entry.due);
            }
            self.heap.pop();
        }
        None
    }

    /// Ids whose refresh deadline has passed. Each popped id loses its live
    /// entry; the caller reschedules it after re-rendering.
    pub fn pop_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().expect("peeked entry");
            if self.live.get(&entry.id) == Some(&entry.seq) {
                self.live.remove(&entry.id);
                due.push(entry.id);
            }
        }
        due
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_match_age_ranges() {
        assert_eq!(AgeBucket::for_age(Duration::from_secs(0)), AgeBucket::Second);
        assert_eq!(AgeBucket::for_age(Duration::from_secs(59)), AgeBucket::Second);
        assert_eq!(AgeBucket::for_age(Duration::from_secs(60)), AgeBucket::Minute);
        assert_eq!(AgeBucket::for_age(Duration::from_secs(3599)), AgeBucket::Minute);
        assert_eq!(AgeBucket::for_age(Duration::from_secs(3600)), AgeBucket::Hour);
        assert_eq!(AgeBucket::for_age(Duration::from_secs(86399)), AgeBucket::Hour);
        assert_eq!(AgeBucket::for_age(Duration::from_secs(86400)), AgeBucket::Day);
    }

    #[test]
    fn bucket_values_floor() {
        assert_eq!(AgeBucket::Minute.value(Duration::from_secs(119)), 1);
        assert_eq!(AgeBucket::Hour.value(Duration::from_secs(7300)), 2);
        assert_eq!(AgeBucket::Day.value(Duration::from_secs(3 * 86400 + 5)), 3);
    }

    #[test]
    fn refresh_delay_targets_next_boundary() {
        // 45 s old: next label change at the minute mark, 15 s away.
        assert_eq!(
            next_refresh_delay(Duration::from_secs(45)),
            Duration::from_secs(15)
        );
        // 90 s old: due at 120 s.
        assert_eq!(
            next_refresh_delay(Duration::from_secs(90)),
            Duration::from_secs(30)
        );
        // 3 days old: due a full day later.
        assert_eq!(
            next_refresh_delay(Duration::from_secs(3 * 86400)),
            Duration::from_secs(86400)
        );
        // Exactly on a boundary: due at the following one, never zero.
        assert_eq!(
            next_refresh_delay(Duration::from_secs(120)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn one_pending_entry_per_task() {
        let mut sched = RefreshScheduler::new();
        let now = Instant::now();
        sched.schedule("a", Duration::from_secs(10), now);
        sched.schedule("a", Duration::from_secs(70), now);
        assert_eq!(sched.pending_count(), 1);

        // Only the latest entry fires; the superseded one is a tombstone.
        let due = sched.pop_due(now + Duration::from_secs(3600));
        assert_eq!(due, vec!["a".to_string()]);
        assert!(sched.pop_due(now + Duration::from_secs(7200)).is_empty());
    }

    #[test]
    fn cancel_drops_pending_refresh() {
        let mut sched = RefreshScheduler::new();
        let now = Instant::now();
        sched.schedule("a", Duration::from_secs(10), now);
        sched.cancel("a");
        assert_eq!(sched.next_due(), None);
        assert!(sched.pop_due(now + Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn pop_due_respects_deadlines() {
        let mut sched = RefreshScheduler::new();
        let now = Instant::now();
        sched.schedule("young", Duration::from_secs(45), now); // due in 15 s
        sched.schedule("old", Duration::from_secs(86400 * 2), now); // due in a day

        assert!(sched.pop_due(now + Duration::from_secs(10)).is_empty());
        assert_eq!(
            sched.pop_due(now + Duration::from_secs(20)),
            vec!["young".to_string()]
        );
        assert_eq!(sched.next_due(), Some(now + Duration::from_secs(86400)));
    }
}
