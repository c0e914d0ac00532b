//! Shared "due at" tracking for the Discovery and DistributedHashtable
//! registries' scheduled maintenance tasks (spec §4.6). Both registries hand
//! a list of named tasks to a single [`Scheduler`] rather than each hand-
//! rolling its own `Instant` bookkeeping, mirroring
//! `lib-network::tasks::IntervalTable`'s one-table-of-named-intervals shape.

use std::time::Instant;
use tracing::trace;

/// Tracks when each of a fixed set of named tasks last fired, and reports
/// which are due relative to their own interval.
pub struct Scheduler {
    last_fired: Vec<Instant>,
}

impl Scheduler {
    /// Creates a scheduler for `count` tasks, all considered freshly fired
    /// as of now — nothing is due until its interval has actually elapsed.
    pub fn new(count: usize) -> Self {
        let now = Instant::now();
        Scheduler {
            last_fired: vec![now; count],
        }
    }

    /// Returns whether the task at `index` is due given `interval`, resetting
    /// its clock if so.
    pub fn poll(&mut self, index: usize, interval: std::time::Duration) -> bool {
        let now = Instant::now();
        let due = now.duration_since(self.last_fired[index]) >= interval;
        if due {
            trace!(index, "scheduled task due");
            self.last_fired[index] = now;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn nothing_due_immediately_after_construction() {
        let mut scheduler = Scheduler::new(2);
        assert!(!scheduler.poll(0, Duration::from_secs(60)));
        assert!(!scheduler.poll(1, Duration::from_secs(60)));
    }

    #[test]
    fn fires_once_interval_elapses_and_resets() {
        let mut scheduler = Scheduler::new(1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(scheduler.poll(0, Duration::from_millis(1)));
        assert!(!scheduler.poll(0, Duration::from_secs(60)));
    }

    #[test]
    fn tasks_are_tracked_independently() {
        let mut scheduler = Scheduler::new(2);
        std::thread::sleep(Duration::from_millis(5));
        assert!(scheduler.poll(0, Duration::from_millis(1)));
        assert!(!scheduler.poll(1, Duration::from_secs(60)));
    }
}
