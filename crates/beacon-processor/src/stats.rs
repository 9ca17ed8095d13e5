//! Process-duration accounting for command executions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Count and total wall time of processed commands. Fed on every return
/// from `CommandProcessor::process`, across all processor instances in the
/// process.
#[derive(Debug, Default)]
pub struct CommandStats {
    count: AtomicU64,
    total_nanos: AtomicU64,
}

/// The process-wide accumulator.
pub static COMMAND_STATS: CommandStats = CommandStats::new();

impl CommandStats {
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
        }
    }

    /// Record one command's wall time.
    pub fn observe(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total_nanos(&self) -> u64 {
        self.total_nanos.load(Ordering::Relaxed)
    }

    /// Mean duration in nanoseconds, zero when nothing was observed.
    pub fn average_nanos(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            0
        } else {
            self.total_nanos() / count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_accumulates() {
        let stats = CommandStats::new();
        assert_eq!(stats.average_nanos(), 0);

        stats.observe(Duration::from_nanos(100));
        stats.observe(Duration::from_nanos(300));
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.total_nanos(), 400);
        assert_eq!(stats.average_nanos(), 200);
    }
}
