//! Sliding-second admission counter keyed by identity.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tracing::warn;

/// Per-key admission limiter over fixed windows of `unit_secs` seconds.
///
/// Counters live behind a single mutex; a window that has fully elapsed is
/// reset lazily by the next `add` on its key, under the same lock, so the
/// reset can never race an admission decision. A refusal always returns
/// immediately.
#[derive(Debug)]
pub struct RateLimit {
    /// Window length in seconds.
    pub unit_secs: u64,
    /// Admissions allowed per key per window.
    pub max_count: usize,
    windows: Mutex<HashMap<String, Window>>,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: usize,
}

impl RateLimit {
    pub fn new(unit_secs: u64, max_count: usize) -> Self {
        Self {
            unit_secs: unit_secs.max(1),
            max_count,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an event for `key` and report whether it is admitted.
    ///
    /// With `audit` set, refusals are logged; either way the decision is
    /// returned immediately.
    pub fn add(&self, key: &str, audit: bool) -> bool {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started).as_secs() >= self.unit_secs {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        let admitted = window.count <= self.max_count;
        if !admitted && audit {
            warn!(
                key,
                max_count = self.max_count,
                unit_secs = self.unit_secs,
                "rate limit exceeded"
            );
        }
        admitted
    }
}
