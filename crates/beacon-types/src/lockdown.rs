//! Process-wide emergency kill switch.
//!
//! The flag is latching: once engaged, every command processor in the
//! process rejects commands until restart. It is read on every `process`
//! call and written at most once in anger, so a relaxed atomic is enough.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

static EMERGENCY_LOCK_DOWN: AtomicBool = AtomicBool::new(false);

/// Engage the emergency lock down. All command processing stops until the
/// process is restarted.
pub fn trigger_emergency_lock_down() {
    EMERGENCY_LOCK_DOWN.store(true, Ordering::Relaxed);
    warn!("emergency lock down is now in effect");
}

/// Whether the emergency lock down is engaged.
pub fn emergency_lock_down() -> bool {
    EMERGENCY_LOCK_DOWN.load(Ordering::Relaxed)
}

/// Disengage the lock down. Only tests have a legitimate use for this; a
/// production process stays locked until restart.
#[doc(hidden)]
pub fn clear_emergency_lock_down() {
    EMERGENCY_LOCK_DOWN.store(false, Ordering::Relaxed);
}
