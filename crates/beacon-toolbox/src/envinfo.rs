//! Environment inspection and the remote emergency stop.

use std::sync::OnceLock;
use std::time::Instant;

use chrono::Utc;

use beacon_types::{trigger_emergency_lock_down, Command, CommandResult, ProcessorError};

use crate::feature::{Feature, ENV_INFO_TRIGGER};

/// Process start reference for the uptime report, captured on first
/// initialisation.
static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Inspect the runtime environment, or engage the emergency lock down.
///
/// Sub-commands:
/// - `info`: hostname, clock, pid, uptime, and working directory.
/// - `lock`: latch the process-wide emergency lock down. The confirmation
///   in the result is the last output the daemon will ever produce until
///   restart.
#[derive(Default)]
pub struct EnvInfo;

impl EnvInfo {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for EnvInfo {
    fn trigger(&self) -> &'static str {
        ENV_INFO_TRIGGER
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn initialise(&mut self) -> Result<(), ProcessorError> {
        STARTED_AT.get_or_init(Instant::now);
        Ok(())
    }

    fn self_test(&self) -> Result<(), ProcessorError> {
        Ok(())
    }

    fn execute(&self, mut cmd: Command) -> CommandResult {
        if let Some(reject) = cmd.trim() {
            return reject;
        }
        match cmd.content.split_whitespace().next().unwrap_or_default() {
            "info" => CommandResult::with_output(runtime_info()),
            "lock" => {
                trigger_emergency_lock_down();
                CommandResult::with_output("OK, emergency lock down is now in effect")
            }
            other => CommandResult::from_error(ProcessorError::feature(format!(
                "environment command must be one of info, lock (got {other:?})"
            ))),
        }
    }
}

fn runtime_info() -> String {
    let hostname = std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "(unknown)".to_string());
    let uptime_secs = STARTED_AT
        .get()
        .map(|started| started.elapsed().as_secs())
        .unwrap_or_default();
    let working_dir = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "(unknown)".to_string());
    format!(
        "Hostname: {hostname}\nClock: {}\nPID: {}\nUptime: {uptime_secs}s\nWorking directory: {working_dir}",
        Utc::now().to_rfc3339(),
        std::process::id(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::{clear_emergency_lock_down, emergency_lock_down};

    fn env_info() -> EnvInfo {
        let mut feature = EnvInfo::new();
        feature.initialise().unwrap();
        feature
    }

    #[test]
    fn info_reports_runtime_details() {
        let ret = env_info().execute(Command::new("test", 10, "info"));
        assert!(ret.error.is_none());
        assert!(ret.output.contains("PID:"));
        assert!(ret.output.contains("Uptime:"));
        assert!(ret.output.contains("Clock:"));
    }

    #[test]
    fn unknown_choice_is_an_error() {
        let ret = env_info().execute(Command::new("test", 10, "wrong"));
        let err = ret.error.expect("unknown choice must fail");
        assert!(err.to_string().contains("info, lock"));
    }

    #[test]
    fn lock_engages_the_kill_switch() {
        let ret = env_info().execute(Command::new("test", 10, "lock"));
        assert!(ret.error.is_none());
        assert!(emergency_lock_down());
        // Undo the latch so other tests in this binary are unaffected.
        clear_emergency_lock_down();
    }
}
