//! Typed errors produced by the command-processing pipeline.
//!
//! Every error a command can run into is returned inside
//! [`CommandResult::error`](crate::CommandResult); callers never see a panic
//! or a thrown error. Front-ends inspect the variant to decide how much to
//! reveal: a [`ProcessorError::PinAndShortcutNotFound`] must be concealed
//! (404, hang up) so the endpoint does not become a PIN oracle.

/// Prefix attached to every configuration complaint raised by
/// `CommandProcessor::is_sane_for_internet`. Front-ends match on it to
/// refuse serving with a broken processor.
pub const BAD_PROCESSOR_CONFIG: &str = "bad configuration: ";

/// Errors that can occur while admitting, filtering, dispatching, or
/// post-processing a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    /// The process-wide emergency kill switch is engaged.
    #[error("emergency lock down is in effect")]
    EmergencyLockDown,

    /// The per-instance command rate ceiling has been tripped.
    #[error("command processor internal rate limit has been exceeded")]
    RateLimitExceeded,

    /// No line of the command matched the PIN or any shortcut.
    #[error("failed to match PIN/shortcut")]
    PinAndShortcutNotFound,

    /// The command does not start with any configured feature trigger.
    #[error("bad prefix or feature is not configured")]
    BadPrefix,

    /// Malformed `.plt` override; the message doubles as a syntax reminder.
    #[error(".plt P L T command")]
    BadPlt,

    /// The `.plt` override needs a text linter to act on, and none is set up.
    #[error("PLT is not available because LintText is not used")]
    PltUnavailable,

    /// The command content is empty after trimming.
    #[error("empty command")]
    EmptyCommand,

    /// A component is missing or mis-set; distinguishable from credential
    /// failures so callers can surface it at startup instead of serving.
    #[error("bad configuration: {0}")]
    BadConfig(String),

    /// Whatever a toolbox feature produced while executing the command.
    #[error("{0}")]
    Feature(String),
}

impl ProcessorError {
    /// Convenience constructor for feature-side failures.
    pub fn feature(msg: impl Into<String>) -> Self {
        ProcessorError::Feature(msg.into())
    }

    /// Convenience constructor for configuration failures.
    pub fn bad_config(msg: impl Into<String>) -> Self {
        ProcessorError::BadConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_config_carries_common_prefix() {
        let err = ProcessorError::bad_config("PIN is too short");
        assert_eq!(err.to_string(), "bad configuration: PIN is too short");
        assert!(err.to_string().starts_with(BAD_PROCESSOR_CONFIG));
    }

    #[test]
    fn credential_and_config_errors_are_distinguishable() {
        let credential = ProcessorError::PinAndShortcutNotFound;
        let config = ProcessorError::bad_config("no PIN and no shortcuts");
        assert_ne!(credential, config);
        assert!(!credential.to_string().starts_with(BAD_PROCESSOR_CONFIG));
    }

    #[test]
    fn bad_plt_reminds_of_syntax() {
        assert_eq!(ProcessorError::BadPlt.to_string(), ".plt P L T command");
    }
}
