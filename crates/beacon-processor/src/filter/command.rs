//! Command filters: authentication and literal rewriting.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use beacon_types::{Command, ProcessorError};

use super::CommandFilter;

/// Authenticate a command by PIN prefix or whole-line shortcut.
///
/// Each line of the command is inspected in order, trimmed:
/// 1. A line that exactly equals a shortcut key expands to the mapped
///    command.
/// 2. A line longer than the PIN whose leading bytes equal the PIN (under a
///    constant-time comparison) continues as the remainder of that line.
///
/// When no line matches, the filter rejects with
/// [`ProcessorError::PinAndShortcutNotFound`]; front-ends must conceal the
/// endpoint on that error to avoid becoming a PIN oracle.
///
/// # Security
///
/// The PIN comparison must not leak the PIN length or any matching prefix
/// through response timing, hence `subtle::ConstantTimeEq` rather than `==`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PinAndShortcuts {
    /// Shared secret prefix that authenticates a line.
    pub pin: String,
    /// Whole-line synonyms expanding to canned commands.
    pub shortcuts: HashMap<String, String>,
}

impl CommandFilter for PinAndShortcuts {
    fn transform(&self, cmd: Command) -> Result<Command, ProcessorError> {
        if self.pin.is_empty() && self.shortcuts.is_empty() {
            return Err(ProcessorError::bad_config(
                "a PIN, command shortcuts, or both must be configured",
            ));
        }
        let pin_bytes = self.pin.as_bytes();
        for line in cmd.lines() {
            let line = line.trim();
            if let Some(expanded) = self.shortcuts.get(line) {
                let mut ret = cmd.clone();
                ret.content = expanded.clone();
                return Ok(ret);
            }
            let line_bytes = line.as_bytes();
            if line_bytes.len() > pin_bytes.len()
                && bool::from(line_bytes[..pin_bytes.len()].ct_eq(pin_bytes))
            {
                let mut ret = cmd.clone();
                ret.content = String::from_utf8_lossy(&line_bytes[pin_bytes.len()..]).into_owned();
                return Ok(ret);
            }
        }
        Err(ProcessorError::PinAndShortcutNotFound)
    }

    fn as_pin(&self) -> Option<&PinAndShortcuts> {
        Some(self)
    }
}

/// Perform literal substring replacements on the command content.
///
/// Tuples with a length other than two are skipped silently. Replacements
/// run in declaration order; disjoint rule sets are order-independent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateSequences {
    pub sequences: Vec<Vec<String>>,
}

impl CommandFilter for TranslateSequences {
    fn transform(&self, cmd: Command) -> Result<Command, ProcessorError> {
        let mut content = cmd.content.clone();
        for tuple in &self.sequences {
            if tuple.len() != 2 {
                continue;
            }
            content = content.replace(&tuple[0], &tuple[1]);
        }
        let mut ret = cmd;
        ret.content = content;
        Ok(ret)
    }
}
