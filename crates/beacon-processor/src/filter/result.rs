//! Result filters: output linting, empty-output marking, mail notification.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use beacon_inet::{MailClient, OUTGOING_MAIL_SUBJECT_KEYWORD};
use beacon_types::{CommandResult, ProcessorError};

use super::ResultFilter;

/// Replacement text when the combined output has nothing visible in it.
pub const EMPTY_OUTPUT_TEXT: &str = "EMPTY OUTPUT";

fn consecutive_spaces() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Lint the combined output, each step toggled independently and applied
/// in this order:
///
/// 1. Trim every line, rejoin with `\n`, trim the whole.
/// 2. Compress all lines into one, joined by `;`.
/// 3. Replace code points outside printable-or-whitespace 7-bit ASCII
///    with `?`.
/// 4. Collapse whitespace runs into a single space.
/// 5. Drop the first `begin_position` bytes.
/// 6. Truncate to `max_length` bytes.
///
/// Steps 5 and 6 deliberately count bytes, not characters: SMS and DTMF
/// transports budget bytes, and step 3 has usually reduced the text to
/// ASCII by then. Multi-byte sequences cut in half are replaced, not
/// carried over broken.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LintText {
    pub trim_spaces: bool,
    pub compress_to_single_line: bool,
    pub keep_visible_7bit_chars_only: bool,
    pub compress_spaces: bool,
    pub begin_position: usize,
    pub max_length: usize,
}

impl ResultFilter for LintText {
    fn transform(&self, result: &mut CommandResult) -> Result<(), ProcessorError> {
        let mut text = result.combined_output.clone();
        if self.trim_spaces {
            text = text
                .split('\n')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
        }
        if self.compress_to_single_line {
            text = text.replace('\n', ";");
        }
        if self.keep_visible_7bit_chars_only {
            text = text
                .chars()
                .map(|c| {
                    if c.is_ascii() && (c.is_ascii_graphic() || c.is_ascii_whitespace()) {
                        c
                    } else {
                        '?'
                    }
                })
                .collect();
        }
        if self.compress_spaces {
            text = consecutive_spaces().replace_all(&text, " ").into_owned();
        }
        if self.begin_position > 0 {
            let bytes = text.into_bytes();
            text = if bytes.len() > self.begin_position {
                String::from_utf8_lossy(&bytes[self.begin_position..]).into_owned()
            } else {
                String::new()
            };
        }
        if self.max_length > 0 && text.len() > self.max_length {
            let bytes = text.into_bytes();
            text = String::from_utf8_lossy(&bytes[..self.max_length]).into_owned();
        }
        result.combined_output = text;
        Ok(())
    }

    fn as_lint(&self) -> Option<&LintText> {
        Some(self)
    }
}

/// Substitute the whole combined output with [`EMPTY_OUTPUT_TEXT`] when it
/// contains no visible character, so SMS and voice callers hear a definite
/// answer instead of silence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SayEmptyOutput;

impl ResultFilter for SayEmptyOutput {
    fn transform(&self, result: &mut CommandResult) -> Result<(), ProcessorError> {
        let has_visible = result
            .combined_output
            .chars()
            .any(|c| !c.is_whitespace() && !c.is_control());
        if !has_visible {
            result.combined_output = EMPTY_OUTPUT_TEXT.to_string();
        }
        Ok(())
    }
}

/// Mail the combined output of each processed command to the configured
/// recipients.
///
/// Delivery is detached from the request and never fails the result.
/// Unauthenticated probes (`PinAndShortcutNotFound`) are not worth a
/// notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyViaEmail {
    pub recipients: Vec<String>,
    pub mail_client: MailClient,
}

impl NotifyViaEmail {
    /// True only when all mail parameters are present.
    pub fn is_configured(&self) -> bool {
        !self.recipients.is_empty() && self.mail_client.is_configured()
    }
}

impl ResultFilter for NotifyViaEmail {
    fn transform(&self, result: &mut CommandResult) -> Result<(), ProcessorError> {
        if self.is_configured() && result.error != Some(ProcessorError::PinAndShortcutNotFound) {
            let subject = format!(
                "{}-notify-{}",
                OUTGOING_MAIL_SUBJECT_KEYWORD, result.command.content
            );
            self.mail_client.send_detached(
                subject,
                result.combined_output.clone(),
                self.recipients.clone(),
            );
        } else {
            debug!("skipping command notification");
        }
        Ok(())
    }
}
