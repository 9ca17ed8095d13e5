//! Command extraction from inbound mail.
//!
//! The mail front feeds a whole message body to the processor; the PIN
//! filter matches per line, so the command may sit anywhere between the
//! usual preamble and signature noise. The combined output is mailed back
//! to the sender, and delivery failures are logged rather than raised.
//! Replies carry the outgoing subject keyword, and messages whose subject
//! already carries it are dropped so the daemon never converses with
//! itself.

use std::sync::Arc;

use tracing::{info, warn};

use beacon_inet::{MailClient, OUTGOING_MAIL_SUBJECT_KEYWORD};
use beacon_processor::CommandProcessor;
use beacon_types::Command;

use crate::ChannelError;

/// A parsed inbound mail message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMail {
    pub from_address: String,
    pub subject: String,
    pub body: String,
}

/// Split an RFC-2822-shaped message into the headers we care about and the
/// body. Header parsing is deliberately minimal: `From`/`Subject` by
/// case-insensitive prefix, body after the first blank line.
pub fn parse_message(raw: &str) -> InboundMail {
    let mut mail = InboundMail::default();
    let mut lines = raw.lines();
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        let lower = line.to_lowercase();
        if lower.starts_with("from:") {
            mail.from_address = extract_address(&line["from:".len()..]);
        } else if lower.starts_with("subject:") {
            mail.subject = line["subject:".len()..].trim().to_string();
        }
    }
    mail.body = lines.collect::<Vec<_>>().join("\n");
    mail
}

/// Pull the bare address out of `Display Name <addr@host>` or a bare
/// `addr@host`.
fn extract_address(field: &str) -> String {
    let field = field.trim();
    if let (Some(open), Some(close)) = (field.find('<'), field.rfind('>')) {
        if open < close {
            return field[open + 1..close].trim().to_string();
        }
    }
    field.to_string()
}

/// The mail front: runs commands found in inbound messages and mails the
/// output back.
pub struct MailCommandRunner {
    pub processor: Arc<CommandProcessor>,
    pub reply_client: MailClient,
    /// Timeout granted to mailed commands; mail is patient compared to
    /// SMS and voice.
    pub cmd_timeout_secs: u64,
}

impl MailCommandRunner {
    pub fn new(
        processor: Arc<CommandProcessor>,
        reply_client: MailClient,
        cmd_timeout_secs: u64,
    ) -> Self {
        Self {
            processor,
            reply_client,
            cmd_timeout_secs,
        }
    }

    /// Process one raw inbound message.
    ///
    /// Returns the combined output when a command ran, or `None` when the
    /// message was skipped (empty processor, reply loop, blank body, or
    /// failed authentication - the mail front conceals itself by simply
    /// not answering).
    pub fn process_mail(&self, raw_message: &str) -> Result<Option<String>, ChannelError> {
        if self.processor.is_empty() {
            return Ok(None);
        }
        let mail = parse_message(raw_message);
        if mail.subject.contains(OUTGOING_MAIL_SUBJECT_KEYWORD) {
            info!(subject = %mail.subject, "dropping own reply to avoid a mail loop");
            return Ok(None);
        }
        if mail.body.trim().is_empty() {
            return Ok(None);
        }

        let cmd = Command::new("mail", self.cmd_timeout_secs, mail.body.clone());
        let ret = self.processor.process(cmd, true);
        if ret.error == Some(beacon_types::ProcessorError::PinAndShortcutNotFound) {
            info!(from = %mail.from_address, "mailed command failed authentication, not answering");
            return Ok(None);
        }

        if mail.from_address.is_empty() {
            warn!("mailed command has no sender to reply to");
        } else if self.reply_client.is_configured() {
            let subject = format!("{OUTGOING_MAIL_SUBJECT_KEYWORD}-reply-{}", mail.subject);
            self.reply_client.send_detached(
                subject,
                ret.combined_output.clone(),
                vec![mail.from_address],
            );
        }
        Ok(Some(ret.combined_output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_processor::test_processor;

    const RAW: &str = "From: Operator <ops@example.com>\r\n\
Subject: weekly check\r\n\
Content-Type: text/plain\r\n\
\r\n\
hello daemon\r\n\
verysecret.s echo mail-works\r\n\
regards";

    fn runner() -> MailCommandRunner {
        MailCommandRunner::new(
            Arc::new(test_processor().unwrap()),
            MailClient::default(),
            120,
        )
    }

    #[test]
    fn parses_headers_and_body() {
        let mail = parse_message(RAW);
        assert_eq!(mail.from_address, "ops@example.com");
        assert_eq!(mail.subject, "weekly check");
        assert!(mail.body.contains("hello daemon"));
        assert!(mail.body.contains("regards"));
        assert!(!mail.body.contains("Content-Type"));
    }

    #[test]
    fn extracts_bare_addresses_too() {
        assert_eq!(extract_address(" ops@example.com "), "ops@example.com");
        assert_eq!(
            extract_address("\"Ops\" <ops@example.com>"),
            "ops@example.com"
        );
    }

    #[test]
    fn runs_the_command_line_within_the_body() {
        let output = runner().process_mail(RAW).unwrap();
        assert_eq!(output.as_deref(), Some("mail-works"));
    }

    #[test]
    fn skips_own_replies() {
        let raw = "From: d@example.com\nSubject: beacon-reply-weekly check\n\nverysecret.s echo hi";
        assert_eq!(runner().process_mail(raw).unwrap(), None);
    }

    #[test]
    fn conceals_failed_authentication() {
        let raw = "From: x@example.com\nSubject: probe\n\nwrongpin.s echo hi";
        assert_eq!(runner().process_mail(raw).unwrap(), None);
    }

    #[test]
    fn skips_blank_bodies() {
        let raw = "From: x@example.com\nSubject: empty\n\n   \n";
        assert_eq!(runner().process_mail(raw).unwrap(), None);
    }
}
