//! Outbound mail delivery through an HTTP mail API.
//!
//! The client posts a form (`from`, `to`, `subject`, `text`) to a
//! Mailgun-style message endpoint with bearer authentication. Notification
//! delivery is fire-and-forget: [`MailClient::send_detached`] hands the
//! message to a background thread and logs failures instead of raising them.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::http::{fetch_blocking, HttpRequest};
use crate::InetError;

/// Fixed keyword carried in the subject of every outgoing message. Mail
/// ingestion checks for it to avoid processing the daemon's own replies.
pub const OUTGOING_MAIL_SUBJECT_KEYWORD: &str = "beacon";

/// Timeout for a single delivery attempt.
const SEND_TIMEOUT_SECS: u64 = 30;

/// Client for an HTTP mail API endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailClient {
    /// Message endpoint URL, e.g. `https://api.mailgun.net/v3/example.com/messages`.
    pub api_url: String,
    /// Bearer token or API key sent in the Authorization header.
    pub auth_token: String,
    /// Sender address placed in the `from` field.
    pub from_address: String,
}

impl MailClient {
    /// True only when every parameter needed for delivery is present.
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.from_address.is_empty()
    }

    /// Deliver a message to all recipients, blocking until the API responds.
    pub fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), InetError> {
        if !self.is_configured() {
            return Err(InetError::MailNotConfigured);
        }
        if recipients.is_empty() {
            return Err(InetError::Other("no mail recipients".to_string()));
        }
        let to = recipients.join(",");
        let form = form_urlencoded::Serializer::new(String::new())
            .extend_pairs([
                ("from", self.from_address.as_str()),
                ("to", to.as_str()),
                ("subject", subject),
                ("text", body),
            ])
            .finish();
        let mut req = HttpRequest::post(SEND_TIMEOUT_SECS, form);
        if !self.auth_token.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.auth_token));
        }
        let resp = fetch_blocking(req, &self.api_url)?;
        resp.non_2xx_to_error()?;
        debug!(recipients = recipients.len(), subject, "mail delivered");
        Ok(())
    }

    /// Deliver a message on a background thread, logging any failure.
    ///
    /// The message content is moved into the thread; nothing request-scoped
    /// is retained by the caller.
    pub fn send_detached(&self, subject: String, body: String, recipients: Vec<String>) {
        let client = self.clone();
        std::thread::spawn(move || {
            if let Err(err) = client.send(&subject, &body, &recipients) {
                warn!(subject, error = %err, "failed to deliver mail");
            }
        });
    }

    /// Check that the mail API host is reachable.
    pub fn self_test(&self) -> Result<(), InetError> {
        if !self.is_configured() {
            return Err(InetError::MailNotConfigured);
        }
        let parsed = url::Url::parse(&self.api_url)
            .map_err(|e| InetError::Other(format!("malformed mail API URL: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| InetError::Other("mail API URL has no host".to_string()))?;
        let port = parsed.port_or_known_default().unwrap_or(443);
        let addr = format!("{host}:{port}");
        let mut last_err = InetError::Other(format!("no address resolved for {addr}"));
        let addrs = addr
            .to_socket_addrs()
            .map_err(|e| InetError::Other(format!("failed to resolve {addr}: {e}")))?;
        for resolved in addrs {
            match TcpStream::connect_timeout(&resolved, Duration::from_secs(10)) {
                Ok(_) => return Ok(()),
                Err(e) => last_err = InetError::Other(format!("cannot reach {addr}: {e}")),
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_requires_url_and_sender() {
        let mut client = MailClient::default();
        assert!(!client.is_configured());

        client.api_url = "https://api.mailgun.net/v3/example.com/messages".to_string();
        assert!(!client.is_configured());

        client.from_address = "beacon@example.com".to_string();
        assert!(client.is_configured());
    }

    #[test]
    fn unconfigured_client_refuses_to_send() {
        let client = MailClient::default();
        let err = client
            .send("subject", "body", &["ops@example.com".to_string()])
            .unwrap_err();
        assert!(matches!(err, InetError::MailNotConfigured));
    }

    #[test]
    fn self_test_rejects_malformed_url() {
        let client = MailClient {
            api_url: "not a url".to_string(),
            auth_token: String::new(),
            from_address: "beacon@example.com".to_string(),
        };
        assert!(client.self_test().is_err());
    }
}
