//! Outbound Internet plumbing shared by toolbox features and front-ends.
//!
//! - [`http`]: a small request helper around `reqwest`, with a blocking
//!   variant that synchronous feature code can call from inside or outside
//!   a tokio runtime.
//! - [`mail`]: delivery of notification and reply mail through an HTTP mail
//!   API endpoint.

pub mod http;
pub mod mail;

pub use http::{fetch, fetch_blocking, HttpRequest, HttpResponse};
pub use mail::{MailClient, OUTGOING_MAIL_SUBJECT_KEYWORD};

/// Errors from outbound HTTP and mail operations.
#[derive(Debug, thiserror::Error)]
pub enum InetError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("mail client is not configured")]
    MailNotConfigured,

    #[error("{0}")]
    Other(String),
}
