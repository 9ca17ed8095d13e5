//! Front-end adapters between untrusted wire input and the command
//! processor.
//!
//! Every front constructs a [`Command`](beacon_types::Command) from its wire
//! format, hands it to the shared
//! [`CommandProcessor`](beacon_processor::CommandProcessor), and renders the
//! result back out. Fronts refuse to start with a configuration that fails
//! the Internet sanity check, and conceal the endpoint when authentication
//! fails.
//!
//! - [`httpd`]: the axum HTTP daemon mounting the generic command endpoint,
//!   the Twilio SMS/voice hooks, and the feature self-test endpoint.
//! - [`twilio`]: TwiML rendering and webhook signature validation.
//! - [`dtmf`]: telephone-keypad decoding of voice-call digit input.
//! - [`mailcmd`]: command extraction from inbound mail, with mailed replies.
//! - [`config`]: the top-level TOML configuration and processor assembly.

pub mod config;
pub mod dtmf;
pub mod httpd;
pub mod mailcmd;
pub mod twilio;

pub use config::BeaconConfig;
pub use httpd::HttpDaemon;
pub use mailcmd::MailCommandRunner;

/// Errors raised while running a front-end.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("refusing to serve an insane processor: {0}")]
    InsaneProcessor(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
