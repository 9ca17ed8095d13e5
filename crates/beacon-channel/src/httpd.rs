//! The HTTP front: generic command endpoint, Twilio hooks, self test.
//!
//! Handlers hand commands to the synchronous processor via
//! `spawn_blocking`, so a slow shell command never stalls the async
//! runtime. On `PinAndShortcutNotFound` every handler conceals the
//! endpoint: the generic endpoint and the SMS hook answer with a plain
//! 404 page, the voice hook apologises and hangs up.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use beacon_processor::CommandProcessor;
use beacon_types::{Command, ProcessorError};

use crate::dtmf;
use crate::twilio;
use crate::ChannelError;

/// Response body of a feature self test that all went OK.
pub const FEATURE_SELF_TEST_OK: &str = "All OK";

/// Body of the concealment response for failed authentication.
const NOT_FOUND_BODY: &str = "404 page not found";

/// HTTP front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address to bind.
    pub listen_address: String,
    /// Port to bind.
    pub port: u16,
    /// Timeout granted to commands arriving over the generic endpoint and
    /// mail ingestion.
    pub cmd_timeout_secs: u64,
    /// Message spoken when a voice call is picked up.
    pub call_greeting: String,
    /// Path of the voice-call DTMF callback endpoint.
    pub call_callback_endpoint: String,
    /// Twilio auth token for webhook signature validation; empty disables
    /// the check.
    pub twilio_auth_token: String,
    /// Public base URL of this daemon, as Twilio sees it; needed to
    /// reconstruct the signed URL behind a reverse proxy.
    pub public_base_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 8080,
            cmd_timeout_secs: 120,
            call_greeting: "Please enter your command after the beep".to_string(),
            call_callback_endpoint: "/call/command".to_string(),
            twilio_auth_token: String::new(),
            public_base_url: String::new(),
        }
    }
}

/// The HTTP daemon serving all web-facing fronts.
pub struct HttpDaemon {
    pub config: HttpConfig,
    pub processor: Arc<CommandProcessor>,
}

struct AppState {
    config: HttpConfig,
    processor: Arc<CommandProcessor>,
}

impl HttpDaemon {
    pub fn new(config: HttpConfig, processor: Arc<CommandProcessor>) -> Self {
        Self { config, processor }
    }

    /// Build the router with all endpoints mounted.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            processor: Arc::clone(&self.processor),
        });
        Router::new()
            .route("/cmd", post(handle_generic_command))
            .route("/sms", post(handle_sms_hook))
            .route("/call/greeting", post(handle_call_greeting))
            .route("/call/command", post(handle_call_command))
            .route("/self_test", get(handle_self_test))
            .with_state(state)
    }

    /// Bind and serve until the process exits.
    ///
    /// Refuses to start when the processor fails the Internet sanity
    /// check; an empty processor is tolerated (its command endpoints
    /// conceal themselves).
    pub async fn start_and_block(self) -> Result<(), ChannelError> {
        if !self.processor.is_empty() {
            let errs = self.processor.is_sane_for_internet();
            if !errs.is_empty() {
                let joined = errs
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ChannelError::InsaneProcessor(joined));
            }
        }
        let addr: SocketAddr = format!("{}:{}", self.config.listen_address, self.config.port)
            .parse()
            .map_err(|e| ChannelError::Config(format!("bad listen address: {e}")))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "HTTP daemon listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Run a command on the blocking pool and return its result.
async fn process_command(
    state: &Arc<AppState>,
    daemon_name: &str,
    timeout_secs: u64,
    content: String,
) -> beacon_types::CommandResult {
    let processor = Arc::clone(&state.processor);
    let cmd = Command::new(daemon_name, timeout_secs, content);
    tokio::task::spawn_blocking(move || processor.process(cmd, true))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "command task failed");
            beacon_types::CommandResult::from_error(ProcessorError::feature(
                "command task failed",
            ))
        })
}

fn pin_mismatch(ret: &beacon_types::CommandResult) -> bool {
    ret.error == Some(ProcessorError::PinAndShortcutNotFound)
}

/// Reject Twilio-shaped requests with bad or missing signatures when an
/// auth token is configured. Returns `None` when the request may proceed.
fn reject_bad_signature(
    state: &AppState,
    endpoint: &str,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Option<Response> {
    if state.config.twilio_auth_token.is_empty() {
        return None;
    }
    let url = format!("{}{}", state.config.public_base_url, endpoint);
    let provided = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if twilio::validate_signature(&state.config.twilio_auth_token, &url, params, provided) {
        None
    } else {
        warn!(endpoint, "rejecting request with bad Twilio signature");
        Some((StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response())
    }
}

fn xml_response(body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/xml"),
            (header::CACHE_CONTROL, "must-revalidate"),
        ],
        body,
    )
        .into_response()
}

/// `POST /cmd`: the whole body is the command, the reply is plain text.
async fn handle_generic_command(State(state): State<Arc<AppState>>, body: String) -> Response {
    if state.processor.is_empty() {
        return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
    }
    let timeout = state.config.cmd_timeout_secs;
    let ret = process_command(&state, "httpd", timeout, body).await;
    if pin_mismatch(&ret) {
        return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
    }
    ret.combined_output.into_response()
}

/// `POST /sms`: Twilio SMS hook, the message text arrives in `Body`.
async fn handle_sms_hook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if state.processor.is_empty() {
        return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
    }
    if let Some(reject) = reject_bad_signature(&state, "/sms", &headers, &params) {
        return reject;
    }
    let body = params.get("Body").cloned().unwrap_or_default();
    let ret = process_command(
        &state,
        "sms",
        twilio::TWILIO_HANDLER_TIMEOUT_SECS,
        body,
    )
    .await;
    if pin_mismatch(&ret) {
        return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
    }
    xml_response(twilio::sms_response(&ret.combined_output))
}

/// `POST /call/greeting`: ask the caller for DTMF input.
async fn handle_call_greeting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if let Some(reject) = reject_bad_signature(&state, "/call/greeting", &headers, &params) {
        return reject;
    }
    xml_response(twilio::call_greeting_response(
        &state.config.call_greeting,
        &state.config.call_callback_endpoint,
    ))
}

/// `POST /call/command`: DTMF digits arrive in `Digits`.
async fn handle_call_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if state.processor.is_empty() {
        return xml_response(twilio::call_hangup_response());
    }
    let endpoint = state.config.call_callback_endpoint.clone();
    if let Some(reject) = reject_bad_signature(&state, &endpoint, &headers, &params) {
        return reject;
    }
    let digits = params.get("Digits").cloned().unwrap_or_default();
    let decoded = dtmf::decode(&digits);
    let ret = process_command(
        &state,
        "voice",
        twilio::TWILIO_HANDLER_TIMEOUT_SECS,
        decoded,
    )
    .await;
    if pin_mismatch(&ret) {
        // Say sorry and hang up instead of confirming the endpoint exists.
        return xml_response(twilio::call_hangup_response());
    }
    xml_response(twilio::call_output_response(
        &ret.combined_output,
        &endpoint,
    ))
}

/// `GET /self_test`: run every feature's self test.
async fn handle_self_test(State(state): State<Arc<AppState>>) -> Response {
    let processor = Arc::clone(&state.processor);
    let failures = tokio::task::spawn_blocking(move || processor.features.self_test())
        .await
        .unwrap_or_default();
    if failures.is_empty() {
        FEATURE_SELF_TEST_OK.into_response()
    } else {
        let mut lines = String::new();
        for (trigger, err) in failures {
            lines.push_str(&format!("{trigger}: {err}\n"));
        }
        (StatusCode::INTERNAL_SERVER_ERROR, lines).into_response()
    }
}
