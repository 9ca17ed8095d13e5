//! Joke fetcher backed by two public HTTP joke APIs.

use rand::Rng;
use tracing::debug;

use beacon_inet::{fetch_blocking, HttpRequest, InetError};
use beacon_types::{Command, CommandResult, ProcessorError};

use crate::feature::{Feature, JOKE_TRIGGER};

const DAD_JOKE_URL: &str = "https://icanhazdadjoke.com/";
const CHUCK_NORRIS_URL: &str = "https://api.chucknorris.io/jokes/random";

/// Fetch a random joke. One source is picked at random; on failure the
/// other serves as fallback.
#[derive(Default)]
pub struct Joke;

impl Joke {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for Joke {
    fn trigger(&self) -> &'static str {
        JOKE_TRIGGER
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn initialise(&mut self) -> Result<(), ProcessorError> {
        Ok(())
    }

    fn self_test(&self) -> Result<(), ProcessorError> {
        get_dad_joke(10)
            .map(|_| ())
            .map_err(|e| ProcessorError::feature(format!("joke source is unreachable: {e}")))
    }

    fn execute(&self, cmd: Command) -> CommandResult {
        let timeout_secs = cmd.timeout_secs.max(1);
        let sources: [fn(u64) -> Result<String, InetError>; 2] = if rand::thread_rng().gen() {
            [get_dad_joke, get_chuck_norris_joke]
        } else {
            [get_chuck_norris_joke, get_dad_joke]
        };
        let mut last_err = None;
        for source in sources {
            match source(timeout_secs) {
                Ok(joke) if !joke.is_empty() => return CommandResult::with_output(joke),
                Ok(_) => last_err = Some("joke source returned an empty response".to_string()),
                Err(err) => {
                    debug!(error = %err, "joke source failed, trying the next");
                    last_err = Some(err.to_string());
                }
            }
        }
        CommandResult::from_error(ProcessorError::feature(format!(
            "no joke for you: {}",
            last_err.unwrap_or_default()
        )))
    }
}

fn get_dad_joke(timeout_secs: u64) -> Result<String, InetError> {
    let req = HttpRequest::get(timeout_secs).header("Accept", "text/plain");
    let resp = fetch_blocking(req, DAD_JOKE_URL)?;
    resp.non_2xx_to_error()?;
    Ok(resp.text().trim().to_string())
}

fn get_chuck_norris_joke(timeout_secs: u64) -> Result<String, InetError> {
    let resp = fetch_blocking(HttpRequest::get(timeout_secs), CHUCK_NORRIS_URL)?;
    resp.non_2xx_to_error()?;
    let parsed: serde_json::Value = serde_json::from_slice(&resp.body)
        .map_err(|e| InetError::Other(format!("malformed joke response: {e}")))?;
    let joke = parsed
        .get("value")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Ok(joke.trim().to_string())
}
