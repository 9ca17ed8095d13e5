//! TwiML rendering and Twilio webhook request validation.

use std::collections::HashMap;

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Response deadline Twilio imposes on both SMS and call hooks; command
/// timeouts stay below it so the reply always makes it out.
pub const TWILIO_HANDLER_TIMEOUT_SECS: u64 = 14;

/// Escape a string for use as XML element data.
pub fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// TwiML reply carrying an SMS message body.
pub fn sms_response(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response><Message>{}</Message></Response>\n",
        xml_escape(message)
    )
}

/// TwiML greeting that speaks a message and gathers DTMF input into the
/// callback endpoint.
pub fn call_greeting_response(greeting: &str, callback_endpoint: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n    \
         <Gather action=\"{}\" method=\"POST\" timeout=\"30\" finishOnKey=\"#\" numDigits=\"1000\">\n        \
         <Say>{}</Say>\n    \
         </Gather>\n</Response>\n",
        xml_escape(callback_endpoint),
        xml_escape(greeting)
    )
}

/// TwiML that apologises and hangs up; used to conceal the endpoint from
/// callers who fail authentication.
pub fn call_hangup_response() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
     <Response>\n    <Say>Sorry</Say>\n    <Hangup/>\n</Response>\n"
        .to_string()
}

/// TwiML that repeats the command output three times, then gathers the
/// next command. Spoken output over a noisy line deserves the repetition.
pub fn call_output_response(output: &str, callback_endpoint: &str) -> String {
    let spoken = xml_escape(output);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n    \
         <Gather action=\"{}\" method=\"POST\" timeout=\"30\" finishOnKey=\"#\" numDigits=\"1000\">\n        \
         <Say>{spoken}, repeat again, {spoken}, repeat again, {spoken}, over.</Say>\n    \
         </Gather>\n</Response>\n",
        xml_escape(callback_endpoint)
    )
}

/// Validate the `X-Twilio-Signature` header of a webhook request.
///
/// The expected signature is HMAC-SHA1 over the full request URL followed
/// by every POST parameter name and value in lexical order, base64-encoded.
/// The comparison is constant-time so the signature cannot be guessed
/// byte by byte.
pub fn validate_signature(
    auth_token: &str,
    url: &str,
    params: &HashMap<String, String>,
    provided_signature: &str,
) -> bool {
    let mut payload = url.to_string();
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    for key in keys {
        payload.push_str(key);
        payload.push_str(&params[key]);
    }

    let mut mac = match HmacSha1::new_from_slice(auth_token.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided_signature.as_bytes();
    if expected_bytes.len() != provided_bytes.len() {
        // Burn the same comparison time on a length mismatch.
        let _ = expected_bytes.ct_eq(expected_bytes);
        return false;
    }
    expected_bytes.ct_eq(provided_bytes).into()
}
