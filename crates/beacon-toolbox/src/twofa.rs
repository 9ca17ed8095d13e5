//! Time-based one-time password (TOTP) code generator.
//!
//! Computes RFC 6238 codes (HMAC-SHA1, 30 second step, 6 digits) for
//! accounts configured with base64-encoded shared secrets. The previous,
//! current, and next codes are returned together so a slightly skewed
//! clock on either side still yields a usable code.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use beacon_types::{Command, CommandResult, ProcessorError};

use crate::feature::{Feature, TWO_FA_TRIGGER};

type HmacSha1 = Hmac<Sha1>;

/// TOTP time step in seconds.
const TIME_STEP_SECS: u64 = 30;

/// Configuration for the two-factor code generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoFAConfig {
    /// Base64-encoded shared secrets by account name.
    pub accounts: HashMap<String, String>,
}

/// Generate previous/current/next TOTP codes for a configured account.
///
/// Command syntax: `<account>`. The account names double as secrets-adjacent
/// data, so the command content is redacted from logs via the
/// sensitive-trigger list.
pub struct TwoFACodeGenerator {
    config: TwoFAConfig,
}

impl TwoFACodeGenerator {
    pub fn new(config: TwoFAConfig) -> Self {
        Self { config }
    }
}

impl Feature for TwoFACodeGenerator {
    fn trigger(&self) -> &'static str {
        TWO_FA_TRIGGER
    }

    fn is_configured(&self) -> bool {
        !self.config.accounts.is_empty()
    }

    fn initialise(&mut self) -> Result<(), ProcessorError> {
        for (account, secret_b64) in &self.config.accounts {
            base64::engine::general_purpose::STANDARD
                .decode(secret_b64)
                .map_err(|e| {
                    ProcessorError::bad_config(format!(
                        "2FA secret for account {account:?} is not valid base64: {e}"
                    ))
                })?;
        }
        Ok(())
    }

    fn self_test(&self) -> Result<(), ProcessorError> {
        // The clock is the only runtime dependency.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|_| ())
            .map_err(|e| ProcessorError::feature(format!("system clock is broken: {e}")))
    }

    fn execute(&self, mut cmd: Command) -> CommandResult {
        if let Some(reject) = cmd.trim() {
            return reject;
        }
        let account = cmd.content.trim();
        let secret_b64 = match self.config.accounts.get(account) {
            Some(secret) => secret,
            None => {
                return CommandResult::from_error(ProcessorError::feature(format!(
                    "no 2FA account named {account:?}"
                )))
            }
        };
        let secret = match base64::engine::general_purpose::STANDARD.decode(secret_b64) {
            Ok(secret) => secret,
            Err(e) => {
                return CommandResult::from_error(ProcessorError::feature(format!(
                    "stored secret is not valid base64: {e}"
                )))
            }
        };
        let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(now) => now.as_secs(),
            Err(e) => {
                return CommandResult::from_error(ProcessorError::feature(format!(
                    "system clock is broken: {e}"
                )))
            }
        };
        match codes_around(&secret, now) {
            Ok([previous, current, next]) => {
                CommandResult::with_output(format!("{previous} {current} {next}"))
            }
            Err(err) => CommandResult::from_error(err),
        }
    }
}

/// Codes for the previous, current, and next time step.
fn codes_around(secret: &[u8], unix_secs: u64) -> Result<[String; 3], ProcessorError> {
    Ok([
        totp_code(secret, unix_secs.saturating_sub(TIME_STEP_SECS))?,
        totp_code(secret, unix_secs)?,
        totp_code(secret, unix_secs + TIME_STEP_SECS)?,
    ])
}

/// RFC 6238 TOTP: HMAC-SHA1 over the big-endian step counter, dynamic
/// truncation, six decimal digits.
fn totp_code(secret: &[u8], unix_secs: u64) -> Result<String, ProcessorError> {
    let counter = unix_secs / TIME_STEP_SECS;
    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|_| ProcessorError::feature("2FA secret is empty"))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    Ok(format!("{:06}", binary % 1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 6238 appendix B reference secret.
    const RFC_SECRET: &[u8] = b"12345678901234567890";

    fn generator_with(account: &str, secret: &[u8]) -> TwoFACodeGenerator {
        let mut accounts = HashMap::new();
        accounts.insert(
            account.to_string(),
            base64::engine::general_purpose::STANDARD.encode(secret),
        );
        let mut generator = TwoFACodeGenerator::new(TwoFAConfig { accounts });
        assert!(generator.is_configured());
        generator.initialise().unwrap();
        generator
    }

    #[test]
    fn matches_rfc_6238_reference_vectors() {
        // Appendix B lists 8-digit codes; the trailing six digits are the
        // 6-digit codes.
        assert_eq!(totp_code(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(totp_code(RFC_SECRET, 1111111109).unwrap(), "081804");
        assert_eq!(totp_code(RFC_SECRET, 1234567890).unwrap(), "005924");
        assert_eq!(totp_code(RFC_SECRET, 2000000000).unwrap(), "279037");
    }

    #[test]
    fn codes_are_stable_within_a_step() {
        assert_eq!(
            totp_code(RFC_SECRET, 30).unwrap(),
            totp_code(RFC_SECRET, 59).unwrap()
        );
        assert_ne!(
            totp_code(RFC_SECRET, 59).unwrap(),
            totp_code(RFC_SECRET, 60).unwrap()
        );
    }

    #[test]
    fn execute_returns_three_codes() {
        let generator = generator_with("github", RFC_SECRET);
        let ret = generator.execute(Command::new("test", 10, "github"));
        assert!(ret.error.is_none(), "unexpected error: {:?}", ret.error);
        let codes: Vec<&str> = ret.output.split(' ').collect();
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| c.len() == 6));
    }

    #[test]
    fn unknown_account_is_an_error() {
        let generator = generator_with("github", RFC_SECRET);
        let ret = generator.execute(Command::new("test", 10, "gitlab"));
        assert!(ret.error.unwrap().to_string().contains("gitlab"));
    }

    #[test]
    fn initialise_rejects_malformed_secret() {
        let mut accounts = HashMap::new();
        accounts.insert("bad".to_string(), "!!!not-base64!!!".to_string());
        let mut generator = TwoFACodeGenerator::new(TwoFAConfig { accounts });
        assert!(generator.initialise().is_err());
    }

    #[test]
    fn unconfigured_without_accounts() {
        assert!(!TwoFACodeGenerator::new(TwoFAConfig::default()).is_configured());
    }
}
