//! Search inside AES-256-GCM encrypted notes without persisting plaintext.
//!
//! The operator keeps encrypted text files on disk (12-byte nonce followed
//! by the ciphertext) and sends the decryption key inside the command, so
//! the key never rests on the host. The command content is redacted from
//! logs via the sensitive-trigger list.

use std::collections::HashMap;
use std::path::PathBuf;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use serde::{Deserialize, Serialize};

use beacon_types::{Command, CommandResult, ProcessorError};

use crate::feature::{Feature, AES_DECRYPT_TRIGGER};

/// Length of the nonce prepended to each encrypted file.
const NONCE_LEN: usize = 12;

/// Configuration for the AES decryption feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AesDecryptConfig {
    /// Encrypted files by short name, as referenced in commands.
    pub files: HashMap<String, PathBuf>,
}

/// Decrypt a configured file and return the lines matching a search string.
///
/// Command syntax: `<name> <key-base64> <search>`.
pub struct AesDecrypt {
    config: AesDecryptConfig,
}

impl AesDecrypt {
    pub fn new(config: AesDecryptConfig) -> Self {
        Self { config }
    }

    fn decrypt_file(&self, name: &str, key_b64: &str) -> Result<String, ProcessorError> {
        let path = self
            .config
            .files
            .get(name)
            .ok_or_else(|| ProcessorError::feature(format!("no encrypted file named {name:?}")))?;
        let raw = std::fs::read(path)
            .map_err(|e| ProcessorError::feature(format!("cannot read {}: {e}", path.display())))?;
        if raw.len() <= NONCE_LEN {
            return Err(ProcessorError::feature(format!(
                "{} is too short to hold a nonce and ciphertext",
                path.display()
            )));
        }
        let key = base64::engine::general_purpose::STANDARD
            .decode(key_b64)
            .map_err(|e| ProcessorError::feature(format!("malformed key: {e}")))?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| ProcessorError::feature("key must be 32 bytes of base64"))?;
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| ProcessorError::feature("decryption failed, wrong key?"))?;
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}

impl Feature for AesDecrypt {
    fn trigger(&self) -> &'static str {
        AES_DECRYPT_TRIGGER
    }

    fn is_configured(&self) -> bool {
        !self.config.files.is_empty()
    }

    fn initialise(&mut self) -> Result<(), ProcessorError> {
        for (name, path) in &self.config.files {
            if !path.exists() {
                return Err(ProcessorError::bad_config(format!(
                    "encrypted file {name:?} does not exist at {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn self_test(&self) -> Result<(), ProcessorError> {
        for (name, path) in &self.config.files {
            std::fs::metadata(path).map_err(|e| {
                ProcessorError::feature(format!("encrypted file {name:?} is unreadable: {e}"))
            })?;
        }
        Ok(())
    }

    fn execute(&self, mut cmd: Command) -> CommandResult {
        if let Some(reject) = cmd.trim() {
            return reject;
        }
        let mut fields = cmd.content.splitn(3, char::is_whitespace);
        let (name, key_b64, search) = match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(key), Some(search)) if !search.trim().is_empty() => {
                (name, key, search.trim())
            }
            _ => {
                return CommandResult::from_error(ProcessorError::feature(
                    "usage: <name> <key-base64> <search>",
                ))
            }
        };
        let plaintext = match self.decrypt_file(name, key_b64) {
            Ok(text) => text,
            Err(err) => return CommandResult::from_error(err),
        };
        let matches: Vec<&str> = plaintext
            .lines()
            .filter(|line| line.contains(search))
            .collect();
        if matches.is_empty() {
            CommandResult::from_error(ProcessorError::feature(format!(
                "no line matches {search:?}"
            )))
        } else {
            CommandResult::with_output(matches.join("\n"))
        }
    }
}
