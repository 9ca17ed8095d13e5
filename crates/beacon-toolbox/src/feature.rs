//! The feature contract and the trigger-keyed registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use beacon_types::{Command, CommandResult, ProcessorError};

use crate::aescrypt::{AesDecrypt, AesDecryptConfig};
use crate::envinfo::EnvInfo;
use crate::joke::Joke;
use crate::shell::{Shell, ShellConfig};
use crate::twofa::{TwoFACodeGenerator, TwoFAConfig};

/// Trigger prefix of the shell execution feature.
pub const SHELL_TRIGGER: &str = ".s";
/// Trigger prefix of the environment inspection feature.
pub const ENV_INFO_TRIGGER: &str = ".e";
/// Trigger prefix of the joke fetcher.
pub const JOKE_TRIGGER: &str = ".j";
/// Trigger prefix of the AES decryption feature.
pub const AES_DECRYPT_TRIGGER: &str = ".a";
/// Trigger prefix of the two-factor code generator.
pub const TWO_FA_TRIGGER: &str = ".2";

/// Triggers whose command content must never reach a log line: the content
/// carries decryption keys or names 2FA accounts. The command processor
/// consults this list instead of hard-coding feature knowledge.
pub const SENSITIVE_TRIGGERS: &[&str] = &[AES_DECRYPT_TRIGGER, TWO_FA_TRIGGER];

/// Uniform contract every toolbox feature implements.
///
/// Features are registered in a [`FeatureSet`]; only features whose
/// `is_configured` returns true are initialised and made reachable by
/// trigger.
pub trait Feature: Send + Sync {
    /// The registry key: a short opaque prefix such as `.s`.
    fn trigger(&self) -> &'static str;

    /// Whether the feature has enough configuration to be useful.
    fn is_configured(&self) -> bool;

    /// One-shot setup, run once before the feature serves commands.
    fn initialise(&mut self) -> Result<(), ProcessorError>;

    /// Live health check; may hit the network.
    fn self_test(&self) -> Result<(), ProcessorError>;

    /// Perform the work, honouring `cmd.timeout_secs`.
    fn execute(&self, cmd: Command) -> CommandResult;
}

/// Configuration for all optional toolbox features.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolboxConfig {
    pub shell: ShellConfig,
    pub aes_decrypt: AesDecryptConfig,
    pub two_fa: TwoFAConfig,
}

/// Registry of initialised features, looked up by trigger prefix.
///
/// Registration order is preserved; trigger lookup walks the registry in
/// that order and the first matching prefix wins.
#[derive(Default)]
pub struct FeatureSet {
    /// Registered but not yet initialised features.
    candidates: Vec<Box<dyn Feature>>,
    /// Configured and initialised features, in registration order.
    active: Vec<(&'static str, Arc<dyn Feature>)>,
}

impl FeatureSet {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the standard feature line-up for this config.
    pub fn standard(config: &ToolboxConfig) -> Self {
        let mut set = Self::new();
        set.register(Box::new(Shell::new(config.shell.clone())));
        set.register(Box::new(EnvInfo::new()));
        set.register(Box::new(Joke::new()));
        set.register(Box::new(AesDecrypt::new(config.aes_decrypt.clone())));
        set.register(Box::new(TwoFACodeGenerator::new(config.two_fa.clone())));
        set
    }

    /// Add a feature candidate. It only becomes reachable after
    /// [`initialise`](Self::initialise) finds it configured.
    pub fn register(&mut self, feature: Box<dyn Feature>) {
        self.candidates.push(feature);
    }

    /// Initialise every configured candidate, in registration order.
    ///
    /// Unconfigured candidates are skipped silently; a failing
    /// initialisation aborts with its error.
    pub fn initialise(&mut self) -> Result<(), ProcessorError> {
        for mut feature in self.candidates.drain(..) {
            let trigger = feature.trigger();
            if !feature.is_configured() {
                debug!(trigger, "skipping unconfigured feature");
                continue;
            }
            feature.initialise()?;
            self.active.push((trigger, Arc::from(feature)));
        }
        info!(features = self.active.len(), "toolbox initialised");
        Ok(())
    }

    /// Iterate `(trigger, feature)` pairs in registration order.
    pub fn lookup_by_trigger(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Feature>)> {
        self.active.iter().map(|(t, f)| (*t, f))
    }

    /// Number of initialised features.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no feature is initialised.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Triggers of all initialised features.
    pub fn triggers(&self) -> Vec<&'static str> {
        self.active.iter().map(|(t, _)| *t).collect()
    }

    /// Run every initialised feature's self test and aggregate failures
    /// into a trigger-to-error map. An empty map means all passed.
    pub fn self_test(&self) -> HashMap<&'static str, ProcessorError> {
        let mut failures = HashMap::new();
        for (trigger, feature) in &self.active {
            if let Err(err) = feature.self_test() {
                failures.insert(*trigger, err);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeFeature {
        trigger: &'static str,
        configured: bool,
    }

    impl Feature for FakeFeature {
        fn trigger(&self) -> &'static str {
            self.trigger
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        fn initialise(&mut self) -> Result<(), ProcessorError> {
            Ok(())
        }
        fn self_test(&self) -> Result<(), ProcessorError> {
            if self.trigger == ".bad" {
                Err(ProcessorError::feature("self test failed"))
            } else {
                Ok(())
            }
        }
        fn execute(&self, _cmd: Command) -> CommandResult {
            CommandResult::with_output("fake")
        }
    }

    #[test]
    fn unconfigured_features_are_excluded() {
        let mut set = FeatureSet::new();
        set.register(Box::new(FakeFeature {
            trigger: ".x",
            configured: true,
        }));
        set.register(Box::new(FakeFeature {
            trigger: ".y",
            configured: false,
        }));
        set.initialise().unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.triggers(), vec![".x"]);
    }

    #[test]
    fn lookup_preserves_registration_order() {
        let mut set = FeatureSet::new();
        for trigger in [".c", ".a", ".b"] {
            set.register(Box::new(FakeFeature {
                trigger,
                configured: true,
            }));
        }
        set.initialise().unwrap();

        let order: Vec<&str> = set.lookup_by_trigger().map(|(t, _)| t).collect();
        assert_eq!(order, vec![".c", ".a", ".b"]);
    }

    #[test]
    fn self_test_aggregates_failures_by_trigger() {
        let mut set = FeatureSet::new();
        set.register(Box::new(FakeFeature {
            trigger: ".ok",
            configured: true,
        }));
        set.register(Box::new(FakeFeature {
            trigger: ".bad",
            configured: true,
        }));
        set.initialise().unwrap();

        let failures = set.self_test();
        assert_eq!(failures.len(), 1);
        assert!(failures.contains_key(".bad"));
    }

    #[test]
    fn standard_set_initialises_zero_config_features() {
        let mut set = FeatureSet::standard(&ToolboxConfig::default());
        set.initialise().unwrap();
        // Shell, environment, and joke work without configuration; the AES
        // and 2FA features need secrets and stay out.
        assert!(set.triggers().contains(&SHELL_TRIGGER));
        assert!(set.triggers().contains(&ENV_INFO_TRIGGER));
        assert!(set.triggers().contains(&JOKE_TRIGGER));
        assert!(!set.triggers().contains(&AES_DECRYPT_TRIGGER));
        assert!(!set.triggers().contains(&TWO_FA_TRIGGER));
    }

    #[test]
    fn sensitive_triggers_cover_key_bearing_features() {
        assert!(SENSITIVE_TRIGGERS.contains(&AES_DECRYPT_TRIGGER));
        assert!(SENSITIVE_TRIGGERS.contains(&TWO_FA_TRIGGER));
        assert!(!SENSITIVE_TRIGGERS.contains(&SHELL_TRIGGER));
    }
}
