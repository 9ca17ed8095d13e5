//! Top-level TOML configuration and processor assembly.

use serde::{Deserialize, Serialize};

use beacon_inet::MailClient;
use beacon_processor::filter::{
    CommandFilter, LintText, NotifyViaEmail, PinAndShortcuts, ResultFilter, SayEmptyOutput,
    TranslateSequences,
};
use beacon_processor::CommandProcessor;
use beacon_toolbox::{FeatureSet, ToolboxConfig};
use beacon_types::ProcessorError;

use crate::httpd::HttpConfig;

/// Everything a Beacon deployment reads from `beacon.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Approximate ceiling of commands processed per second; zero means
    /// the hard limit.
    pub max_cmd_per_sec: usize,
    /// PIN and shortcut authentication.
    pub pin: PinAndShortcuts,
    /// Literal sequence replacements applied after authentication.
    pub translate: TranslateSequences,
    /// Output linting applied to every result.
    pub lint: LintText,
    /// Recipients of per-command notification mail; empty disables it.
    pub notify_recipients: Vec<String>,
    /// Outbound mail client for notifications and mailed replies.
    pub mail: MailClient,
    /// HTTP front-end settings.
    pub http: HttpConfig,
    /// Toolbox feature configuration.
    pub toolbox: ToolboxConfig,
}

impl BeaconConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ProcessorError> {
        toml::from_str(content).map_err(|e| ProcessorError::bad_config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ProcessorError> {
        toml::to_string_pretty(self).map_err(|e| ProcessorError::bad_config(e.to_string()))
    }

    /// Assemble the command processor this configuration describes, with
    /// all configured toolbox features initialised.
    pub fn build_processor(&self) -> Result<CommandProcessor, ProcessorError> {
        let mut features = FeatureSet::standard(&self.toolbox);
        features.initialise()?;

        let mut command_filters: Vec<Box<dyn CommandFilter>> =
            vec![Box::new(self.pin.clone())];
        if !self.translate.sequences.is_empty() {
            command_filters.push(Box::new(self.translate.clone()));
        }

        let result_filters: Vec<Box<dyn ResultFilter>> = vec![
            Box::new(self.lint.clone()),
            Box::new(SayEmptyOutput),
            Box::new(NotifyViaEmail {
                recipients: self.notify_recipients.clone(),
                mail_client: self.mail.clone(),
            }),
        ];

        Ok(CommandProcessor::new(
            features,
            command_filters,
            result_filters,
            self.max_cmd_per_sec,
        ))
    }
}
