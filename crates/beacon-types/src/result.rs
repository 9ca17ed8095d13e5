//! The outcome of dispatching a command.

use crate::command::Command;
use crate::error::ProcessorError;

/// Result of running a command through filters and a toolbox feature.
///
/// Result filters rewrite [`combined_output`](Self::combined_output) further
/// after [`reset_combined_text`](Self::reset_combined_text) has produced the
/// initial rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// The post-filter command that produced this result, for log correlation.
    pub command: Command,
    /// Raw feature output.
    pub output: String,
    /// The pipeline or feature error, if any.
    pub error: Option<ProcessorError>,
    /// The customer-visible rendering of error and output.
    pub combined_output: String,
}

impl CommandResult {
    /// A result that carries only an error.
    pub fn from_error(error: ProcessorError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// A successful result with raw feature output.
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Recompute the combined text as `"error|output"` when an error is
    /// present, else the output alone.
    pub fn reset_combined_text(&mut self) {
        self.combined_output = String::new();
        if let Some(err) = &self.error {
            self.combined_output.push_str(&err.to_string());
            self.combined_output.push('|');
        }
        self.combined_output.push_str(&self.output);
    }
}
