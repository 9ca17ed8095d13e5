//! Composable transformations over commands and results.
//!
//! Command filters run before feature dispatch and rewrite the command by
//! value; the first disapproving filter aborts the pipeline with its error.
//! Result filters run after dispatch and rewrite the result in place; they
//! may have side effects (the mail notifier enqueues delivery).
//!
//! Third-party filters plug in through the two traits. The narrow
//! `as_pin` / `as_lint` accessors exist because the processor needs to
//! recognise those two filters among the chain: the PIN filter drives the
//! emptiness and sanity checks, and the text linter is the target of the
//! `.plt` override.

mod command;
mod result;

pub use command::{PinAndShortcuts, TranslateSequences};
pub use result::{LintText, NotifyViaEmail, SayEmptyOutput, EMPTY_OUTPUT_TEXT};

use beacon_types::{Command, CommandResult, ProcessorError};

/// A pure transformation of a command, applied before feature dispatch.
pub trait CommandFilter: Send + Sync {
    /// Transform the command, or reject it with an error.
    fn transform(&self, cmd: Command) -> Result<Command, ProcessorError>;

    /// The PIN filter among the chain identifies itself here.
    fn as_pin(&self) -> Option<&PinAndShortcuts> {
        None
    }
}

/// An in-place transformation of a result, applied after feature dispatch.
pub trait ResultFilter: Send + Sync {
    /// Transform the result. An error stops the remaining filters.
    fn transform(&self, result: &mut CommandResult) -> Result<(), ProcessorError>;

    /// The text linter among the chain identifies itself here.
    fn as_lint(&self) -> Option<&LintText> {
        None
    }
}
