//! Core value types shared across all Beacon crates.
//!
//! - [`Command`]: a wire-neutral request extracted by a front-end daemon.
//! - [`CommandResult`]: the outcome of dispatching a command to a toolbox
//!   feature, including the customer-visible combined text.
//! - [`ProcessorError`]: the typed error taxonomy of the command pipeline.
//! - [`lockdown`]: the process-wide emergency kill switch.

pub mod command;
pub mod error;
pub mod lockdown;
pub mod result;

pub use command::Command;
pub use error::ProcessorError;
#[doc(hidden)]
pub use lockdown::clear_emergency_lock_down;
pub use lockdown::{emergency_lock_down, trigger_emergency_lock_down};
pub use result::CommandResult;
