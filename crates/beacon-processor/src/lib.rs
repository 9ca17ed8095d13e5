//! The command-processing pipeline.
//!
//! A front-end hands a [`Command`](beacon_types::Command) to the
//! [`CommandProcessor`]; the processor admits it past the global lockdown
//! flag and the per-instance rate limiter, walks the command filter chain
//! (authentication, rewriting), applies an optional `.plt` output-window
//! override, dispatches to a toolbox feature by trigger prefix, and walks
//! the result filter chain over the outcome.
//!
//! # Architecture
//!
//! - [`filter`]: the [`CommandFilter`](filter::CommandFilter) and
//!   [`ResultFilter`](filter::ResultFilter) chains and their concrete
//!   implementations.
//! - [`ratelimit`]: sliding-second admission counter keyed by identity.
//! - [`stats`]: process-duration accounting.
//! - [`processor`]: the orchestrator and its sanity checks.

pub mod filter;
pub mod processor;
pub mod ratelimit;
pub mod stats;

pub use processor::{
    empty_processor, insane_processor, test_processor, CommandProcessor, TEST_PROCESSOR_PIN,
};
pub use ratelimit::RateLimit;
pub use stats::{CommandStats, COMMAND_STATS};
