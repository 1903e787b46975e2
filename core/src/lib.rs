//! Run a child process, mirror its output locally and forward every line to
//! a remote log collector, buffering in memory while the collector is away.
pub mod config;
pub mod delivery;
pub mod error;
pub mod queue;
pub mod record;
pub mod runner;
pub mod shutdown;
pub mod supervisor;
pub mod tee;
pub mod transport;

pub use error::{CliError, WrapError};
pub use runner::{run_wrapper, run_wrapper_with, FatalReason, WrapOptions, WrapOutcome};
