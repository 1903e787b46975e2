mod run;
pub mod types;

pub use run::{run_wrapper, run_wrapper_with};
pub use types::{FatalReason, WrapOptions, WrapOutcome};
