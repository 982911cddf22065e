//! # journey-core
//!
//! Data model and shared plumbing for the checkout journey acceptance runner.
//!
//! - [`Charter`] is loaded once and validated into a closed [`StepKind`] union
//! - every executed step produces exactly one [`StepResult`]
//! - intents with several sub-checks derive their verdict with [`escalate`]

mod charter;
mod config;
mod error;
pub mod fail_open;
mod types;
mod urls;
mod verdict;

pub use charter::*;
pub use config::{RunConfig, Timeouts, Viewport};
pub use error::{JourneyError, Result};
pub use types::*;
pub use urls::redact_url;
pub use verdict::{escalate, AtomicCheck, AtomicCheckResult, Verdict};
