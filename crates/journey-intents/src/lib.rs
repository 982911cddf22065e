//! High-level checkout intents
//!
//! Each intent drives the page through a fixed sequence of fallbacks and
//! reports an [`IntentOutcome`] with a `Pass`/`Warn`/`Fail` verdict. Presence
//! alone only warns; a `Pass` needs an explicit expectation or threshold from
//! the charter that the page can be compared against.
//!
//! Use [`execute`] to run a step; the per-intent functions are private to the
//! crate.

mod anchors;
mod checkout;
mod dealer;
mod evidence;
mod executor;
mod financing;
mod forms;
mod outcome;
mod slider;

#[cfg(test)]
mod testing;

pub use executor::execute;
pub use forms::{auto_fill, AutoFillReport};
pub use outcome::{IntentContext, IntentOutcome};
