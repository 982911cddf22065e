//! Run orchestration for the checkout journey acceptance runner
//!
//! Takes a loaded [`journey_core::Charter`] and a page, executes every step
//! in order and leaves a self-contained evidence directory behind:
//!
//! ```text
//! <results_root>/<run_id>/
//!   inputs/                 charter copy, redacted start URL
//!   screenshots/            setup and per-step screenshots
//!   step_results.jsonl      one record per executed step
//!   network_trace.jsonl     redacted network events and lifecycle markers
//!   api/                    numbered API artifacts
//!   findings.json/.md       APP vs SCRIPT triage
//!   summary.md, run_meta.json
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use journey_runner::{Orchestrator, RunInputs};
//!
//! let orchestrator = Orchestrator::new(config);
//! let report = orchestrator.run(&charter, inputs, session.page()).await?;
//! println!("{} failed steps", report.totals.fail);
//! ```

mod advance;
mod context;
mod credentials;
mod findings;
mod orchestrator;
mod paths;
mod report;
mod setup;
mod steps;

pub use advance::{auto_advance, AdvanceOutcome, MAX_ADVANCE_CLICKS};
pub use context::{AbortFlag, RunContext, RunInputs};
pub use credentials::{credentials_for_url, load_credentials, CREDENTIALS_FILE};
pub use findings::{classify, step_finding, StepRef};
pub use orchestrator::{Orchestrator, RunReport};
pub use paths::{default_run_id, resolve_open_url, RunPaths};
pub use report::{render_findings_markdown, render_summary};
pub use setup::{run_setup, verify_login, LoginVerification};
pub use steps::{execute_step, StepOutcome};
