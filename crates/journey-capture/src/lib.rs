//! Network capture and redaction for the checkout journey runner
//!
//! Browser callbacks push raw events into a [`CaptureQueue`]; the orchestrator
//! drains it between steps and hands the events to a [`CapturePipeline`],
//! which filters, redacts, tags and persists them. Nothing unredacted is ever
//! written.
//!
//! - [`classify`]: allow/deny lists, key classes, service buckets
//! - [`redact`]: JSON redaction visitor and PII digests
//! - [`queue`]: bounded capture queue
//! - [`trace`]: append-only JSON Lines writer
//! - [`artifacts`]: named and numbered artifact files
//! - [`pipeline`]: drained-event processing and form snapshots
//! - [`dataflow`]: post-run dataflow inventory and technical checkpoints

pub mod artifacts;
pub mod classify;
pub mod dataflow;
pub mod pipeline;
pub mod queue;
pub mod redact;
pub mod trace;

pub use artifacts::ArtifactStore;
pub use classify::{Category, DefaultKeyPolicy, KeyClass, KeyClassifier};
pub use dataflow::{
    read_duc_continuation, write_dataflow_inventory, write_technical_checkpoints, DucContinuation,
};
pub use pipeline::{form_snapshot, CapturePipeline, NETWORK_TRACE_FILE};
pub use queue::CaptureQueue;
pub use redact::{Redactor, REDACTED};
pub use trace::{read_jsonl, JsonlWriter};
