//! Fail-open helpers for evidence writers
//!
//! Screenshots, traces and artifacts must never cost the run its verdicts.
//! Writers return `Result`; these helpers turn a failure into a logged
//! evidence gap on the `journey::evidence` target.
//!
//! Do not wrap step execution or verdict computation in these.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

use crate::Result;

/// Counter of evidence writes that failed open
#[derive(Debug, Default)]
pub struct EvidenceGaps(AtomicUsize);

impl EvidenceGaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run an async evidence write, logging and counting the failure
pub async fn fail_open<F, Fut, T>(operation_name: &str, gaps: &EvidenceGaps, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!(target: "journey::evidence", "{} failed (fail-open): {}", operation_name, e);
            gaps.record();
            None
        }
    }
}

/// Synchronous variant for writers that never await
pub fn fail_open_sync<T>(operation_name: &str, gaps: &EvidenceGaps, result: Result<T>) -> Option<T> {
    match result {
        Ok(val) => Some(val),
        Err(e) => {
            warn!(target: "journey::evidence", "{} failed (fail-open): {}", operation_name, e);
            gaps.record();
            None
        }
    }
}

/// Like [`fail_open`] with linear backoff (`100ms * attempt`)
///
/// Only the final failure counts as a gap.
pub async fn fail_open_with_retries<F, Fut, T>(
    operation_name: &str,
    gaps: &EvidenceGaps,
    mut f: F,
    max_retries: usize,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=max_retries {
        match f().await {
            Ok(val) => return Some(val),
            Err(e) if attempt == max_retries => {
                warn!(
                    target: "journey::evidence",
                    "{} failed after {} attempts (fail-open): {}",
                    operation_name, max_retries, e
                );
                gaps.record();
                return None;
            }
            Err(e) => {
                warn!(
                    target: "journey::evidence",
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_retries, e
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
            }
        }
    }
    None
}
