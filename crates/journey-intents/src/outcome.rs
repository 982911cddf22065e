//! Intent outcome and execution context

use journey_browser::{InventoryBudget, InventorySnapshot, Page, PageHandle};
use journey_core::{AtomicCheckResult, Timeouts, Verdict};
use serde_json::Value;
use std::path::Path;

/// What an intent hands back to the orchestrator
///
/// `page` is the active page after the intent ran; it differs from the input
/// when a click opened a new tab.
pub struct IntentOutcome {
    pub verdict: Verdict,
    pub message: String,
    pub atomic: Option<AtomicCheckResult>,
    pub page: PageHandle,
}

impl IntentOutcome {
    pub fn new(page: PageHandle, verdict: Verdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            message: message.into(),
            atomic: None,
            page,
        }
    }

    pub fn pass(page: PageHandle, message: impl Into<String>) -> Self {
        Self::new(page, Verdict::Pass, message)
    }

    pub fn warn(page: PageHandle, message: impl Into<String>) -> Self {
        Self::new(page, Verdict::Warn, message)
    }

    pub fn fail(page: PageHandle, message: impl Into<String>) -> Self {
        Self::new(page, Verdict::Fail, message)
    }

    /// Attach atomic checks; the verdict becomes their escalation
    pub fn with_atomic(mut self, atomic: AtomicCheckResult) -> Self {
        self.verdict = atomic.overall();
        self.atomic = Some(atomic);
        self
    }
}

impl std::fmt::Debug for IntentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentOutcome")
            .field("verdict", &self.verdict)
            .field("message", &self.message)
            .field("atomic", &self.atomic)
            .finish()
    }
}

/// Everything an intent may read or write besides the page
pub struct IntentContext<'a> {
    pub run_dir: &'a Path,
    pub timeouts: &'a Timeouts,
    pub inventory: &'a mut InventoryBudget,
    /// Latest captured form definition (redacted), for auto-fill hints
    pub form_definition: Option<&'a Value>,
    /// Verification bullets of the owning test case
    pub bullets: &'a [String],
}

impl IntentContext<'_> {
    /// Snapshot for fallbacks and failure messages
    pub async fn snapshot(&mut self, page: &dyn Page, prefix: &str) -> Option<InventorySnapshot> {
        self.inventory.capture(page, prefix).await
    }

    /// ` <candidates>` suffix for failure messages, empty when unavailable
    pub async fn candidates_suffix(&mut self, page: &dyn Page, prefix: &str) -> String {
        match self.snapshot(page, prefix).await {
            Some(snapshot) => format!(" {}", snapshot.summarize_candidates(6)),
            None => String::new(),
        }
    }

    /// True when any bullet mentions one of `needles` (case-insensitive)
    pub fn bullets_mention(&self, needles: &[&str]) -> bool {
        self.bullets.iter().any(|bullet| {
            let bullet = bullet.to_lowercase();
            needles.iter().any(|n| bullet.contains(n))
        })
    }
}
