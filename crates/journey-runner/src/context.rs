//! Per-run state shared by setup, steps and auto-advance

use crate::paths::{default_run_id, RunPaths, START_URL_FILE};
use crate::report::STEP_RESULTS_FILE;
use chrono::{DateTime, Utc};
use journey_browser::{capture_to_file, InventoryBudget, PageHandle, ScreenshotOptions};
use journey_capture::{CapturePipeline, CaptureQueue, JsonlWriter};
use journey_core::fail_open::{fail_open_sync, fail_open_with_retries, EvidenceGaps};
use journey_core::{
    redact_url, Finding, JourneyError, NetworkEvent, Result, RunConfig, RunMeta, Totals,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Attempts per screenshot before it counts as an evidence gap
const SCREENSHOT_ATTEMPTS: usize = 2;

/// What the caller supplies for one run
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub start_url: String,
    pub charter_path: PathBuf,
    /// Defaults to a local timestamp
    pub run_id: Option<String>,
    /// Whether the browser was launched with HTTP credentials
    pub http_auth: bool,
}

/// One-way abort request, checked between steps
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state of a run in progress
pub struct RunContext {
    pub config: RunConfig,
    pub run_id: String,
    pub paths: RunPaths,
    pub start_url: String,
    pub charter_file: String,
    pub http_auth: bool,
    /// Active page; replaced when a click opens a new tab
    pub page: PageHandle,
    /// Step id that drained network events are tagged with
    pub current_step: Option<String>,
    pub capture: CapturePipeline,
    pub queue: CaptureQueue,
    pub inventory: InventoryBudget,
    pub gaps: Arc<EvidenceGaps>,
    pub step_results: JsonlWriter,
    pub findings: Vec<Finding>,
    pub totals: Totals,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Create the run directory, copy inputs and start observing the network
    pub fn prepare(config: RunConfig, inputs: &RunInputs, page: PageHandle) -> Result<Self> {
        let run_id = inputs.run_id.clone().unwrap_or_else(default_run_id);
        let paths = RunPaths::new(&config.results_root, &run_id);
        paths.create()?;
        info!("Run directory: {}", paths.run_dir.display());

        let gaps = Arc::new(EvidenceGaps::new());
        let charter_file = inputs
            .charter_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "charter.json".to_string());
        let copied = std::fs::copy(&inputs.charter_path, paths.inputs_dir.join(&charter_file))
            .map(|_| ())
            .map_err(JourneyError::from);
        fail_open_sync("inputs::copy_charter", &gaps, copied);
        let written = std::fs::write(
            paths.run_dir.join(START_URL_FILE),
            redact_url(&inputs.start_url),
        )
        .map_err(JourneyError::from);
        fail_open_sync("inputs::start_url", &gaps, written);

        let queue = CaptureQueue::new(config.capture_capacity);
        page.observe_network(queue.sink())?;

        Ok(Self {
            capture: CapturePipeline::new(&paths.run_dir, Arc::clone(&gaps)),
            inventory: InventoryBudget::new(&paths.run_dir, config.inventory_max, Arc::clone(&gaps)),
            step_results: JsonlWriter::new(paths.run_dir.join(STEP_RESULTS_FILE)),
            start_url: inputs.start_url.clone(),
            http_auth: inputs.http_auth,
            current_step: None,
            findings: Vec::new(),
            totals: Totals::default(),
            started_at: Utc::now(),
            charter_file,
            config,
            run_id,
            paths,
            page,
            queue,
            gaps,
        })
    }

    /// Switch to a page opened by a click
    pub fn adopt(&mut self, page: PageHandle) {
        self.page = page;
    }

    /// Process everything queued so far under the current step
    pub async fn drain_network(&mut self) -> Vec<NetworkEvent> {
        let events = self.queue.drain();
        if events.is_empty() {
            return Vec::new();
        }
        debug!("Draining {} network events", events.len());
        self.capture
            .process(events, self.current_step.as_deref(), Some(self.page.as_ref()))
            .await
    }

    /// Lifecycle marker in the network trace
    pub async fn mark(&self, event: &str, extra: Value) {
        self.capture
            .mark(event, self.current_step.as_deref(), extra)
            .await;
    }

    /// Screenshot into `screenshots/<name>`; `None` when it could not be taken
    pub async fn screenshot(&self, name: &str, options: ScreenshotOptions) -> Option<String> {
        let path = self.paths.screenshot(name);
        let path = path.as_path();
        let page = self.page.as_ref();
        let timeouts = &self.config.timeouts;
        fail_open_with_retries(
            "screenshot",
            &self.gaps,
            || capture_to_file(page, path, options, timeouts),
            SCREENSHOT_ATTEMPTS,
        )
        .await
        .map(|_| name.to_string())
    }

    pub fn run_meta(&self, finished: bool) -> RunMeta {
        RunMeta {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            finished_at: finished.then(Utc::now),
            start_url_redacted: redact_url(&self.start_url),
            charter_file: self.charter_file.clone(),
            headless: self.config.headless,
            stop_on_blocker: self.config.stop_on_blocker,
            max_steps: self.config.max_steps,
            totals: self.totals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_browser::mock::MockPage;
    use journey_core::RawNetworkEvent;

    fn inputs(temp: &std::path::Path) -> RunInputs {
        let charter = temp.join("charter.json");
        std::fs::write(&charter, r#"{"testScenarios": []}"#).unwrap();
        RunInputs {
            start_url: "https://shop.example/de1/konfigurator.html?token=secret".into(),
            charter_path: charter,
            run_id: Some("run-1".into()),
            http_auth: false,
        }
    }

    #[tokio::test]
    async fn test_prepare_writes_inputs_and_observes_network() {
        let temp = tempfile::tempdir().unwrap();
        let config = RunConfig {
            results_root: temp.path().join("results"),
            ..RunConfig::default()
        };
        let mock = Arc::new(MockPage::new("about:blank"));
        let mut ctx = RunContext::prepare(config, &inputs(temp.path()), mock.clone()).unwrap();

        let run_dir = temp.path().join("results/run-1");
        assert!(run_dir.join("inputs/charter.json").exists());
        let start = std::fs::read_to_string(run_dir.join(START_URL_FILE)).unwrap();
        assert_eq!(start, "https://shop.example/de1/konfigurator.html");

        ctx.current_step = Some("TC-01-Step1-Click".into());
        mock.emit(RawNetworkEvent::response(200, "https://shop.example/bff/cart?id=1"));
        mock.emit(RawNetworkEvent::response(200, "https://cdn.example/app.js"));
        let events = ctx.drain_network().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step.as_deref(), Some("TC-01-Step1-Click"));
        assert!(ctx.drain_network().await.is_empty());
    }

    #[tokio::test]
    async fn test_screenshot_failure_is_an_evidence_gap() {
        let temp = tempfile::tempdir().unwrap();
        let config = RunConfig {
            results_root: temp.path().to_path_buf(),
            timeouts: journey_core::Timeouts::immediate(),
            ..RunConfig::default()
        };
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        let ctx = RunContext::prepare(config, &inputs(temp.path()), mock.clone()).unwrap();

        assert_eq!(
            ctx.screenshot("a.png", ScreenshotOptions::step()).await.as_deref(),
            Some("a.png")
        );
        mock.set_fail_screenshots(true);
        assert!(ctx.screenshot("b.png", ScreenshotOptions::step()).await.is_none());
        assert_eq!(ctx.gaps.count(), 1);

        let flag = AbortFlag::new();
        let shared = flag.clone();
        shared.abort();
        assert!(flag.is_aborted());
    }

    #[tokio::test]
    async fn test_transient_screenshot_failure_is_retried() {
        let temp = tempfile::tempdir().unwrap();
        let config = RunConfig {
            results_root: temp.path().to_path_buf(),
            timeouts: journey_core::Timeouts::immediate(),
            ..RunConfig::default()
        };
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        let ctx = RunContext::prepare(config, &inputs(temp.path()), mock.clone()).unwrap();

        mock.fail_next_screenshots(1);
        assert_eq!(
            ctx.screenshot("c.png", ScreenshotOptions::step()).await.as_deref(),
            Some("c.png")
        );
        assert_eq!(ctx.gaps.count(), 0);
        assert_eq!(mock.screenshots(), 1);
        assert!(ctx.paths.screenshot("c.png").exists());
    }
}
