//! Run orchestrator
//!
//! Walks the charter sequentially: setup once, then every step of every test
//! case, with an optional auto-advance after journey-driving cases. Each
//! executed step yields exactly one [`StepResult`], appended as soon as the
//! step finishes. Network events are drained between steps and tagged with
//! the step that was active.
//!
//! Evidence (screenshots, traces, documents) is written fail-open; a missing
//! screenshot never changes a verdict.

use crate::advance::auto_advance;
use crate::context::{AbortFlag, RunContext, RunInputs};
use crate::findings::{step_finding, StepRef, ERROR_PAGE_MARKER};
use crate::report::{write_findings, write_run_meta, write_summary};
use crate::setup::run_setup;
use crate::steps::execute_step;
use chrono::Utc;
use journey_browser::{PageHandle, ScreenshotOptions};
use journey_capture::{write_dataflow_inventory, write_technical_checkpoints};
use journey_core::fail_open::{fail_open, fail_open_sync};
use journey_core::{
    redact_url, screenshot_name, step_id, Charter, Finding, FindingKind, Result, RunConfig,
    Severity, Step, StepKind, StepResult, TestCase, Totals, Verdict,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Longest message kept in `step_end` markers
const MARKER_MESSAGE_CHARS: usize = 200;

/// What a finished run hands back
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub totals: Totals,
    pub findings: Vec<Finding>,
}

impl RunReport {
    /// No failed step and no abort
    pub fn passed(&self) -> bool {
        self.totals.fail == 0 && !self.totals.aborted
    }
}

/// Sequential charter runner
pub struct Orchestrator {
    config: RunConfig,
    abort: AbortFlag,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            abort: AbortFlag::new(),
        }
    }

    /// Handle for requesting an abort from outside (e.g. Ctrl+C)
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Run `charter` against `page`
    ///
    /// Only failing to create the run directory is an error; everything after
    /// that ends in a report, including a failed setup.
    pub async fn run(
        &self,
        charter: &Charter,
        inputs: RunInputs,
        page: PageHandle,
    ) -> Result<RunReport> {
        let mut ctx = RunContext::prepare(self.config.clone(), &inputs, page)?;
        info!(
            "Starting run {} ({} steps)",
            ctx.run_id,
            charter.step_count()
        );
        ctx.mark(
            "network_capture_enabled",
            json!({"capacity": ctx.config.capture_capacity}),
        )
        .await;
        fail_open_sync(
            "run_meta::start",
            &ctx.gaps,
            write_run_meta(&ctx.paths.run_dir, &ctx.run_meta(false)),
        );

        match run_setup(&mut ctx).await {
            Ok(()) => self.run_cases(&mut ctx, charter).await,
            Err(e) => {
                error!("Setup failed: {}", e);
                if e.is_error_page() {
                    ctx.findings.push(Finding {
                        kind: FindingKind::App,
                        severity: Severity::Critical,
                        case_id: "SETUP".to_string(),
                        step_num: 0,
                        action: "setup".to_string(),
                        selector: None,
                        summary: e.to_string(),
                        screenshot: Some("screenshots/_setup_01_ready.png".to_string()),
                    });
                }
                ctx.totals.aborted = true;
                ctx.totals.abort_reason = Some(format!("setup failed: {}", e));
            }
        }

        Ok(self.finalize(ctx).await)
    }

    async fn run_cases(&self, ctx: &mut RunContext, charter: &Charter) {
        let mut counted = 0usize;
        'cases: for scenario in &charter.scenarios {
            info!("Scenario: {}", scenario.name);
            for case in &scenario.test_cases {
                info!("Running test case {}", case.id);
                for (index, step) in case.steps.iter().enumerate() {
                    if self.abort.is_aborted() {
                        warn!("Run interrupted before {} step {}", case.id, index + 1);
                        ctx.totals.aborted = true;
                        ctx.totals.abort_reason = Some("interrupted".to_string());
                        break 'cases;
                    }
                    let counts = !matches!(step.kind, StepKind::OpenUrl { .. });
                    if counts && ctx.config.max_steps.is_some_and(|max| counted >= max) {
                        info!("Reached max_steps limit ({})", counted);
                        break 'cases;
                    }

                    self.run_step(ctx, case, index + 1, step).await;
                    if counts {
                        counted += 1;
                    }
                    if ctx.totals.aborted {
                        break 'cases;
                    }
                }

                if ctx.config.auto_advance && case.is_journey_driver() {
                    self.advance_after(ctx, case).await;
                }
            }
        }
    }

    async fn run_step(&self, ctx: &mut RunContext, case: &TestCase, step_num: usize, step: &Step) {
        let action = step.normalized_action();
        let id = step_id(&case.id, step_num, &step.action);

        // Whatever arrived since the last drain belongs to the previous step
        ctx.drain_network().await;
        ctx.current_step = Some(id.clone());
        let url = redact_url(&ctx.page.url().await.unwrap_or_default());
        ctx.mark(
            "step_start",
            json!({"case_id": case.id, "step_num": step_num, "action": action, "url": url}),
        )
        .await;
        info!("{} step {}: {}", case.id, step_num, step.action);

        let outcome = execute_step(ctx, case, step_num, step).await;
        ctx.totals.record(outcome.verdict);
        match outcome.verdict {
            Verdict::Pass => info!("  Pass: {}", outcome.message),
            Verdict::Warn => warn!("  Warn: {}", outcome.message),
            Verdict::Fail => error!("  Fail: {}", outcome.message),
        }

        let screenshot = ctx
            .screenshot(
                &screenshot_name(&case.id, step_num, &step.action),
                ScreenshotOptions::step(),
            )
            .await
            .map(|name| format!("screenshots/{}", name));

        let selector = outcome
            .locator
            .as_ref()
            .map(|l| l.description.clone())
            .or_else(|| {
                step.hints()
                    .and_then(|h| h.selector.clone().or_else(|| h.test_id.clone()))
            });
        let origin = StepRef {
            case_id: &case.id,
            step_num,
            action,
        };
        if let Some(finding) = step_finding(
            origin,
            outcome.verdict,
            &outcome.message,
            selector.as_deref(),
            screenshot.as_deref(),
        ) {
            ctx.findings.push(finding);
        }

        if ctx.config.stop_on_blocker && outcome.verdict.is_fail() && step.can_block() {
            warn!("Blocker at {}; skipping the remaining steps", id);
            ctx.totals.aborted = true;
            ctx.totals.abort_reason = Some(if outcome.message.is_empty() {
                "blocker".to_string()
            } else {
                outcome.message.clone()
            });
        }

        ctx.drain_network().await;
        let result = StepResult {
            ts: Utc::now(),
            case_id: case.id.clone(),
            step_index: step_num,
            step_id: id,
            action: action.to_string(),
            intent: step.intent().map(|i| i.intent.to_string()),
            verdict: outcome.verdict,
            message: outcome.message.clone(),
            atomic: outcome.atomic,
            locator: outcome.locator,
            screenshot,
            page_url: redact_url(&ctx.page.url().await.unwrap_or_default()),
        };
        fail_open("step_results::append", &ctx.gaps, || {
            ctx.step_results.append(&result)
        })
        .await;

        let short: String = outcome.message.chars().take(MARKER_MESSAGE_CHARS).collect();
        ctx.mark(
            "step_end",
            json!({"status": outcome.verdict.as_lower(), "message": short}),
        )
        .await;
    }

    async fn advance_after(&self, ctx: &mut RunContext, case: &TestCase) {
        if ctx.totals.aborted || self.abort.is_aborted() {
            return;
        }
        let outcome = auto_advance(ctx).await;
        info!("{}", outcome.message);
        ctx.mark(
            "auto_advance",
            json!({"ok": outcome.ok, "message": outcome.message}),
        )
        .await;
        if outcome.message.contains(ERROR_PAGE_MARKER) {
            let origin = StepRef {
                case_id: &case.id,
                step_num: case.steps.len(),
                action: "auto_advance",
            };
            ctx.findings
                .extend(step_finding(origin, Verdict::Fail, &outcome.message, None, None));
        }
    }

    async fn finalize(&self, mut ctx: RunContext) -> RunReport {
        ctx.drain_network().await;
        let dropped = ctx.queue.dropped();
        if dropped > 0 {
            warn!("Capture queue dropped {} network events", dropped);
        }

        let run_dir = ctx.paths.run_dir.clone();
        if let Some(backend) = fail_open_sync(
            "technical_checkpoints",
            &ctx.gaps,
            write_technical_checkpoints(&run_dir),
        ) {
            ctx.findings.extend(backend);
        }
        fail_open_sync(
            "dataflow_inventory",
            &ctx.gaps,
            write_dataflow_inventory(&run_dir),
        );

        ctx.totals.evidence_gaps = ctx.gaps.count();
        fail_open_sync(
            "findings",
            &ctx.gaps,
            write_findings(&run_dir, &ctx.findings),
        );
        fail_open_sync(
            "run_meta::finish",
            &ctx.gaps,
            write_run_meta(&run_dir, &ctx.run_meta(true)),
        );
        fail_open_sync(
            "summary",
            &ctx.gaps,
            write_summary(&run_dir, &ctx.totals, ctx.http_auth),
        );

        let totals = &ctx.totals;
        info!(
            "Run {} finished: {} steps (Pass={} Warn={} Fail={}){}",
            ctx.run_id,
            totals.steps_total,
            totals.pass,
            totals.warn,
            totals.fail,
            if totals.aborted { ", aborted" } else { "" }
        );
        info!("Results: {}", run_dir.display());

        RunReport {
            run_id: ctx.run_id,
            run_dir,
            totals: ctx.totals,
            findings: ctx.findings,
        }
    }
}
