//! Execution of a single charter step against the active page
//!
//! Recoverable problems (missing elements, timeouts, error pages) come back
//! as a `Fail` verdict, never as an error: the orchestrator always gets a
//! [`StepOutcome`] to record.

use crate::context::RunContext;
use crate::paths::resolve_open_url;
use journey_browser::discovery::MAX_ATTEMPTS;
use journey_browser::guards::{
    check_for_error_page, ensure_summary_open, handle_cookie_banner, settle, stabilize,
};
use journey_browser::page::wait_visible;
use journey_browser::{auto_repair_click, discovery_click, resolve, FallbackClick, Resolution};
use journey_core::{
    redact_url, AtomicCheckResult, IntentStep, JourneyError, LocatorHints, ResolvedLocator,
    Result, Step, StepKind, TestCase, Verdict,
};
use journey_intents::IntentContext;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PLACEHOLDER_MESSAGE: &str =
    "placeholder-testid: No locator provided. Add selector/data-testid/aria-label/role+name/text.";

/// What executing a step produced
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub verdict: Verdict,
    pub message: String,
    pub atomic: Option<AtomicCheckResult>,
    pub locator: Option<ResolvedLocator>,
}

impl StepOutcome {
    fn new(verdict: Verdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            message: message.into(),
            atomic: None,
            locator: None,
        }
    }

    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(Verdict::Pass, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Verdict::Warn, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(Verdict::Fail, message)
    }

    fn with_locator(mut self, locator: ResolvedLocator) -> Self {
        self.locator = Some(locator);
        self
    }
}

/// Hints aimed at the configurator's checkout entry, which only renders once
/// the summary section is open
fn targets_checkout_cta(hints: &LocatorHints) -> bool {
    let selector = hints.selector.as_deref().unwrap_or_default();
    let text = hints.text.as_deref().unwrap_or_default();
    selector.contains("summary-finance-wrapper")
        || selector.contains("icon-ShoppingCart")
        || text.contains("Online leasen")
}

/// Execute `step` (1-based `step_num` within `case`)
pub async fn execute_step(
    ctx: &mut RunContext,
    case: &TestCase,
    step_num: usize,
    step: &Step,
) -> StepOutcome {
    match run_step(ctx, case, step_num, step).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} step {} failed: {}", case.id, step_num, e);
            let suffix = if e.is_timeout() { "timeout" } else { "error" };
            let prefix = format!("ui_inventory_{}_{}_{}", case.id, step_num, suffix);
            let page = ctx.page.clone();
            ctx.inventory.capture(page.as_ref(), &prefix).await;
            let message = e.to_string();
            StepOutcome::fail(message.lines().next().unwrap_or_default())
        }
    }
}

async fn run_step(
    ctx: &mut RunContext,
    case: &TestCase,
    step_num: usize,
    step: &Step,
) -> Result<StepOutcome> {
    match &step.kind {
        StepKind::OpenUrl { target } => open_url(ctx, target.as_deref()).await,
        StepKind::Wait { seconds } => {
            tokio::time::sleep(Duration::from_secs(*seconds)).await;
            Ok(StepOutcome::pass(format!("Waited {}s", seconds)))
        }
        StepKind::Click { hints } | StepKind::Fill { hints, .. } | StepKind::Check { hints } => {
            interact(ctx, case, step_num, step, hints).await
        }
        StepKind::Intent(intent) => Ok(run_intent(ctx, case, intent).await),
    }
}

async fn open_url(ctx: &mut RunContext, target: Option<&str>) -> Result<StepOutcome> {
    let timeouts = ctx.config.timeouts;
    let page = ctx.page.clone();
    let Some(url) = resolve_open_url(&ctx.start_url, target) else {
        stabilize(page.as_ref(), &timeouts).await;
        return Ok(StepOutcome::pass("Open URL: no-op (value is null/empty)"));
    };

    info!("Navigating to {}", redact_url(&url));
    page.goto(&url).await?;
    if let Err(e) = handle_cookie_banner(page.as_ref(), &timeouts).await {
        debug!("Cookie banner handling failed: {}", e);
    }
    check_for_error_page(page.as_ref()).await?;
    stabilize(page.as_ref(), &timeouts).await;
    Ok(StepOutcome::pass(format!(
        "Open URL navigated to {}",
        redact_url(&url)
    )))
}

async fn locate(ctx: &RunContext, hints: &LocatorHints) -> Result<Option<Resolution>> {
    let page = ctx.page.as_ref();
    if let Some(found) = resolve(page, hints).await? {
        return Ok(Some(found));
    }
    if targets_checkout_cta(hints) && ensure_summary_open(page, &ctx.config.timeouts).await {
        debug!("Retrying checkout CTA after opening the summary");
        return resolve(page, hints).await;
    }
    Ok(None)
}

async fn interact(
    ctx: &mut RunContext,
    case: &TestCase,
    step_num: usize,
    step: &Step,
    hints: &LocatorHints,
) -> Result<StepOutcome> {
    if hints.is_placeholder_only() {
        return Ok(StepOutcome::warn(PLACEHOLDER_MESSAGE));
    }
    let Some(resolution) = locate(ctx, hints).await? else {
        return Ok(recover_missing(ctx, case, step_num, step, hints).await);
    };

    let timeouts = ctx.config.timeouts;
    let page = ctx.page.clone();
    let locator = resolution.locator();
    let target = &resolution.target;
    debug!("Resolved {} via strategy {}", locator.description, locator.strategy);

    let outcome = match &step.kind {
        StepKind::Check { .. } => {
            if wait_visible(page.as_ref(), target, timeouts.element(), timeouts.poll()).await {
                StepOutcome::pass(format!("Element visible: {}", locator.description))
            } else {
                StepOutcome::fail(format!("Element not visible: {}", locator.description))
            }
        }
        StepKind::Fill { value, .. } => {
            page.fill(target, value).await?;
            StepOutcome::pass(format!("Filled {}", locator.description))
        }
        _ => {
            page.scroll_into_view(target).await?;
            if !wait_visible(page.as_ref(), target, timeouts.element(), timeouts.poll()).await {
                return Err(JourneyError::Timeout(format!(
                    "waiting for {} to become visible",
                    locator.description
                )));
            }
            let clicked = page.click(target).await?;
            if let Some(new_page) = clicked.new_page {
                info!("Click opened a new page");
                ctx.adopt(new_page);
            }
            let page = ctx.page.clone();
            settle(page.as_ref(), &timeouts).await;
            if let Err(e) = handle_cookie_banner(page.as_ref(), &timeouts).await {
                debug!("Cookie banner handling failed: {}", e);
            }
            check_for_error_page(page.as_ref()).await?;
            StepOutcome::pass(format!("Clicked {}", locator.description))
        }
    };
    Ok(outcome.with_locator(locator))
}

fn fallback_outcome(ctx: &mut RunContext, attempt: FallbackClick) -> Option<StepOutcome> {
    let FallbackClick {
        success,
        message,
        page,
    } = attempt;
    ctx.adopt(page);
    success.then(|| {
        StepOutcome::warn(message.clone()).with_locator(ResolvedLocator {
            strategy: 0,
            description: message,
        })
    })
}

/// Nothing matched the hints: inventory export, then fallback clicks
async fn recover_missing(
    ctx: &mut RunContext,
    case: &TestCase,
    step_num: usize,
    step: &Step,
    hints: &LocatorHints,
) -> StepOutcome {
    let not_found = JourneyError::ElementNotFound(hints.describe()).to_string();
    let prefix = format!("ui_inventory_{}_{}_autofix", case.id, step_num);
    let page = ctx.page.clone();
    let Some(snapshot) = ctx.inventory.capture(page.as_ref(), &prefix).await else {
        return StepOutcome::fail(not_found);
    };

    if matches!(step.kind, StepKind::Click { .. }) {
        let timeouts = ctx.config.timeouts;
        if ctx.config.auto_repair_click {
            let repaired = auto_repair_click(ctx.page.clone(), hints, &snapshot, &timeouts).await;
            debug!("Auto-repair: {}", repaired.message);
            if let Some(outcome) = fallback_outcome(ctx, repaired) {
                return outcome;
            }
        }
        if ctx.config.discovery_click {
            let discovered =
                discovery_click(ctx.page.clone(), hints, &snapshot, MAX_ATTEMPTS, &timeouts).await;
            debug!("Discovery: {}", discovered.message);
            if let Some(outcome) = fallback_outcome(ctx, discovered) {
                return outcome;
            }
        }
    }

    let candidates = snapshot.summarize_candidates(6);
    if candidates.is_empty() {
        StepOutcome::fail(not_found)
    } else {
        StepOutcome::fail(format!("{} Top candidates: {}", not_found, candidates))
    }
}

async fn run_intent(ctx: &mut RunContext, case: &TestCase, intent: &IntentStep) -> StepOutcome {
    let bullets = case.bullets();
    let page = ctx.page.clone();
    let outcome = {
        let mut intent_ctx = IntentContext {
            run_dir: &ctx.paths.run_dir,
            timeouts: &ctx.config.timeouts,
            inventory: &mut ctx.inventory,
            form_definition: ctx.capture.store().form_definition(),
            bullets: &bullets,
        };
        journey_intents::execute(&mut intent_ctx, page, intent).await
    };
    ctx.adopt(outcome.page);
    StepOutcome {
        verdict: outcome.verdict,
        message: outcome.message,
        atomic: outcome.atomic,
        locator: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunInputs;
    use journey_browser::mock::{ClickEffect, MockElement, MockPage};
    use journey_core::{RunConfig, Timeouts};
    use std::sync::Arc;

    fn context(temp: &std::path::Path, page: Arc<MockPage>) -> RunContext {
        let charter = temp.join("charter.json");
        std::fs::write(&charter, "{}").unwrap();
        let config = RunConfig {
            results_root: temp.to_path_buf(),
            timeouts: Timeouts::immediate(),
            ..RunConfig::default()
        };
        let inputs = RunInputs {
            start_url: "https://shop.example/de1/konfigurator.html".into(),
            charter_path: charter,
            run_id: Some("run".into()),
            http_auth: false,
        };
        RunContext::prepare(config, &inputs, page).unwrap()
    }

    fn case(steps: Vec<Step>) -> TestCase {
        TestCase {
            id: "TC-01".into(),
            description: String::new(),
            steps,
        }
    }

    fn click(hints: LocatorHints) -> Step {
        Step {
            action: "Click CTA".into(),
            kind: StepKind::Click { hints },
        }
    }

    #[tokio::test]
    async fn test_open_url_resolves_against_locale() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("about:blank"));
        let mut ctx = context(temp.path(), mock.clone());
        let step = Step {
            action: "Open URL".into(),
            kind: StepKind::OpenUrl {
                target: Some("/checkout.html".into()),
            },
        };
        let outcome = execute_step(&mut ctx, &case(vec![]), 1, &step).await;
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(
            mock.navigations(),
            vec!["https://shop.example/de1/checkout.html".to_string()]
        );

        let noop = Step {
            action: "Open URL".into(),
            kind: StepKind::OpenUrl { target: None },
        };
        let outcome = execute_step(&mut ctx, &case(vec![]), 2, &noop).await;
        assert_eq!(outcome.message, "Open URL: no-op (value is null/empty)");
    }

    #[tokio::test]
    async fn test_open_url_error_page_fails() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("about:blank"));
        mock.set_title("404 Not Found");
        let mut ctx = context(temp.path(), mock);
        let step = Step {
            action: "Open URL".into(),
            kind: StepKind::OpenUrl {
                target: Some("https://shop.example/missing".into()),
            },
        };
        let outcome = execute_step(&mut ctx, &case(vec![]), 1, &step).await;
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.starts_with("Critical Error: Detected"));
    }

    #[tokio::test]
    async fn test_placeholder_hint_warns_without_resolution() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        let mut ctx = context(temp.path(), mock.clone());
        let step = click(LocatorHints {
            test_id: Some("placeholder-testid".into()),
            ..Default::default()
        });
        let outcome = execute_step(&mut ctx, &case(vec![]), 1, &step).await;
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert_eq!(outcome.message, PLACEHOLDER_MESSAGE);
        assert!(mock.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_click_adopts_new_page() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/de1/konfigurator.html"));
        let tab = Arc::new(MockPage::new("https://shop.example/de1/checkout.html"));
        mock.add(
            MockElement::button("Online leasen")
                .test_id("cta-lease")
                .on_click(ClickEffect::OpenPage(tab)),
        );
        let mut ctx = context(temp.path(), mock.clone());
        let step = click(LocatorHints {
            test_id: Some("cta-lease".into()),
            ..Default::default()
        });
        let outcome = execute_step(&mut ctx, &case(vec![]), 1, &step).await;
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(outcome.locator.as_ref().map(|l| l.strategy), Some(3));
        assert_eq!(
            ctx.page.url().await.unwrap(),
            "https://shop.example/de1/checkout.html"
        );
    }

    #[tokio::test]
    async fn test_missing_click_target_uses_auto_repair() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        mock.add(
            MockElement::button("Jetzt Online leasen")
                .attr("id", "lease")
                .on_click(ClickEffect::Navigate("https://shop.example/checkout".into())),
        );
        let mut ctx = context(temp.path(), mock.clone());
        let step = click(LocatorHints {
            test_id: Some("gone".into()),
            aria_label: Some("online leasen".into()),
            ..Default::default()
        });
        let outcome = execute_step(&mut ctx, &case(vec![]), 4, &step).await;
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert!(outcome.message.starts_with("auto-repaired click"));
        assert_eq!(outcome.locator.map(|l| l.strategy), Some(0));
        assert!(temp.path().join("run/ui_inventory_TC-01_4_autofix.json").exists());
    }

    #[tokio::test]
    async fn test_missing_element_fails_with_candidates() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        mock.add(MockElement::button("Impressum").attr("id", "imprint"));
        let mut ctx = context(temp.path(), mock);
        let step = Step {
            action: "Fill".into(),
            kind: StepKind::Fill {
                hints: LocatorHints {
                    test_id: Some("first-name".into()),
                    ..Default::default()
                },
                value: "John".into(),
            },
        };
        let outcome = execute_step(&mut ctx, &case(vec![]), 2, &step).await;
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome
            .message
            .starts_with("Could not find element using provided locators"));
        assert!(outcome.message.contains("Top candidates: 1) "));
    }

    #[tokio::test]
    async fn test_check_and_fill_resolved_elements() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        let input = mock.add(MockElement::input("text").test_id("first-name"));
        mock.add(MockElement::new("div").test_id("hidden-box").hidden());
        let mut ctx = context(temp.path(), mock.clone());

        let fill = Step {
            action: "Fill".into(),
            kind: StepKind::Fill {
                hints: LocatorHints {
                    test_id: Some("first-name".into()),
                    ..Default::default()
                },
                value: "John".into(),
            },
        };
        assert_eq!(
            execute_step(&mut ctx, &case(vec![]), 1, &fill).await.verdict,
            Verdict::Pass
        );
        assert_eq!(mock.fills(), vec![(input, "John".to_string())]);

        let check = Step {
            action: "Check".into(),
            kind: StepKind::Check {
                hints: LocatorHints {
                    test_id: Some("hidden-box".into()),
                    ..Default::default()
                },
            },
        };
        let outcome = execute_step(&mut ctx, &case(vec![]), 2, &check).await;
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.starts_with("Element not visible"));
    }
}
