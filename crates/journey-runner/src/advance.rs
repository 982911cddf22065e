//! Auto-advance through the eCom checkout after journey-driving test cases

use crate::context::RunContext;
use journey_browser::discovery::MAX_ATTEMPTS;
use journey_browser::guards::{
    check_for_error_page, handle_cookie_banner, is_likely_ecom_page, settle,
};
use journey_browser::{discovery_click, ElementQuery, ElementTarget, Page, TextMatch};
use journey_core::{redact_url, LocatorHints};
use serde_json::json;
use tracing::{debug, info};

/// Next-step clicks per auto-advance
pub const MAX_ADVANCE_CLICKS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub ok: bool,
    pub message: String,
}

impl AdvanceOutcome {
    fn new(ok: bool, message: impl Into<String>) -> Self {
        Self {
            ok,
            message: message.into(),
        }
    }
}

fn next_step_queries() -> [ElementQuery; 3] {
    [
        ElementQuery::test_id("cta-next-step"),
        ElementQuery::css("button[data-testid=\"cta-next-step\"]"),
        ElementQuery::role("button", Some(TextMatch::Exact("Weiter".into()))),
    ]
}

/// First visible, enabled "next step" CTA
async fn next_step_cta(page: &dyn Page) -> Option<ElementTarget> {
    for query in next_step_queries() {
        let target = ElementTarget::first(query);
        match page.inspect(&target).await {
            Ok(Some(info)) if info.visible && !info.looks_deactivated() => return Some(target),
            _ => continue,
        }
    }
    None
}

/// Click "next step" up to [`MAX_ADVANCE_CLICKS`] times, filling required
/// fields first when enabled
pub async fn auto_advance(ctx: &mut RunContext) -> AdvanceOutcome {
    let timeouts = ctx.config.timeouts;
    if !is_likely_ecom_page(ctx.page.as_ref()).await {
        return AdvanceOutcome::new(false, "auto-advance: not on eCom/checkout page");
    }
    let start_url = redact_url(&ctx.page.url().await.unwrap_or_default());
    let mut clicks = 0;

    for attempt in 1..=MAX_ADVANCE_CLICKS {
        let page = ctx.page.clone();
        if attempt > 1 && !is_likely_ecom_page(page.as_ref()).await {
            debug!("Left the eCom flow after {} clicks", clicks);
            break;
        }

        if ctx.config.auto_fill {
            let filled =
                journey_intents::auto_fill(page.as_ref(), ctx.capture.store().form_definition())
                    .await;
            let (ok, message) = match filled {
                Ok(report) => (report.filled > 0, report.message()),
                Err(e) => (false, format!("auto-fill: {}", e)),
            };
            ctx.mark(
                "auto_fill",
                json!({"ok": ok, "message": message, "attempt": attempt}),
            )
            .await;
        }

        if let Ok(alerts) = page.ui_alerts().await {
            if !alerts.is_empty() {
                ctx.mark(
                    "ui_alerts",
                    json!({"attempt": attempt, "count": alerts.len(), "items": alerts}),
                )
                .await;
            }
        }

        let Some(target) = next_step_cta(page.as_ref()).await else {
            debug!("No enabled next-step CTA on attempt {}", attempt);
            break;
        };
        match page.click(&target).await {
            Ok(clicked) => {
                if let Some(new_page) = clicked.new_page {
                    ctx.adopt(new_page);
                }
            }
            Err(e) => {
                debug!("Next-step click failed: {}", e);
                break;
            }
        }
        clicks += 1;
        info!("Auto-advance click {} via {}", clicks, target.query);

        let page = ctx.page.clone();
        settle(page.as_ref(), &timeouts).await;
        if let Err(e) = handle_cookie_banner(page.as_ref(), &timeouts).await {
            debug!("Cookie banner handling failed: {}", e);
        }
        let guarded = check_for_error_page(page.as_ref()).await;
        ctx.drain_network().await;
        if let Err(e) = guarded {
            return AdvanceOutcome::new(false, format!("auto-advance: {}", e));
        }
    }

    if clicks > 0 {
        let end_url = redact_url(&ctx.page.url().await.unwrap_or_default());
        let message = if end_url != start_url {
            format!("auto-advance: clicked {}x; url changed", clicks)
        } else {
            format!("auto-advance: clicked {}x; no url change observed", clicks)
        };
        return AdvanceOutcome::new(true, message);
    }

    if ctx.config.discovery_click {
        let page = ctx.page.clone();
        if let Some(snapshot) = ctx
            .inventory
            .capture(page.as_ref(), "ui_inventory_auto_advance")
            .await
        {
            let hints = LocatorHints {
                text: Some("Weiter".into()),
                ..Default::default()
            };
            let found = discovery_click(page, &hints, &snapshot, MAX_ATTEMPTS, &timeouts).await;
            ctx.adopt(found.page);
            ctx.drain_network().await;
            if found.success {
                return AdvanceOutcome::new(true, format!("auto-advance: {}", found.message));
            }
        }
    }
    AdvanceOutcome::new(false, "auto-advance: Next Step CTA not found/enabled")
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

    #[tokio::test]
    async fn test_skips_outside_ecom() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/de1/konfigurator.html"));
        mock.add(MockElement::new("div").test_id("summary-finance-wrapper"));
        let mut ctx = context(temp.path(), mock);
        let outcome = auto_advance(&mut ctx).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, "auto-advance: not on eCom/checkout page");
    }

    #[tokio::test]
    async fn test_clicks_next_step_until_gone() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/de1/checkout/personal"));
        let input = mock.add(MockElement::input("text").label("Vorname"));
        let next = input + 1;
        mock.add(
            MockElement::button("Weiter")
                .test_id("cta-next-step")
                .on_click(ClickEffect::Navigate(
                    "https://shop.example/de1/checkout/summary".into(),
                ))
                .on_click(ClickEffect::Hide(next)),
        );

        let mut ctx = context(temp.path(), mock.clone());
        let outcome = auto_advance(&mut ctx).await;
        assert!(outcome.ok, "{}", outcome.message);
        assert_eq!(outcome.message, "auto-advance: clicked 1x; url changed");
        assert_eq!(mock.click_count(next), 1);
        assert_eq!(mock.fills(), vec![(input, "John".to_string())]);
    }

    #[tokio::test]
    async fn test_reports_missing_cta() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockPage::new("https://shop.example/de1/checkout"));
        let mut ctx = context(temp.path(), mock);
        ctx.config.auto_fill = false;
        let outcome = auto_advance(&mut ctx).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, "auto-advance: Next Step CTA not found/enabled");
        assert!(temp.path().join("run/ui_inventory_auto_advance.json").exists());
    }
}
