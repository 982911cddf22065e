//! Entering the checkout: `start_checkout` and `assert_checkout_loaded`

use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::discovery::{discovery_click, MAX_ATTEMPTS};
use journey_browser::guards::{
    assert_visible_any, check_for_error_page, ensure_summary_open, handle_cookie_banner,
    is_likely_ecom_page, role_button_matching, settle, stabilize,
};
use journey_browser::page::{first_visible, poll_until};
use journey_browser::{ElementQuery, ElementTarget, FrameRef, Page, PageHandle, TextMatch};
use journey_core::{redact_url, LocatorHints, Result};
use tracing::{debug, info};

const SUMMARY_WRAPPER: &str = "[data-testid=\"summary-finance-wrapper\"]";
const CART_ICON: &str = "[data-testid=\"icon-ShoppingCart\"]";
const CTA_TEXT: &str = "Online leasen";

/// Anchors that only render once the checkout journey is showing
pub fn checkout_anchors() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("nav-bar"),
        ElementQuery::test_id("form-wrapper"),
        ElementQuery::test_id("forms-group-container"),
        ElementQuery::test_id("mydealer-zero-state-info-button"),
    ]
}

pub(crate) const NEXT_STEP_PATTERN: &str = "Weiter|Next Step|Nächster Schritt";

async fn first_visible_nth(
    page: &dyn Page,
    query: ElementQuery,
    accept: impl Fn(&str) -> bool,
) -> Option<ElementTarget> {
    let count = page.count(FrameRef::Main, &query).await.unwrap_or(0);
    for nth in 0..count {
        let target = ElementTarget::nth(query.clone(), nth);
        if let Ok(Some(info)) = page.inspect(&target).await {
            if info.visible && accept(&info.text) {
                return Some(target);
            }
        }
    }
    None
}

/// Layered lookup of the "Online leasen" CTA in the summary panel
///
/// Wrapper + cart icon, then wrapper + button/link text, then any button or
/// link named like the CTA.
pub(crate) async fn find_checkout_cta(page: &dyn Page) -> Option<(ElementTarget, String)> {
    let icon_in_wrapper = ElementQuery::ClickableAncestor {
        selector: format!("{} {}", SUMMARY_WRAPPER, CART_ICON),
    };
    if let Some(target) = first_visible_nth(page, icon_in_wrapper, |_| true).await {
        return Some((target, format!("{} button:has({})", SUMMARY_WRAPPER, CART_ICON)));
    }

    let cta_text = TextMatch::Contains(CTA_TEXT.to_string());
    for tag in ["button", "a"] {
        let query = ElementQuery::css(format!("{} {}", SUMMARY_WRAPPER, tag));
        if let Some(target) = first_visible_nth(page, query, |text| cta_text.is_match(text)).await {
            return Some((
                target,
                format!("{} {}:has-text(\"{}\")", SUMMARY_WRAPPER, tag, CTA_TEXT),
            ));
        }
    }

    for role in ["button", "link"] {
        let query = ElementQuery::role(role, Some(cta_text.clone()));
        if let Some(target) = first_visible_nth(page, query, |_| true).await {
            return Some((target, format!("role={} name={}", role, CTA_TEXT)));
        }
    }
    None
}

pub(crate) async fn start_checkout(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
) -> Result<IntentOutcome> {
    ensure_summary_open(page.as_ref(), ctx.timeouts).await;
    let before = redact_url(&page.url().await.unwrap_or_default());

    let Some((cta, used)) = find_checkout_cta(page.as_ref()).await else {
        info!("Checkout CTA not found, trying discovery");
        let snapshot = ctx
            .snapshot(page.as_ref(), "ui_inventory_intent_start_checkout")
            .await
            .unwrap_or_default();
        let hints = LocatorHints {
            text: Some(CTA_TEXT.to_string()),
            ..Default::default()
        };
        let click = discovery_click(page, &hints, &snapshot, MAX_ATTEMPTS, ctx.timeouts).await;
        if click.success {
            return Ok(IntentOutcome::warn(
                click.page,
                format!("intent start_checkout: {}", click.message),
            ));
        }
        return Ok(IntentOutcome::fail(
            click.page,
            "intent start_checkout: CTA not found (expected under data-testid=summary-finance-wrapper)",
        ));
    };

    if let Err(e) = page.scroll_into_view(&cta).await {
        debug!("Could not scroll checkout CTA into view: {}", e);
    }
    let clicked = page.click(&cta).await?;
    let opened = clicked.new_page.is_some();
    let page = clicked.new_page.unwrap_or(page);
    info!("Checkout CTA clicked via {} (new page: {})", used, opened);

    settle(page.as_ref(), ctx.timeouts).await;
    {
        let page = page.as_ref();
        poll_until(ctx.timeouts.navigation(), ctx.timeouts.poll(), move || async move {
            page.url()
                .await
                .map(|u| u.to_lowercase().contains("checkout.html"))
                .unwrap_or(false)
        })
        .await;
    }
    if let Err(e) = handle_cookie_banner(page.as_ref(), ctx.timeouts).await {
        debug!("Cookie banner handling failed after checkout click: {}", e);
    }
    if let Err(e) = check_for_error_page(page.as_ref()).await {
        return Ok(IntentOutcome::fail(page, e.to_string()));
    }
    stabilize(page.as_ref(), ctx.timeouts).await;
    if first_visible(
        page.as_ref(),
        &checkout_anchors(),
        ctx.timeouts.navigation(),
        ctx.timeouts.poll(),
    )
    .await
    .is_none()
    {
        debug!("No checkout anchor visible after CTA click");
    }

    let after = redact_url(&page.url().await.unwrap_or_default());
    if opened {
        return Ok(IntentOutcome::pass(
            page,
            format!("intent start_checkout: clicked via {} (new page opened)", used),
        ));
    }
    if !after.is_empty() && after != before {
        return Ok(IntentOutcome::pass(
            page,
            format!("intent start_checkout: clicked via {} (url changed)", used),
        ));
    }
    let ecom = {
        let page = page.as_ref();
        poll_until(ctx.timeouts.action(), ctx.timeouts.poll(), move || async move {
            is_likely_ecom_page(page).await
        })
        .await
    };
    if ecom {
        return Ok(IntentOutcome::pass(
            page,
            format!(
                "intent start_checkout: clicked via {} (SPA transition, eCom markers found)",
                used
            ),
        ));
    }
    Ok(IntentOutcome::fail(
        page,
        format!(
            "intent start_checkout: clicked via {} but no new page, url change or eCom markers",
            used
        ),
    ))
}

pub(crate) async fn assert_checkout_loaded(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
) -> Result<IntentOutcome> {
    let url = page.url().await?.to_lowercase();
    if !url.contains("checkout.html") && !is_likely_ecom_page(page.as_ref()).await {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_checkout_loaded")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!(
                "intent assert_checkout_loaded: not on checkout page / eCom markers missing.{}",
                candidates
            ),
        ));
    }

    let anchor = match assert_visible_any(page.as_ref(), &checkout_anchors(), ctx.timeouts).await {
        Some(used) => Some(used),
        None => role_button_matching(page.as_ref(), NEXT_STEP_PATTERN, ctx.timeouts).await,
    };
    if let Some(used) = anchor {
        return Ok(IntentOutcome::pass(
            page,
            format!("intent assert_checkout_loaded: anchor visible ({})", used),
        ));
    }

    let candidates = ctx
        .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_checkout_loaded_anchors")
        .await;
    Ok(IntentOutcome::fail(
        page,
        format!(
            "intent assert_checkout_loaded: checkout opened but anchors not found.{}",
            candidates
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use journey_browser::mock::{ClickEffect, MockElement, MockPage};
    use journey_core::Verdict;
    use std::sync::Arc;

    const CONFIGURATOR: &str = "https://shop.example/de/konfigurator.html";

    fn configurator_with_cta(effect: ClickEffect) -> Arc<MockPage> {
        let page = Arc::new(MockPage::new(CONFIGURATOR));
        let wrapper = page.add(MockElement::new("div").test_id("summary-finance-wrapper"));
        let button = page.add(
            MockElement::button("Online leasen")
                .child_of(wrapper)
                .on_click(effect),
        );
        page.add(
            MockElement::new("span")
                .test_id("icon-ShoppingCart")
                .child_of(button),
        );
        page
    }

    #[tokio::test]
    async fn test_cta_found_via_cart_icon() {
        let page = configurator_with_cta(ClickEffect::SetContent(String::new()));
        let (target, used) = find_checkout_cta(page.as_ref()).await.unwrap();
        assert!(used.contains("icon-ShoppingCart"));
        assert_eq!(page.inspect(&target).await.unwrap().unwrap().tag, "button");
    }

    #[tokio::test]
    async fn test_cta_falls_back_to_role_name() {
        let page = MockPage::new(CONFIGURATOR);
        page.add(MockElement::link("Jetzt Online leasen", "/checkout"));
        let (_, used) = find_checkout_cta(&page).await.unwrap();
        assert_eq!(used, "role=link name=Online leasen");
    }

    #[tokio::test]
    async fn test_start_checkout_passes_on_url_change() {
        let page = configurator_with_cta(ClickEffect::Navigate(
            "https://shop.example/de/checkout.html?id=1".into(),
        ));
        let mut harness = Harness::new();
        let outcome = start_checkout(&mut harness.ctx(), page.clone()).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(outcome.message.contains("url changed"));
    }

    #[tokio::test]
    async fn test_start_checkout_adopts_new_page() {
        let checkout = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        let page = configurator_with_cta(ClickEffect::OpenPage(checkout));
        let mut harness = Harness::new();
        let outcome = start_checkout(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(outcome.message.contains("new page opened"));
        assert_eq!(
            outcome.page.url().await.unwrap(),
            "https://shop.example/de/checkout.html"
        );
    }

    #[tokio::test]
    async fn test_start_checkout_fails_without_any_transition() {
        let page = configurator_with_cta(ClickEffect::SetContent("<div>Konfigurator</div>".into()));
        let mut harness = Harness::new();
        let outcome = start_checkout(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_start_checkout_without_cta_fails() {
        let page = Arc::new(MockPage::new(CONFIGURATOR));
        let mut harness = Harness::new();
        let outcome = start_checkout(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.contains("CTA not found"));
    }

    #[tokio::test]
    async fn test_start_checkout_reports_error_page() {
        let forbidden = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        forbidden.set_title("403 Forbidden");
        let page = configurator_with_cta(ClickEffect::OpenPage(forbidden));
        let mut harness = Harness::new();
        let outcome = start_checkout(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.starts_with("Critical Error: Detected '403 Forbidden'"));
    }

    #[tokio::test]
    async fn test_assert_checkout_loaded() {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        page.add(MockElement::new("nav").test_id("nav-bar"));
        let mut harness = Harness::new();
        let outcome = assert_checkout_loaded(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(outcome.message.contains("nav-bar"));

        let page = Arc::new(MockPage::new(CONFIGURATOR));
        page.add(MockElement::new("div").test_id("summary-finance-wrapper"));
        let outcome = assert_checkout_loaded(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.contains("not on checkout page"));
    }

    #[tokio::test]
    async fn test_assert_checkout_loaded_accepts_next_step_button() {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        page.add(MockElement::button("Nächster Schritt"));
        let mut harness = Harness::new();
        let outcome = assert_checkout_loaded(&mut harness.ctx(), page).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(outcome.message.contains("role=button"));
    }
}
