//! Page guards shared by the orchestrator and the intents
//!
//! Cookie banners, error pages, settling after navigation and the handful of
//! page-shape heuristics the checkout journey relies on.

use crate::page::{
    first_visible, poll_until, ElementQuery, ElementTarget, Page, TextMatch,
};
use journey_core::{JourneyError, Result, Timeouts};
use std::time::Duration;
use tracing::{debug, info};

/// Anchors that mean "something meaningful rendered"
pub fn stabilize_anchors() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("summary-finance-wrapper"),
        ElementQuery::test_id("nav-bar"),
        ElementQuery::test_id("form-wrapper"),
        ElementQuery::test_id("forms-group-container"),
        ElementQuery::test_id("cta-next-step"),
        ElementQuery::css("body"),
    ]
}

/// Accept-all controls of the consent managers seen on the target sites
pub fn cookie_accept_queries() -> Vec<ElementQuery> {
    let button_containing =
        |name: &str| ElementQuery::role("button", Some(TextMatch::Contains(name.to_string())));
    vec![
        ElementQuery::css("#customButton"),
        ElementQuery::css("#ensNotifyBanner #customButton"),
        ElementQuery::css("button#customButton"),
        button_containing("Zustimmen und weiter"),
        ElementQuery::aria_label(TextMatch::Contains("Alle akzeptieren".into())),
        ElementQuery::aria_label(TextMatch::Contains("Accept all".into())),
        button_containing("Alle akzeptieren"),
        button_containing("Accept All"),
        ElementQuery::css("#uc-btn-accept-all"),
    ]
}

/// Error page labels and the lowercase needles that identify them
const ERROR_PAGES: [(&str, &[&str]); 3] = [
    (
        "401 Unauthorized",
        &["401 unauthorized", "http status 401", "unauthorized"],
    ),
    ("403 Forbidden", &["403 forbidden", "http status 403", "forbidden"]),
    ("404 Not Found", &["404 not found", "http status 404"]),
];

const ECOM_URL_NEEDLES: [&str; 4] = ["checkout", "ecom", "order", "bestellung"];

const ECOM_CONTENT_NEEDLES: [&str; 5] = [
    "persönliche daten",
    "personal data",
    "next step",
    "nächster schritt",
    "weiter",
];

/// Wait for `document.readyState === "complete"`, then the settle delay
pub async fn settle(page: &dyn Page, timeouts: &Timeouts) {
    let ready = poll_until(timeouts.navigation(), timeouts.poll(), move || async move {
        page.ready_state_complete().await.unwrap_or(false)
    })
    .await;
    if !ready {
        debug!("Page did not reach readyState=complete in time");
    }
    if !timeouts.settle().is_zero() {
        tokio::time::sleep(timeouts.settle()).await;
    }
}

/// Best-effort stabilization before evidence screenshots
pub async fn stabilize(page: &dyn Page, timeouts: &Timeouts) {
    settle(page, timeouts).await;
    if first_visible(page, &stabilize_anchors(), timeouts.element(), timeouts.poll())
        .await
        .is_none()
    {
        debug!("No stabilization anchor became visible");
    }
}

/// Accept a cookie banner if one is showing
///
/// Returns `true` when a banner button was clicked.
pub async fn handle_cookie_banner(page: &dyn Page, timeouts: &Timeouts) -> Result<bool> {
    debug!("Checking for cookie banners");
    let Some((target, _)) =
        first_visible(page, &cookie_accept_queries(), Duration::ZERO, timeouts.poll()).await
    else {
        debug!("No cookie banner found");
        return Ok(false);
    };

    info!("Accepting cookie banner via {}", target.query);
    page.click(&target).await?;

    let banner = ElementTarget::first(ElementQuery::css("#ensNotifyBanner"));
    if page.inspect(&banner).await?.is_some() {
        let banner = &banner;
        poll_until(timeouts.element(), timeouts.poll(), move || async move {
            !matches!(page.inspect(banner).await, Ok(Some(info)) if info.visible)
        })
        .await;
    } else if !timeouts.settle().is_zero() {
        tokio::time::sleep(timeouts.settle()).await;
    }
    Ok(true)
}

/// Match title + markup against the known error pages
pub fn detect_error_page(title: &str, content: &str) -> Option<&'static str> {
    let title = title.to_lowercase();
    let content = content.to_lowercase();
    ERROR_PAGES
        .iter()
        .find(|(_, needles)| {
            needles
                .iter()
                .any(|n| title.contains(n) || content.contains(n))
        })
        .map(|(label, _)| *label)
}

/// `Err(ErrorPage)` when the page is a known error page
pub async fn check_for_error_page(page: &dyn Page) -> Result<()> {
    let title = page.title().await?;
    let content = page.content().await?;
    match detect_error_page(&title, &content) {
        Some(label) => Err(JourneyError::ErrorPage(label.to_string())),
        None => Ok(()),
    }
}

/// Open the configurator's summary section so its CTAs render
pub async fn ensure_summary_open(page: &dyn Page, timeouts: &Timeouts) -> bool {
    let queries = [
        ElementQuery::test_id("stepnavigation-summary"),
        ElementQuery::css("button[aria-label=\"Zusammenfassung\"]"),
        ElementQuery::role("button", Some(TextMatch::Contains("Zusammenfassung".into()))),
    ];
    for query in queries {
        let target = ElementTarget::first(query);
        let Ok(Some(info)) = page.inspect(&target).await else {
            continue;
        };
        if !info.visible {
            continue;
        }
        if page.scroll_into_view(&target).await.is_err() || page.click(&target).await.is_err() {
            continue;
        }
        debug!("Summary opened via {}", target.query);
        settle(page, timeouts).await;
        return true;
    }
    false
}

/// Heuristic: eCom journey page rather than the configurator
pub async fn is_likely_ecom_page(page: &dyn Page) -> bool {
    let url = page.url().await.unwrap_or_default().to_lowercase();
    if ECOM_URL_NEEDLES.iter().any(|n| url.contains(n)) {
        return true;
    }
    let summary = ElementQuery::test_id("summary-finance-wrapper");
    if page
        .count(crate::page::FrameRef::Main, &summary)
        .await
        .unwrap_or(0)
        > 0
    {
        return false;
    }
    let content = page.content().await.unwrap_or_default().to_lowercase();
    ECOM_CONTENT_NEEDLES.iter().any(|n| content.contains(n))
}

/// Description of the first query that becomes visible
pub async fn assert_visible_any(
    page: &dyn Page,
    queries: &[ElementQuery],
    timeouts: &Timeouts,
) -> Option<String> {
    first_visible(page, queries, timeouts.element(), timeouts.poll())
        .await
        .map(|(target, _)| target.query.to_string())
}

/// Visible `role=button` whose name matches `pattern` (case-insensitive)
pub async fn role_button_matching(
    page: &dyn Page,
    pattern: &str,
    timeouts: &Timeouts,
) -> Option<String> {
    let query = ElementQuery::role("button", Some(TextMatch::Regex(pattern.to_string())));
    first_visible(page, &[query], timeouts.element(), timeouts.poll())
        .await
        .map(|_| format!("role=button name=/{}/i", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ClickEffect, MockElement, MockPage};

    #[test]
    fn test_detect_error_page() {
        assert_eq!(
            detect_error_page("HTTP Status 404", "<h1>HTTP Status 404 – Not Found</h1>"),
            Some("404 Not Found")
        );
        assert_eq!(detect_error_page("Forbidden", ""), Some("403 Forbidden"));
        assert_eq!(detect_error_page("Konfigurator", "<div>error</div>"), None);
    }

    #[tokio::test]
    async fn test_check_for_error_page_raises() {
        let page = MockPage::new("https://shop.example/");
        page.set_title("401 Unauthorized");
        let err = check_for_error_page(&page).await.unwrap_err();
        assert!(err.is_error_page());
        assert_eq!(err.to_string(), "Critical Error: Detected '401 Unauthorized' page");
    }

    #[tokio::test]
    async fn test_cookie_banner_clicks_first_visible() {
        let page = MockPage::new("https://shop.example/");
        let banner = page.add(MockElement::new("div").attr("id", "ensNotifyBanner"));
        let hidden = page.add(MockElement::button("x").attr("id", "customButton").hidden());
        let accept = page.add(
            MockElement::button("Zustimmen und weiter")
                .child_of(banner)
                .on_click(ClickEffect::Hide(banner)),
        );
        assert!(handle_cookie_banner(&page, &Timeouts::immediate()).await.unwrap());
        assert_eq!(page.clicks(), vec![accept]);
        assert_eq!(page.click_count(hidden), 0);
        assert!(!page.element(banner).unwrap().visible);
    }

    #[tokio::test]
    async fn test_no_cookie_banner() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Weiter"));
        assert!(!handle_cookie_banner(&page, &Timeouts::immediate()).await.unwrap());
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_ecom_heuristics() {
        let page = MockPage::new("https://shop.example/de/checkout/personal");
        assert!(is_likely_ecom_page(&page).await);

        let configurator = MockPage::new("https://shop.example/de/konfigurator");
        configurator.add(MockElement::new("div").test_id("summary-finance-wrapper").text("Weiter"));
        assert!(!is_likely_ecom_page(&configurator).await);

        let spa = MockPage::new("https://shop.example/de/app");
        spa.set_content("<h2>Persönliche Daten</h2>");
        assert!(is_likely_ecom_page(&spa).await);
    }

    #[tokio::test]
    async fn test_ensure_summary_open_clicks_visible_entry() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::new("div").test_id("stepnavigation-summary").hidden());
        let fallback = page.add(MockElement::button("Zusammenfassung anzeigen"));
        assert!(ensure_summary_open(&page, &Timeouts::immediate()).await);
        assert_eq!(page.clicks(), vec![fallback]);
    }

    #[tokio::test]
    async fn test_role_button_matching() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Nächster Schritt"));
        let found = role_button_matching(&page, "Weiter|Next Step|Nächster Schritt", &Timeouts::immediate()).await;
        assert_eq!(found.as_deref(), Some("role=button name=/Weiter|Next Step|Nächster Schritt/i"));
    }
}
