//! Discovery and auto-repair clicks
//!
//! Fallbacks for when the resolver finds nothing: pick plausible clickable
//! candidates from an inventory snapshot and click them by structural path.
//! Both return the active page, which changes when a click opens a tab.

use crate::guards::settle;
use crate::inventory::{candidate_text, InventorySnapshot};
use crate::page::{ElementQuery, ElementTarget, PageHandle};
use journey_core::{redact_url, LocatorHints, Timeouts, UiInventoryItem};
use tracing::{debug, info};

/// Journey-progression vocabulary
pub const DISCOVERY_KEYWORDS: [&str; 8] = [
    "online",
    "leas",
    "leasing",
    "angebot",
    "weiter",
    "checkout",
    "konfigur",
    "zusammenfassung",
];

/// Click attempts per discovery run
pub const MAX_ATTEMPTS: usize = 6;

const MATCH_POOL: usize = 60;
const FALLBACK_POOL: usize = 12;

/// Result of a fallback click
pub struct FallbackClick {
    pub success: bool,
    pub message: String,
    /// Active page after the attempt
    pub page: PageHandle,
}

impl std::fmt::Debug for FallbackClick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackClick")
            .field("success", &self.success)
            .field("message", &self.message)
            .finish()
    }
}

/// Step hints first, then the domain vocabulary
pub fn discovery_keywords(hints: &LocatorHints) -> Vec<String> {
    let mut keywords = hints.target_phrases();
    keywords.extend(DISCOVERY_KEYWORDS.iter().map(|k| k.to_string()));
    keywords
}

fn matches_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}

/// Candidates in click order
pub fn discovery_candidates<'a>(
    snapshot: &'a InventorySnapshot,
    keywords: &[String],
) -> Vec<&'a UiInventoryItem> {
    let matching: Vec<_> = snapshot
        .top_candidates(MATCH_POOL)
        .into_iter()
        .filter(|item| matches_any(&item.haystack(), keywords))
        .collect();
    if matching.is_empty() {
        snapshot.top_candidates(FALLBACK_POOL)
    } else {
        matching
    }
}

async fn click_path(page: &PageHandle, css_path: &str) -> journey_core::Result<Option<PageHandle>> {
    let target = ElementTarget::first(ElementQuery::css(css_path));
    page.scroll_into_view(&target).await?;
    Ok(page.click(&target).await?.new_page)
}

/// Click ranked candidates until the journey visibly moves
///
/// Success is a URL change (strong) or a click on a keyword-matching
/// candidate (weak, SPA transitions often keep the URL).
pub async fn discovery_click(
    page: PageHandle,
    hints: &LocatorHints,
    snapshot: &InventorySnapshot,
    max_attempts: usize,
    timeouts: &Timeouts,
) -> FallbackClick {
    let before = redact_url(&page.url().await.unwrap_or_default());
    let keywords = discovery_keywords(hints);
    let mut page = page;
    let mut attempts = 0;

    for item in discovery_candidates(snapshot, &keywords) {
        if attempts >= max_attempts {
            break;
        }
        let css_path = item.css_path.trim();
        if css_path.is_empty() {
            continue;
        }
        attempts += 1;
        debug!("Discovery attempt {}: {}", attempts, css_path);

        let new_page = match click_path(&page, css_path).await {
            Ok(new_page) => new_page,
            Err(e) => {
                debug!("Discovery candidate failed: {}", e);
                continue;
            }
        };
        if let Some(new_page) = new_page {
            page = new_page;
        }
        settle(page.as_ref(), timeouts).await;

        let after = redact_url(&page.url().await.unwrap_or_default());
        if !after.is_empty() && after != before {
            info!("Discovery click changed url via {}", css_path);
            return FallbackClick {
                success: true,
                message: format!("discovery-click succeeded (url changed): {}", css_path),
                page,
            };
        }
        if matches_any(&item.haystack(), &keywords) {
            return FallbackClick {
                success: true,
                message: format!("discovery-click applied (no url change): {}", css_path),
                page,
            };
        }
    }

    FallbackClick {
        success: false,
        message: "discovery-click: no viable candidate succeeded".to_string(),
        page,
    }
}

/// Click the first clickable whose text/label/test id contains one of the
/// step's own target phrases; no domain vocabulary
pub async fn auto_repair_click(
    page: PageHandle,
    hints: &LocatorHints,
    snapshot: &InventorySnapshot,
    timeouts: &Timeouts,
) -> FallbackClick {
    let fail = |page: PageHandle, message: &str| FallbackClick {
        success: false,
        message: message.to_string(),
        page,
    };
    if snapshot.items.is_empty() {
        return fail(page, "empty inventory");
    }
    let targets = hints.target_phrases();
    if targets.is_empty() {
        return fail(page, "no target text/name");
    }

    for item in snapshot.items.iter().filter(|i| i.is_clickable()) {
        let css_path = item.css_path.trim();
        if css_path.is_empty() {
            continue;
        }
        let haystack = [
            Some(item.text.as_str()),
            item.aria_label.as_deref(),
            item.test_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
        if !matches_any(&haystack, &targets) {
            continue;
        }
        match click_path(&page, css_path).await {
            Ok(new_page) => {
                let page = new_page.unwrap_or(page);
                settle(page.as_ref(), timeouts).await;
                info!("Auto-repaired click via {} ({})", css_path, candidate_text(item));
                return FallbackClick {
                    success: true,
                    message: format!("auto-repaired click via cssPath='{}'", css_path),
                    page,
                };
            }
            Err(e) => debug!("Auto-repair candidate failed: {}", e),
        }
    }
    fail(page, "no matching clickable candidate in inventory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::snapshot;
    use crate::mock::{ClickEffect, MockElement, MockPage};
    use std::sync::Arc;

    fn hints_text(text: &str) -> LocatorHints {
        LocatorHints {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_keywords_put_step_phrases_first() {
        let keywords = discovery_keywords(&hints_text("Online Leasen"));
        assert_eq!(keywords[0], "online leasen");
        assert_eq!(keywords.len(), 1 + DISCOVERY_KEYWORDS.len());
    }

    #[tokio::test]
    async fn test_discovery_prefers_keyword_candidates() {
        let mock = Arc::new(MockPage::new("https://shop.example/de/konfigurator"));
        let imprint = mock.add(MockElement::button("Impressum").test_id("footer-imprint"));
        let lease = mock.add(
            MockElement::link("Jetzt online leasen", "/de/checkout")
                .on_click(ClickEffect::Navigate("https://shop.example/de/checkout".into())),
        );
        let snap = snapshot(mock.as_ref()).await.unwrap();

        let outcome = discovery_click(
            mock.clone(),
            &LocatorHints::default(),
            &snap,
            MAX_ATTEMPTS,
            &Timeouts::immediate(),
        )
        .await;
        assert!(outcome.success);
        assert!(outcome.message.contains("url changed"));
        assert_eq!(mock.click_count(lease), 1);
        assert_eq!(mock.click_count(imprint), 0);
    }

    #[tokio::test]
    async fn test_discovery_falls_back_to_top_clickables() {
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        mock.add(MockElement::button("Impressum"));
        let snap = snapshot(mock.as_ref()).await.unwrap();

        let outcome = discovery_click(
            mock.clone(),
            &hints_text("Gibt es nicht"),
            &snap,
            MAX_ATTEMPTS,
            &Timeouts::immediate(),
        )
        .await;
        assert!(!outcome.success);
        assert_eq!(mock.clicks().len(), 1);
    }

    #[tokio::test]
    async fn test_discovery_adopts_new_page() {
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        let popup = Arc::new(MockPage::new("https://shop.example/de/checkout"));
        mock.add(MockElement::button("Online leasen").on_click(ClickEffect::OpenPage(popup)));
        let snap = snapshot(mock.as_ref()).await.unwrap();

        let outcome = discovery_click(
            mock.clone(),
            &LocatorHints::default(),
            &snap,
            MAX_ATTEMPTS,
            &Timeouts::immediate(),
        )
        .await;
        assert!(outcome.success);
        assert_eq!(outcome.page.url().await.unwrap(), "https://shop.example/de/checkout");
    }

    #[tokio::test]
    async fn test_auto_repair_ignores_href_and_vocabulary() {
        let mock = Arc::new(MockPage::new("https://shop.example/"));
        mock.add(MockElement::link("Mehr", "/angebot-bearbeiten"));
        let target = mock.add(MockElement::button("").attr("aria-label", "Angebot bearbeiten"));
        let snap = snapshot(mock.as_ref()).await.unwrap();

        let outcome = auto_repair_click(
            mock.clone(),
            &hints_text("Angebot bearbeiten"),
            &snap,
            &Timeouts::immediate(),
        )
        .await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(mock.clicks(), vec![target]);

        let none = auto_repair_click(mock.clone(), &LocatorHints::default(), &snap, &Timeouts::immediate()).await;
        assert!(!none.success);
        assert_eq!(none.message, "no target text/name");
    }
}
