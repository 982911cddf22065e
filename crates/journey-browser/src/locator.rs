//! Locator resolution from charter hints
//!
//! Strategies run in a fixed priority order; the first strategy with at least
//! one match wins and its first match is used. Each sub-query is tried in the
//! main document, then in every child frame in document order. A miss is
//! `Ok(None)`, never an error.

use crate::page::{ElementQuery, ElementTarget, FrameRef, Page, TextMatch};
use journey_core::{LocatorHints, ResolvedLocator, Result};
use tracing::debug;

/// A resolved element and how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// 1-based priority of the winning strategy
    pub strategy: u8,
    pub target: ElementTarget,
    pub description: String,
}

impl Resolution {
    pub fn locator(&self) -> ResolvedLocator {
        ResolvedLocator {
            strategy: self.strategy,
            description: self.description.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Structural path hints from snapshot tools may end in a text-node marker
fn clean_node_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let cleaned = trimmed.strip_suffix("#text").unwrap_or(trimmed);
    let cleaned = cleaned.trim_end_matches('#').trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Ordered `(strategy, query)` candidates for the given hints
pub fn candidate_queries(hints: &LocatorHints) -> Vec<(u8, ElementQuery)> {
    let mut out = Vec::new();

    if let Some(path) = hints.node_path.as_deref().and_then(clean_node_path) {
        out.push((1, ElementQuery::ClickableAncestor { selector: path }));
    }

    if let Some(selector) = non_empty(&hints.selector) {
        out.push((2, ElementQuery::css(selector)));
    }

    if let Some(test_id) = hints.usable_test_id() {
        out.push((3, ElementQuery::test_id(test_id)));
    }

    if let Some(label) = non_empty(&hints.aria_label) {
        out.push((4, ElementQuery::aria_label(TextMatch::Exact(label.to_string()))));
        out.push((4, ElementQuery::aria_label(TextMatch::Contains(label.to_string()))));
    }

    if let (Some(role), Some(name)) = (non_empty(&hints.role), non_empty(&hints.name)) {
        out.push((
            5,
            ElementQuery::role(role, Some(TextMatch::Contains(name.to_string()))),
        ));
    }

    if let Some(text) = non_empty(&hints.text) {
        out.push((6, ElementQuery::role("link", Some(TextMatch::Exact(text.to_string())))));
        out.push((6, ElementQuery::role("button", Some(TextMatch::Exact(text.to_string())))));
        out.push((6, ElementQuery::text(TextMatch::Exact(text.to_string()))));
        out.push((6, ElementQuery::text(TextMatch::Contains(text.to_string()))));
    }

    if let Some(value) = non_empty(&hints.value) {
        out.push((7, ElementQuery::aria_label(TextMatch::Exact(value.to_string()))));
        out.push((7, ElementQuery::aria_label(TextMatch::Contains(value.to_string()))));
        out.push((7, ElementQuery::text(TextMatch::Exact(value.to_string()))));
        out.push((7, ElementQuery::text(TextMatch::Contains(value.to_string()))));
    }

    out
}

/// First frame (main, then children) in which `query` matches
pub async fn first_match(page: &dyn Page, query: &ElementQuery) -> Result<Option<ElementTarget>> {
    let mut frames = vec![FrameRef::Main];
    frames.extend((0..page.frame_count().await?).map(FrameRef::Child));

    for frame in frames {
        // Broken selectors or detached frames count as no match
        let count = match page.count(frame, query).await {
            Ok(count) => count,
            Err(e) => {
                debug!("Query {} failed in {:?}, treating as no match: {}", query, frame, e);
                0
            }
        };
        if count > 0 {
            return Ok(Some(ElementTarget {
                frame,
                query: query.clone(),
                nth: 0,
            }));
        }
    }
    Ok(None)
}

/// Resolve hints against the current page
pub async fn resolve(page: &dyn Page, hints: &LocatorHints) -> Result<Option<Resolution>> {
    for (strategy, query) in candidate_queries(hints) {
        debug!("Trying locator strategy {}: {}", strategy, query);
        if let Some(target) = first_match(page, &query).await? {
            let description = query.to_string();
            debug!("Resolved via strategy {}: {}", strategy, description);
            return Ok(Some(Resolution {
                strategy,
                target,
                description,
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};

    fn hints_text(text: &str) -> LocatorHints {
        LocatorHints {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_path_cleanup() {
        assert_eq!(clean_node_path("div > span#text"), Some("div > span".into()));
        assert_eq!(clean_node_path("  #text "), None);
        assert_eq!(clean_node_path("button#"), Some("button".into()));
    }

    #[test]
    fn test_placeholder_test_id_is_skipped() {
        let hints = LocatorHints {
            test_id: Some("placeholder-testid".into()),
            ..Default::default()
        };
        assert!(candidate_queries(&hints).is_empty());
    }

    #[tokio::test]
    async fn test_text_hint_prefers_role_button() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::new("span").text("Weiter"));
        let button = page.add(MockElement::button("Weiter"));

        let resolution = resolve(&page, &hints_text("Weiter")).await.unwrap().unwrap();
        assert_eq!(resolution.strategy, 6);
        assert_eq!(resolution.description, "role=button name=Weiter");

        let info = page.inspect(&resolution.target).await.unwrap().unwrap();
        assert_eq!(info.tag, "button");
        assert_eq!(page.element(button).unwrap().tag, "button");
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Weiter"));
        page.add(MockElement::link("Weiter", "/next"));
        let hints = hints_text("Weiter");
        let first = resolve(&page, &hints).await.unwrap();
        let second = resolve(&page, &hints).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.unwrap().description, "role=link name=Weiter");
    }

    #[tokio::test]
    async fn test_test_id_beats_text() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Weiter").test_id("cta-next-step"));
        let hints = LocatorHints {
            test_id: Some("cta-next-step".into()),
            text: Some("Weiter".into()),
            ..Default::default()
        };
        let resolution = resolve(&page, &hints).await.unwrap().unwrap();
        assert_eq!(resolution.strategy, 3);
    }

    #[tokio::test]
    async fn test_aria_label_substring_fallback() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("").attr("aria-label", "Alle akzeptieren und weiter"));
        let hints = LocatorHints {
            aria_label: Some("alle akzeptieren".into()),
            ..Default::default()
        };
        let resolution = resolve(&page, &hints).await.unwrap().unwrap();
        assert_eq!(resolution.strategy, 4);
        assert!(matches!(
            resolution.target.query,
            ElementQuery::AriaLabel {
                matcher: TextMatch::Contains(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_child_frame_is_searched_after_main() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Zustimmen").in_frame(1));
        let resolution = resolve(&page, &hints_text("Zustimmen")).await.unwrap().unwrap();
        assert_eq!(resolution.target.frame, FrameRef::Child(0));
    }

    #[tokio::test]
    async fn test_detached_frame_is_skipped() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Zustimmen").in_frame(1));
        page.add(MockElement::button("Zustimmen").in_frame(2));
        page.detach_frame(0);
        let resolution = resolve(&page, &hints_text("Zustimmen")).await.unwrap().unwrap();
        assert_eq!(resolution.target.frame, FrameRef::Child(1));

        page.detach_frame(1);
        assert!(resolve(&page, &hints_text("Zustimmen")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_value_fallback_and_miss() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::new("div").text("Abholung beim Händler"));
        let hints = LocatorHints {
            value: Some("Abholung".into()),
            ..Default::default()
        };
        let resolution = resolve(&page, &hints).await.unwrap().unwrap();
        assert_eq!(resolution.strategy, 7);
        assert_eq!(resolution.description, "text~=Abholung");

        assert!(resolve(&page, &hints_text("Nicht da")).await.unwrap().is_none());
    }
}
