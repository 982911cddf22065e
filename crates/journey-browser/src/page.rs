//! The `Page` seam: everything the engine needs from a browser tab
//!
//! Element lookups are expressed as typed [`ElementQuery`] values so the
//! resolver, the intents and the inventory exporter never build engine-specific
//! selector strings. The Chrome implementation translates queries into an
//! injected script; [`crate::mock::MockPage`] evaluates them in memory.

use async_trait::async_trait;
use journey_core::{RawNetworkEvent, Result, UiInventoryItem, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Shared handle to the active page; swapped when a click opens a new tab
pub type PageHandle = Arc<dyn Page>;

/// Callback fed with raw request/response events
pub type NetworkSink = Arc<dyn Fn(RawNetworkEvent) + Send + Sync>;

/// Main document or one of the same-origin child frames, in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRef {
    Main,
    Child(usize),
}

impl FrameRef {
    /// Index into `[main, child0, child1, ...]`
    pub fn root_index(&self) -> usize {
        match self {
            FrameRef::Main => 0,
            FrameRef::Child(i) => i + 1,
        }
    }
}

/// Text comparison used by label, role-name and text queries
///
/// Whitespace is collapsed before comparing. `Exact` is case-sensitive,
/// `Contains` and `Regex` are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMatch {
    Exact(String),
    Contains(String),
    Regex(String),
}

impl TextMatch {
    pub fn is_match(&self, candidate: &str) -> bool {
        let value = normalize_ws(candidate);
        match self {
            TextMatch::Exact(expected) => value == normalize_ws(expected),
            TextMatch::Contains(needle) => value
                .to_lowercase()
                .contains(&normalize_ws(needle).to_lowercase()),
            TextMatch::Regex(pattern) => regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(&value))
                .unwrap_or(false),
        }
    }
}

impl std::fmt::Display for TextMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextMatch::Exact(s) => write!(f, "{}", s),
            TextMatch::Contains(s) => write!(f, "~{}", s),
            TextMatch::Regex(s) => write!(f, "/{}/i", s),
        }
    }
}

/// Collapse runs of whitespace and trim
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Engine-neutral element query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementQuery {
    /// CSS selector, verbatim
    Css { selector: String },
    /// CSS selector, each match climbed to its nearest `button`/`a`
    /// ancestor-or-self
    ClickableAncestor { selector: String },
    TestId { value: String },
    AriaLabel { matcher: TextMatch },
    /// Semantic role (explicit or implicit) with an optional accessible name
    Role {
        role: String,
        name: Option<TextMatch>,
    },
    /// Innermost elements whose visible text matches
    Text { matcher: TextMatch },
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        ElementQuery::Css {
            selector: selector.into(),
        }
    }

    pub fn test_id(value: impl Into<String>) -> Self {
        ElementQuery::TestId {
            value: value.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: Option<TextMatch>) -> Self {
        ElementQuery::Role {
            role: role.into(),
            name,
        }
    }

    pub fn text(matcher: TextMatch) -> Self {
        ElementQuery::Text { matcher }
    }

    pub fn aria_label(matcher: TextMatch) -> Self {
        ElementQuery::AriaLabel { matcher }
    }
}

impl std::fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementQuery::Css { selector } => write!(f, "{}", selector),
            ElementQuery::ClickableAncestor { selector } => write!(f, "mcp:{}", selector),
            ElementQuery::TestId { value } => write!(f, "[data-testid=\"{}\"]", value),
            ElementQuery::AriaLabel {
                matcher: TextMatch::Exact(s),
            } => write!(f, "[aria-label=\"{}\"]", s),
            ElementQuery::AriaLabel {
                matcher: TextMatch::Contains(s),
            } => write!(f, "[aria-label*=\"{}\" i]", s),
            ElementQuery::AriaLabel { matcher } => write!(f, "[aria-label~={}]", matcher),
            ElementQuery::Role { role, name: Some(n) } => write!(f, "role={} name={}", role, n),
            ElementQuery::Role { role, name: None } => write!(f, "role={}", role),
            ElementQuery::Text {
                matcher: TextMatch::Exact(s),
            } => write!(f, "text={}", s),
            ElementQuery::Text {
                matcher: TextMatch::Contains(s),
            } => write!(f, "text~={}", s),
            ElementQuery::Text { matcher } => write!(f, "text={}", matcher),
        }
    }
}

/// A concrete element: the `nth` match of `query` inside `frame`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub frame: FrameRef,
    pub query: ElementQuery,
    pub nth: usize,
}

impl ElementTarget {
    /// First match in the main document
    pub fn first(query: ElementQuery) -> Self {
        Self {
            frame: FrameRef::Main,
            query,
            nth: 0,
        }
    }

    pub fn nth(query: ElementQuery, nth: usize) -> Self {
        Self {
            frame: FrameRef::Main,
            query,
            nth,
        }
    }
}

/// Viewport-relative box in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Horizontal scroll state of a container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_left: f64,
    pub scroll_width: f64,
    pub client_width: f64,
}

impl ScrollMetrics {
    pub fn overflows(&self) -> bool {
        self.scroll_width > self.client_width + 1.0
    }
}

/// Snapshot of a single element's observable state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub attributes: BTreeMap<String, String>,
    pub bbox: Option<BoundingBox>,
}

impl ElementInfo {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Disabled via attribute, ARIA or a `disabled`-ish class name
    pub fn looks_deactivated(&self) -> bool {
        !self.enabled
            || self.attributes.contains_key("disabled")
            || self.attr("aria-disabled") == Some("true")
            || self
                .attr("class")
                .map(|c| {
                    let c = c.to_lowercase();
                    c.contains("disabled") || c.contains("inactive")
                })
                .unwrap_or(false)
    }
}

/// Result of a click; carries the new page when one opened
#[derive(Clone, Default)]
pub struct ClickOutcome {
    pub new_page: Option<PageHandle>,
}

impl std::fmt::Debug for ClickOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickOutcome")
            .field("new_page", &self.new_page.is_some())
            .finish()
    }
}

/// Option of a `<select>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub disabled: bool,
}

/// Visible form control as seen by auto-fill and form snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub label: String,
    /// Label, placeholder, autocomplete, name, id, test id and type joined
    pub hint: String,
    pub autocomplete: String,
    pub pattern: String,
    pub test_id: String,
    pub name: String,
    pub id: String,
    /// Stable CSS selector (test id, id or name), empty when none exists
    pub selector: String,
    pub value: String,
    pub checked: Option<bool>,
    pub options: Vec<SelectOption>,
}

/// A browser tab as seen by the engine
#[async_trait]
pub trait Page: Send + Sync {
    async fn url(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    /// Full document markup
    async fn content(&self) -> Result<String>;
    /// Number of reachable child frames
    async fn frame_count(&self) -> Result<usize>;
    async fn count(&self, frame: FrameRef, query: &ElementQuery) -> Result<usize>;
    /// `None` when the target no longer matches anything
    async fn inspect(&self, target: &ElementTarget) -> Result<Option<ElementInfo>>;
    async fn click(&self, target: &ElementTarget) -> Result<ClickOutcome>;
    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<()>;
    async fn check(&self, target: &ElementTarget) -> Result<()>;
    async fn select_option(&self, target: &ElementTarget, value: &str) -> Result<()>;
    async fn press_enter(&self, target: &ElementTarget) -> Result<()>;
    async fn scroll_into_view(&self, target: &ElementTarget) -> Result<()>;
    async fn scroll_metrics(&self, target: &ElementTarget) -> Result<Option<ScrollMetrics>>;
    /// Scroll the document vertically
    async fn scroll_by(&self, dy: f64) -> Result<()>;
    async fn viewport(&self) -> Result<Viewport>;
    async fn set_viewport(&self, viewport: Viewport) -> Result<()>;
    /// Visible interactive elements with structural paths, unscored
    async fn interactive_elements(&self) -> Result<Vec<UiInventoryItem>>;
    async fn form_fields(&self) -> Result<Vec<FormField>>;
    /// Visible validation/alert texts
    async fn ui_alerts(&self) -> Result<Vec<String>>;
    async fn ready_state_complete(&self) -> Result<bool>;
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;
    async fn goto(&self, url: &str) -> Result<()>;
    async fn reload(&self) -> Result<()>;
    /// Start forwarding raw network events to `sink`
    fn observe_network(&self, sink: NetworkSink) -> Result<()>;
}

/// Poll `probe` until it yields `true` or `timeout` elapses
///
/// The probe always runs at least once, so a zero timeout is a single check.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval.max(Duration::from_millis(1))).await;
    }
}

/// Wait for the target to exist and be visible
pub async fn wait_visible(
    page: &dyn Page,
    target: &ElementTarget,
    timeout: Duration,
    interval: Duration,
) -> bool {
    poll_until(timeout, interval, move || async move {
        matches!(page.inspect(target).await, Ok(Some(info)) if info.visible)
    })
    .await
}

/// First visible match among `queries` (main document), with the query used
pub async fn first_visible(
    page: &dyn Page,
    queries: &[ElementQuery],
    timeout: Duration,
    interval: Duration,
) -> Option<(ElementTarget, ElementInfo)> {
    for query in queries {
        let count = page.count(FrameRef::Main, query).await.unwrap_or(0);
        if count == 0 {
            continue;
        }
        let target = ElementTarget::first(query.clone());
        if wait_visible(page, &target, timeout, interval).await {
            if let Ok(Some(info)) = page.inspect(&target).await {
                return Some((target, info));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_match_semantics() {
        assert!(TextMatch::Exact("Weiter".into()).is_match("  Weiter \n"));
        assert!(!TextMatch::Exact("Weiter".into()).is_match("weiter"));
        assert!(TextMatch::Contains("online".into()).is_match("Jetzt Online leasen"));
        assert!(TextMatch::Regex("Weiter|Next Step".into()).is_match("next step"));
        assert!(!TextMatch::Regex("(".into()).is_match("("));
    }

    #[test]
    fn test_query_display_matches_locator_descriptions() {
        assert_eq!(
            ElementQuery::role("button", Some(TextMatch::Exact("Weiter".into()))).to_string(),
            "role=button name=Weiter"
        );
        assert_eq!(
            ElementQuery::test_id("cta-next-step").to_string(),
            "[data-testid=\"cta-next-step\"]"
        );
    }

    #[test]
    fn test_query_serializes_tagged() {
        let json = serde_json::to_value(ElementQuery::aria_label(TextMatch::Contains("x".into())))
            .unwrap();
        assert_eq!(json["kind"], "aria_label");
        assert_eq!(json["matcher"]["contains"], "x");
    }

    #[test]
    fn test_deactivated_heuristics() {
        let mut info = ElementInfo {
            enabled: true,
            ..Default::default()
        };
        assert!(!info.looks_deactivated());
        info.attributes.insert("class".into(), "tab tab--disabled".into());
        assert!(info.looks_deactivated());
    }

    #[tokio::test]
    async fn test_poll_until_zero_timeout_checks_once() {
        let mut calls = 0;
        let ok = poll_until(Duration::ZERO, Duration::ZERO, || {
            calls += 1;
            async { false }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls, 1);
    }
}
