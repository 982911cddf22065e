//! Tab slider: presence with atomic sub-checks, tab navigation, active tab
//!
//! `arrows_functional` is the one check here allowed to fail on ambiguity: it
//! runs a forward/back click experiment and only a confirmed round trip
//! passes. When the slider does not overflow, the viewport is shrunk through
//! [`PROBE_WIDTHS`] to provoke overflow before giving up with a warning.

use crate::checkout::NEXT_STEP_PATTERN;
use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::guards::{assert_visible_any, role_button_matching, settle};
use journey_browser::page::{first_visible, ScrollMetrics};
use journey_browser::{ElementInfo, ElementQuery, ElementTarget, FrameRef, Page, PageHandle, TextMatch};
use journey_core::{AtomicCheck, AtomicCheckResult, IntentParams, Result, Timeouts, Viewport};
use tracing::{debug, info};

/// Viewport widths tried, in order, to make the slider overflow
pub const PROBE_WIDTHS: [u32; 6] = [1280, 1024, 768, 600, 480, 390];

/// Pixel movement below which the slider counts as unmoved
pub const MOVE_TOLERANCE_PX: f64 = 2.0;

const MAX_TABS: usize = 40;

fn slider_anchors() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("nav-bar"),
        ElementQuery::test_id("nav-bar-item"),
        ElementQuery::role("tablist", None),
        ElementQuery::role("tab", None),
        ElementQuery::css("[id^=navbar-tab-]"),
    ]
}

fn variant_anchors() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("form-wrapper"),
        ElementQuery::test_id("forms-group-container"),
        ElementQuery::test_id("mydealer-zero-state-info-button"),
    ]
}

fn tab_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("nav-bar-item"),
        ElementQuery::role("tab", None),
        ElementQuery::css("[id^=navbar-tab-]"),
    ]
}

fn container_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("nav-bar"),
        ElementQuery::role("tablist", None),
    ]
}

fn forward_arrow_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::css("[data-testid=\"nav-bar\"] [data-testid=\"nav-bar-arrow-right\"]"),
        ElementQuery::test_id("nav-bar-arrow-right"),
        ElementQuery::test_id("navbar-arrow-right"),
        ElementQuery::aria_label(TextMatch::Regex(
            "next|nächste|forward|right|rechts|scroll right".into(),
        )),
        ElementQuery::css("button[class*=\"arrow-right\"]"),
        ElementQuery::css("button[class*=\"arrow--right\"]"),
    ]
}

fn back_arrow_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::css("[data-testid=\"nav-bar\"] [data-testid=\"nav-bar-arrow-left\"]"),
        ElementQuery::test_id("nav-bar-arrow-left"),
        ElementQuery::test_id("navbar-arrow-left"),
        ElementQuery::aria_label(TextMatch::Regex(
            "prev|vorherig|zurück|back|left|links|scroll left".into(),
        )),
        ElementQuery::css("button[class*=\"arrow-left\"]"),
        ElementQuery::css("button[class*=\"arrow--left\"]"),
    ]
}

/// Visible tabs of the first tab query that matches anything
async fn collect_tabs(page: &dyn Page) -> Vec<(ElementTarget, ElementInfo)> {
    for query in tab_queries() {
        let count = page.count(FrameRef::Main, &query).await.unwrap_or(0);
        if count == 0 {
            continue;
        }
        let mut tabs = Vec::new();
        for nth in 0..count.min(MAX_TABS) {
            let target = ElementTarget::nth(query.clone(), nth);
            if let Ok(Some(info)) = page.inspect(&target).await {
                if info.visible {
                    tabs.push((target, info));
                }
            }
        }
        if !tabs.is_empty() {
            return tabs;
        }
    }
    Vec::new()
}

/// Selected/current markers, ignoring `inactive`-style class names
pub(crate) fn looks_active(info: &ElementInfo) -> bool {
    if info.attr("aria-selected") == Some("true") {
        return true;
    }
    if matches!(info.attr("aria-current"), Some(v) if v != "false") {
        return true;
    }
    info.attr("class")
        .map(|classes| {
            classes.split_whitespace().any(|token| {
                let token = token.to_lowercase();
                (token.ends_with("active") && !token.contains("inactive"))
                    || token.contains("selected")
                    || token.ends_with("current")
            })
        })
        .unwrap_or(false)
}

fn many_tabs(count: usize, params: &IntentParams, bullets_ask: bool) -> AtomicCheck {
    match params.min_tabs {
        Some(min) if count >= min as usize => AtomicCheck::pass(
            "many_tabs",
            format!("{} tabs observed (threshold {})", count, min),
        ),
        Some(min) => AtomicCheck::fail(
            "many_tabs",
            format!("{} tabs observed, below threshold {}", count, min),
        ),
        None => {
            let origin = if bullets_ask {
                "charter asks for 'many tabs'"
            } else {
                "tab count reported only"
            };
            AtomicCheck::warn(
                "many_tabs",
                format!(
                    "SPEC_REQUIRED: {} tabs observed; {} and no threshold was supplied",
                    count, origin
                ),
            )
        }
    }
}

fn deactivated_tabs(tabs: &[(ElementTarget, ElementInfo)]) -> AtomicCheck {
    let deactivated = tabs.iter().filter(|(_, info)| info.looks_deactivated()).count();
    if deactivated > 0 {
        AtomicCheck::pass(
            "deactivated_tabs",
            format!("{} of {} tabs look deactivated", deactivated, tabs.len()),
        )
    } else {
        AtomicCheck::warn(
            "deactivated_tabs",
            format!("no deactivated tab detected among {}", tabs.len()),
        )
    }
}

/// Where the slider content currently sits
#[derive(Debug, Clone, Copy, PartialEq)]
struct SliderPosition {
    scroll_left: Option<f64>,
    first_tab_x: Option<f64>,
}

impl SliderPosition {
    /// Largest movement on any axis both positions observed
    fn distance(&self, other: &SliderPosition) -> f64 {
        let diff = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => (a - b).abs(),
            _ => 0.0,
        };
        diff(self.scroll_left, other.scroll_left).max(diff(self.first_tab_x, other.first_tab_x))
    }
}

struct Slider {
    container: Option<ElementTarget>,
    first_tab: Option<ElementTarget>,
}

impl Slider {
    async fn locate(page: &dyn Page, tabs: &[(ElementTarget, ElementInfo)]) -> Self {
        let mut container = None;
        for query in container_queries() {
            let target = ElementTarget::first(query);
            if matches!(page.scroll_metrics(&target).await, Ok(Some(_))) {
                container = Some(target);
                break;
            }
        }
        Self {
            container,
            first_tab: tabs.first().map(|(target, _)| target.clone()),
        }
    }

    async fn metrics(&self, page: &dyn Page) -> Option<ScrollMetrics> {
        let container = self.container.as_ref()?;
        page.scroll_metrics(container).await.ok().flatten()
    }

    async fn overflows(&self, page: &dyn Page) -> bool {
        self.metrics(page).await.is_some_and(|m| m.overflows())
    }

    async fn position(&self, page: &dyn Page) -> SliderPosition {
        let first_tab_x = match &self.first_tab {
            Some(target) => page
                .inspect(target)
                .await
                .ok()
                .flatten()
                .and_then(|info| info.bbox)
                .map(|b| b.x),
            None => None,
        };
        SliderPosition {
            scroll_left: self.metrics(page).await.map(|m| m.scroll_left),
            first_tab_x,
        }
    }
}

/// Shrink the viewport until the slider overflows; returns the width that worked
async fn probe_overflow(
    page: &dyn Page,
    slider: &Slider,
    original: Viewport,
    timeouts: &Timeouts,
) -> Option<u32> {
    for width in PROBE_WIDTHS {
        if width >= original.width {
            continue;
        }
        let viewport = Viewport {
            width,
            height: original.height,
        };
        if let Err(e) = page.set_viewport(viewport).await {
            debug!("Viewport probe at {}px failed: {}", width, e);
            return None;
        }
        settle(page, timeouts).await;
        if slider.overflows(page).await {
            info!("Tab slider overflows at {}px viewport", width);
            return Some(width);
        }
    }
    None
}

async fn click_and_measure(
    page: &dyn Page,
    arrow: &ElementTarget,
    slider: &Slider,
    timeouts: &Timeouts,
) -> Result<SliderPosition> {
    page.click(arrow).await?;
    settle(page, timeouts).await;
    Ok(slider.position(page).await)
}

async fn arrow_round_trip(page: &dyn Page, slider: &Slider, timeouts: &Timeouts) -> AtomicCheck {
    const NAME: &str = "arrows_functional";

    let Some((forward, _)) =
        first_visible(page, &forward_arrow_queries(), timeouts.element(), timeouts.poll()).await
    else {
        return AtomicCheck::fail(NAME, "slider overflows but no forward arrow found");
    };
    let start = slider.position(page).await;
    let after_forward = match click_and_measure(page, &forward, slider, timeouts).await {
        Ok(position) => position,
        Err(e) => return AtomicCheck::fail(NAME, format!("forward arrow click failed: {}", e)),
    };
    let moved = start.distance(&after_forward);
    if moved <= MOVE_TOLERANCE_PX {
        return AtomicCheck::fail(
            NAME,
            format!("forward arrow ({}) clicked but slider did not move", forward.query),
        );
    }

    let Some((back, _)) =
        first_visible(page, &back_arrow_queries(), timeouts.element(), timeouts.poll()).await
    else {
        return AtomicCheck::fail(
            NAME,
            format!("forward moved {:.0}px but no back arrow found", moved),
        );
    };
    let after_back = match click_and_measure(page, &back, slider, timeouts).await {
        Ok(position) => position,
        Err(e) => return AtomicCheck::fail(NAME, format!("back arrow click failed: {}", e)),
    };
    let residual = start.distance(&after_back);
    if residual <= MOVE_TOLERANCE_PX {
        AtomicCheck::pass(
            NAME,
            format!(
                "round trip confirmed: forward moved {:.0}px, back returned within {}px",
                moved, MOVE_TOLERANCE_PX
            ),
        )
    } else {
        AtomicCheck::fail(
            NAME,
            format!(
                "forward moved {:.0}px but back click left the slider {:.0}px off its start",
                moved, residual
            ),
        )
    }
}

async fn arrows_functional(
    page: &dyn Page,
    tabs: &[(ElementTarget, ElementInfo)],
    timeouts: &Timeouts,
) -> AtomicCheck {
    let slider = Slider::locate(page, tabs).await;
    if slider.overflows(page).await {
        return arrow_round_trip(page, &slider, timeouts).await;
    }

    let original = match page.viewport().await {
        Ok(viewport) => viewport,
        Err(e) => {
            return AtomicCheck::warn("arrows_functional", format!("viewport unavailable: {}", e))
        }
    };
    let check = match probe_overflow(page, &slider, original, timeouts).await {
        Some(width) => {
            let mut check = arrow_round_trip(page, &slider, timeouts).await;
            check.detail = format!("{} (viewport probed at {}px)", check.detail, width);
            check
        }
        None => AtomicCheck::warn(
            "arrows_functional",
            format!(
                "no horizontal overflow down to {}px viewport; arrows not exercisable",
                PROBE_WIDTHS[PROBE_WIDTHS.len() - 1]
            ),
        ),
    };
    if page.viewport().await.ok() != Some(original) {
        if let Err(e) = page.set_viewport(original).await {
            debug!("Could not restore viewport: {}", e);
        }
        settle(page, timeouts).await;
    }
    check
}

pub(crate) async fn assert_tab_slider_present(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let Some(used) = assert_visible_any(page.as_ref(), &slider_anchors(), ctx.timeouts).await
    else {
        let variant = match assert_visible_any(page.as_ref(), &variant_anchors(), ctx.timeouts).await
        {
            Some(used) => Some(used),
            None => {
                let pattern = format!("{}|Angebot bearbeiten", NEXT_STEP_PATTERN);
                role_button_matching(page.as_ref(), &pattern, ctx.timeouts).await
            }
        };
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_tab_slider")
            .await;
        return Ok(match variant {
            Some(used) => IntentOutcome::warn(
                page,
                format!(
                    "intent assert_tab_slider_present: tab slider not confirmed (variant?) but checkout anchors present ({}).{}",
                    used, candidates
                ),
            ),
            None => IntentOutcome::fail(
                page,
                format!(
                    "intent assert_tab_slider_present: expected tab slider not found.{}",
                    candidates
                ),
            ),
        });
    };

    let tabs = collect_tabs(page.as_ref()).await;
    let bullets_ask = ctx.bullets_mention(&["many tabs", "viele tabs", "all journey steps"]);
    let mut atomic = AtomicCheckResult::new();
    atomic.push(many_tabs(tabs.len(), params, bullets_ask));
    atomic.push(deactivated_tabs(&tabs));
    atomic.push(arrows_functional(page.as_ref(), &tabs, ctx.timeouts).await);

    let message = format!(
        "intent assert_tab_slider_present: found ({}); {}",
        used,
        atomic.summary()
    );
    Ok(IntentOutcome::pass(page, message).with_atomic(atomic))
}

async fn find_tab(page: &dyn Page, name: &str) -> Option<(ElementTarget, ElementInfo)> {
    let wanted = TextMatch::Contains(name.to_string());
    for (target, info) in collect_tabs(page).await {
        let label = info.attr("aria-label").unwrap_or_default();
        if wanted.is_match(&info.text) || wanted.is_match(label) {
            return Some((target, info));
        }
    }
    let fallbacks = [
        ElementQuery::role("tab", Some(wanted.clone())),
        ElementQuery::role("button", Some(wanted.clone())),
        ElementQuery::role("link", Some(wanted)),
    ];
    for query in fallbacks {
        let target = ElementTarget::first(query);
        if let Ok(Some(info)) = page.inspect(&target).await {
            if info.visible {
                return Some((target, info));
            }
        }
    }
    None
}

pub(crate) async fn navigate_to_tab(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let Some(tab) = params.tab.as_deref().or(params.expected.as_deref()) else {
        return Ok(IntentOutcome::warn(
            page,
            "intent navigate_to_tab: no 'tab' parameter given",
        ));
    };
    let Some((target, info)) = find_tab(page.as_ref(), tab).await else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_navigate_to_tab")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent navigate_to_tab: tab '{}' not found.{}", tab, candidates),
        ));
    };
    if info.looks_deactivated() {
        return Ok(IntentOutcome::warn(
            page,
            format!(
                "intent navigate_to_tab: tab '{}' is deactivated ({}); not clicked",
                tab, target.query
            ),
        ));
    }

    if let Err(e) = page.scroll_into_view(&target).await {
        debug!("Could not scroll tab into view: {}", e);
    }
    let clicked = page.click(&target).await?;
    let page = clicked.new_page.unwrap_or(page);
    settle(page.as_ref(), ctx.timeouts).await;

    let active = matches!(page.inspect(&target).await, Ok(Some(info)) if looks_active(&info));
    if active {
        Ok(IntentOutcome::pass(
            page,
            format!("intent navigate_to_tab: '{}' active via {}", tab, target.query),
        ))
    } else {
        Ok(IntentOutcome::warn(
            page,
            format!(
                "intent navigate_to_tab: clicked '{}' via {}; active state not confirmed",
                tab, target.query
            ),
        ))
    }
}

pub(crate) async fn assert_active_tab(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let tabs = collect_tabs(page.as_ref()).await;
    if tabs.is_empty() {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_active_tab")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent assert_active_tab: no tabs found.{}", candidates),
        ));
    }
    let expected = params.expected.as_deref().or(params.tab.as_deref());
    let active = tabs.iter().find(|(_, info)| looks_active(info));

    Ok(match (active, expected) {
        (Some((_, info)), Some(expected)) => {
            let text = journey_browser::page::normalize_ws(&info.text);
            if TextMatch::Contains(expected.to_string()).is_match(&text) {
                IntentOutcome::pass(
                    page,
                    format!("intent assert_active_tab: '{}' is active", text),
                )
            } else {
                IntentOutcome::fail(
                    page,
                    format!(
                        "intent assert_active_tab: expected '{}' but '{}' is active",
                        expected, text
                    ),
                )
            }
        }
        (Some((_, info)), None) => IntentOutcome::warn(
            page,
            format!(
                "intent assert_active_tab: active tab is '{}' (no expected tab given)",
                journey_browser::page::normalize_ws(&info.text)
            ),
        ),
        (None, _) => IntentOutcome::warn(
            page,
            format!(
                "intent assert_active_tab: {} tabs found but none carries an active marker",
                tabs.len()
            ),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use journey_browser::mock::{ClickEffect, MockElement, MockPage};
    use journey_core::Verdict;
    use std::sync::Arc;

    /// Nav bar with three tabs (last one disabled) and optional arrows
    fn slider_page(scroll_width: f64, client_width: f64) -> (Arc<MockPage>, usize) {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        let nav = page.add(
            MockElement::new("nav")
                .test_id("nav-bar")
                .scrollable(scroll_width, client_width),
        );
        page.add(
            MockElement::new("button")
                .test_id("nav-bar-item")
                .text("Fahrzeug")
                .attr("aria-selected", "true")
                .child_of(nav),
        );
        page.add(MockElement::new("button").test_id("nav-bar-item").text("Händler").child_of(nav));
        page.add(
            MockElement::new("button")
                .test_id("nav-bar-item")
                .text("Persönliche Daten")
                .attr("aria-disabled", "true")
                .child_of(nav),
        );
        (page, nav)
    }

    fn add_arrow(page: &MockPage, test_id: &str, effect: Option<ClickEffect>) -> usize {
        let mut arrow = MockElement::button("").test_id(test_id);
        if let Some(effect) = effect {
            arrow = arrow.on_click(effect);
        }
        page.add(arrow)
    }

    #[tokio::test]
    async fn test_round_trip_passes() {
        let (page, nav) = slider_page(2000.0, 800.0);
        add_arrow(&page, "nav-bar-arrow-right", Some(ClickEffect::ScrollBy { element: nav, dx: 300.0 }));
        add_arrow(&page, "nav-bar-arrow-left", Some(ClickEffect::ScrollBy { element: nav, dx: -300.0 }));

        let mut harness = Harness::new();
        let outcome = assert_tab_slider_present(&mut harness.ctx(), page, &IntentParams::default())
            .await
            .unwrap();
        let atomic = outcome.atomic.as_ref().unwrap();
        assert_eq!(atomic.get("arrows_functional").unwrap().status, Verdict::Pass);
        assert_eq!(atomic.get("deactivated_tabs").unwrap().status, Verdict::Pass);
        assert_eq!(atomic.get("many_tabs").unwrap().status, Verdict::Warn);
        assert_eq!(outcome.verdict, Verdict::Warn);
    }

    #[tokio::test]
    async fn test_forward_only_movement_fails() {
        let (page, nav) = slider_page(2000.0, 800.0);
        add_arrow(&page, "nav-bar-arrow-right", Some(ClickEffect::ScrollBy { element: nav, dx: 300.0 }));
        add_arrow(&page, "nav-bar-arrow-left", None);

        let mut harness = Harness::new();
        let outcome = assert_tab_slider_present(&mut harness.ctx(), page, &IntentParams::default())
            .await
            .unwrap();
        let arrows = outcome.atomic.as_ref().unwrap().get("arrows_functional").unwrap().clone();
        assert_eq!(arrows.status, Verdict::Fail);
        assert!(arrows.detail.contains("back click"));
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_unmoving_forward_arrow_fails() {
        let (page, _) = slider_page(2000.0, 800.0);
        add_arrow(&page, "nav-bar-arrow-right", None);

        let mut harness = Harness::new();
        let outcome = assert_tab_slider_present(&mut harness.ctx(), page, &IntentParams::default())
            .await
            .unwrap();
        let arrows = outcome.atomic.unwrap();
        assert_eq!(arrows.get("arrows_functional").unwrap().status, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_viewport_probe_induces_overflow_and_restores() {
        let (page, nav) = slider_page(1000.0, 1200.0);
        add_arrow(&page, "nav-bar-arrow-right", Some(ClickEffect::ScrollBy { element: nav, dx: 200.0 }));
        add_arrow(&page, "nav-bar-arrow-left", Some(ClickEffect::ScrollBy { element: nav, dx: -200.0 }));
        let before = page.current_viewport();

        let mut harness = Harness::new();
        let outcome = assert_tab_slider_present(&mut harness.ctx(), page.clone(), &IntentParams::default())
            .await
            .unwrap();
        let arrows = outcome.atomic.unwrap().get("arrows_functional").unwrap().clone();
        assert_eq!(arrows.status, Verdict::Pass);
        assert!(arrows.detail.contains("probed at 768px"));
        assert_eq!(page.current_viewport(), before);
    }

    #[tokio::test]
    async fn test_no_overflow_anywhere_warns() {
        let (page, _) = slider_page(300.0, 300.0);
        let mut harness = Harness::new();
        let outcome = assert_tab_slider_present(&mut harness.ctx(), page, &IntentParams::default())
            .await
            .unwrap();
        let arrows = outcome.atomic.unwrap().get("arrows_functional").unwrap().clone();
        assert_eq!(arrows.status, Verdict::Warn);
    }

    #[tokio::test]
    async fn test_many_tabs_without_threshold_always_warns() {
        for count in [1usize, 3, 12] {
            let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
            for i in 0..count {
                page.add(MockElement::new("button").attr("role", "tab").text(&format!("Tab {}", i)));
            }
            let mut harness = Harness::new();
            harness.bullets = vec!["- Tab slider shows many tabs".into()];
            let outcome = assert_tab_slider_present(&mut harness.ctx(), page, &IntentParams::default())
                .await
                .unwrap();
            let many = outcome.atomic.unwrap().get("many_tabs").unwrap().clone();
            assert_eq!(many.status, Verdict::Warn, "count {}", count);
            assert!(many.detail.starts_with("SPEC_REQUIRED"));
        }
    }

    #[test]
    fn test_many_tabs_with_threshold_is_judged() {
        let params = IntentParams {
            min_tabs: Some(4),
            ..Default::default()
        };
        assert_eq!(many_tabs(5, &params, false).status, Verdict::Pass);
        assert_eq!(many_tabs(3, &params, false).status, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_missing_slider_with_checkout_anchor_warns() {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        page.add(MockElement::new("form").test_id("form-wrapper"));
        let mut harness = Harness::new();
        let outcome = assert_tab_slider_present(&mut harness.ctx(), page, &IntentParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert!(outcome.atomic.is_none());

        let empty = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        let outcome = assert_tab_slider_present(&mut harness.ctx(), empty, &IntentParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_navigate_and_assert_active_tab() {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        let tab = page.add(MockElement::new("button").attr("role", "tab").text("Händler"));
        page.add(
            MockElement::new("button")
                .attr("role", "tab")
                .text("Fahrzeug")
                .attr("class", "tab tab--active"),
        );
        let mut harness = Harness::new();
        let params = IntentParams {
            tab: Some("Händler".into()),
            ..Default::default()
        };
        let outcome = navigate_to_tab(&mut harness.ctx(), page.clone(), &params)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert_eq!(page.click_count(tab), 1);

        let outcome = assert_active_tab(&mut harness.ctx(), page.clone(), &params)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.contains("'Fahrzeug' is active"));

        let outcome = assert_active_tab(&mut harness.ctx(), page, &IntentParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Warn);
    }

    #[test]
    fn test_looks_active_ignores_inactive_class() {
        let mut info = ElementInfo::default();
        info.attributes.insert("class".into(), "tab tab--inactive".into());
        assert!(!looks_active(&info));
        info.attributes.insert("class".into(), "tab is-active".into());
        assert!(looks_active(&info));
    }
}
