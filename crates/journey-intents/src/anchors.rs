//! Anchor-presence intents
//!
//! Presence of a structural hook proves the layout, not the business content,
//! so these stay at `Warn` unless the charter supplies an `expected` value to
//! compare against.

use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::guards::settle;
use journey_browser::page::{first_visible, normalize_ws};
use journey_browser::{ElementInfo, ElementQuery, ElementTarget, FrameRef, Page, PageHandle, TextMatch};
use journey_core::{IntentParams, Result, Timeouts};
use tracing::debug;

const STICKY_BAR_PATTERN: &str =
    "Weiter|Next Step|Nächster Schritt|Fortfahren|Zum Leasingantrag|Zur Zusammenfassung|Zur Bestellung";

const STICKY_BAR_LABELS: [&str; 7] = [
    "Weiter",
    "Next Step",
    "Nächster Schritt",
    "Fortfahren",
    "Zum Leasingantrag",
    "Zur Zusammenfassung",
    "Zur Bestellung",
];

const PRICE_BOX_LABEL: &str = "Angebot bearbeiten";

/// Scroll increment for the sticky behavior check
pub const SCROLL_STEP_PX: f64 = 400.0;
/// Vertical drift tolerated for a sticky anchor
pub const STICKY_TOLERANCE_PX: f64 = 4.0;
pub const MAX_SCROLLS: usize = 12;

const THANK_YOU_PATTERN: &str =
    "Vielen Dank|Danke für|Thank you|Ihre Anfrage wurde|erfolgreich übermittelt|successfully submitted";

/// First visible element across graduated stages of queries
pub(crate) async fn locate(
    page: &dyn Page,
    stages: &[Vec<ElementQuery>],
    timeouts: &Timeouts,
) -> Option<(ElementTarget, ElementInfo)> {
    for stage in stages {
        if let Some(found) = first_visible(page, stage, timeouts.element(), timeouts.poll()).await {
            return Some(found);
        }
    }
    None
}

/// Case-insensitive containment after whitespace normalization
pub(crate) fn mentions(haystack: &str, expected: &str) -> bool {
    TextMatch::Contains(expected.to_string()).is_match(haystack)
}

/// Text plus accessible label of an element
pub(crate) fn visible_label(info: &ElementInfo) -> String {
    let mut label = normalize_ws(&info.text);
    if let Some(aria) = info.attr("aria-label") {
        if !label.is_empty() {
            label.push(' ');
        }
        label.push_str(aria);
    }
    label
}

fn sticky_bar_stages() -> Vec<Vec<ElementQuery>> {
    vec![
        vec![
            ElementQuery::test_id("cta-next-step"),
            ElementQuery::css("button[data-testid=\"cta-next-step\"]"),
        ],
        vec![ElementQuery::role(
            "button",
            Some(TextMatch::Regex(STICKY_BAR_PATTERN.to_string())),
        )],
        STICKY_BAR_LABELS
            .iter()
            .map(|label| ElementQuery::text(TextMatch::Contains(label.to_string())))
            .collect(),
    ]
}

/// Compare presence against an optional expected label
fn judge_presence(
    page: PageHandle,
    intent: &str,
    target: &ElementTarget,
    haystack: &str,
    expected: Option<&str>,
) -> IntentOutcome {
    match expected {
        Some(expected) if mentions(haystack, expected) => IntentOutcome::pass(
            page,
            format!("intent {}: found ({}) showing '{}'", intent, target.query, expected),
        ),
        Some(expected) => IntentOutcome::fail(
            page,
            format!(
                "intent {}: found ({}) but expected '{}' not shown (saw '{}')",
                intent, target.query, expected, haystack
            ),
        ),
        None => IntentOutcome::warn(
            page,
            format!(
                "intent {}: found ({}); presence only, content not verified",
                intent, target.query
            ),
        ),
    }
}

pub(crate) async fn assert_sticky_bar_present(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    match locate(page.as_ref(), &sticky_bar_stages(), ctx.timeouts).await {
        Some((target, info)) => Ok(judge_presence(
            page,
            "assert_sticky_bar_present",
            &target,
            &visible_label(&info),
            params.expected.as_deref(),
        )),
        None => {
            let candidates = ctx
                .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_sticky_bar")
                .await;
            Ok(IntentOutcome::fail(
                page,
                format!(
                    "intent assert_sticky_bar_present: Next Step CTA not found.{}",
                    candidates
                ),
            ))
        }
    }
}

pub(crate) async fn assert_price_box_present(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let stages = vec![
        vec![ElementQuery::role(
            "button",
            Some(TextMatch::Regex(PRICE_BOX_LABEL.to_string())),
        )],
        vec![
            ElementQuery::role("button", Some(TextMatch::Contains(PRICE_BOX_LABEL.to_string()))),
            ElementQuery::aria_label(TextMatch::Exact(PRICE_BOX_LABEL.to_string())),
        ],
        vec![ElementQuery::test_id("summary-finance-wrapper")],
    ];
    let Some((target, info)) = locate(page.as_ref(), &stages, ctx.timeouts).await else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_price_box")
            .await;
        return Ok(IntentOutcome::warn(
            page,
            format!(
                "intent assert_price_box_present: not confirmed (variant?){}",
                candidates
            ),
        ));
    };

    let mut haystack = visible_label(&info);
    let wrapper = ElementTarget::first(ElementQuery::test_id("summary-finance-wrapper"));
    if let Ok(Some(wrapper)) = page.inspect(&wrapper).await {
        haystack.push(' ');
        haystack.push_str(&normalize_ws(&wrapper.text));
    }
    Ok(judge_presence(
        page,
        "assert_price_box_present",
        &target,
        haystack.trim(),
        params.expected.as_deref(),
    ))
}

fn footer_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::css("footer"),
        ElementQuery::role("contentinfo", None),
        ElementQuery::test_id("footer"),
    ]
}

async fn footer_in_view(page: &dyn Page, viewport_height: f64) -> bool {
    for query in footer_queries() {
        let target = ElementTarget::first(query);
        if let Ok(Some(info)) = page.inspect(&target).await {
            if let (true, Some(b)) = (info.visible, info.bbox) {
                if b.y < viewport_height && b.y + b.height > 0.0 {
                    return true;
                }
            }
        }
    }
    false
}

async fn anchor_y(page: &dyn Page, target: &ElementTarget) -> Option<f64> {
    page.inspect(target).await.ok().flatten().and_then(|i| i.bbox).map(|b| b.y)
}

pub(crate) async fn assert_sticky_behavior_on_scroll(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent assert_sticky_behavior_on_scroll";

    let stages = sticky_bar_stages();
    let Some((anchor, _)) = locate(page.as_ref(), &stages[..2], ctx.timeouts).await else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_sticky_behavior")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("{}: sticky anchor not found.{}", INTENT, candidates),
        ));
    };
    let viewport_height = page.viewport().await?.height as f64;
    let Some(start_y) = anchor_y(page.as_ref(), &anchor).await else {
        return Ok(IntentOutcome::warn(
            page,
            format!("{}: anchor ({}) has no measurable position", INTENT, anchor.query),
        ));
    };

    let mut scrolled = 0.0;
    let mut verdict = None;
    for step in 0..MAX_SCROLLS {
        if footer_in_view(page.as_ref(), viewport_height).await {
            verdict = Some(IntentOutcome::pass(
                page.clone(),
                format!(
                    "{}: anchor ({}) held within {}px until the footer after {} scrolls",
                    INTENT, anchor.query, STICKY_TOLERANCE_PX, step
                ),
            ));
            break;
        }
        page.scroll_by(SCROLL_STEP_PX).await?;
        scrolled += SCROLL_STEP_PX;
        settle(page.as_ref(), ctx.timeouts).await;

        let drift = match anchor_y(page.as_ref(), &anchor).await {
            Some(y) => (y - start_y).abs(),
            None => f64::INFINITY,
        };
        if drift > STICKY_TOLERANCE_PX {
            verdict = Some(IntentOutcome::fail(
                page.clone(),
                format!(
                    "{}: anchor ({}) drifted {:.0}px after scrolling {:.0}px",
                    INTENT, anchor.query, drift, scrolled
                ),
            ));
            break;
        }
    }
    let outcome = match verdict {
        Some(outcome) => outcome,
        None if footer_in_view(page.as_ref(), viewport_height).await => IntentOutcome::pass(
            page.clone(),
            format!(
                "{}: anchor ({}) held within {}px until the footer",
                INTENT, anchor.query, STICKY_TOLERANCE_PX
            ),
        ),
        None => IntentOutcome::warn(
            page.clone(),
            format!(
                "{}: anchor held for {:.0}px but the footer never became visible",
                INTENT, scrolled
            ),
        ),
    };

    if let Err(e) = page.scroll_by(-scrolled).await {
        debug!("Could not scroll back after sticky check: {}", e);
    }
    Ok(outcome)
}

async fn visible_texts(page: &dyn Page, query: &ElementQuery) -> Vec<String> {
    let count = page.count(FrameRef::Main, query).await.unwrap_or(0);
    let mut texts = Vec::new();
    for nth in 0..count.min(50) {
        let target = ElementTarget::nth(query.clone(), nth);
        if let Ok(Some(info)) = page.inspect(&target).await {
            let label = visible_label(&info);
            if info.visible && !label.is_empty() {
                texts.push(label);
            }
        }
    }
    texts
}

/// Split `"Fahrzeug, Händler; Finanzierung"` into section names
pub(crate) fn expected_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', '|'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) async fn assert_summary_sections(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent assert_summary_sections";

    let mut sections = visible_texts(page.as_ref(), &ElementQuery::css("[data-testid*=\"summary\"]")).await;
    sections.extend(visible_texts(page.as_ref(), &ElementQuery::css("h1, h2, h3, h4")).await);
    if sections.is_empty() {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_summary_sections")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("{}: no summary sections or headings found.{}", INTENT, candidates),
        ));
    }

    let Some(expected) = params.expected.as_deref() else {
        return Ok(IntentOutcome::warn(
            page,
            format!(
                "{}: {} sections/headings visible; SPEC_REQUIRED: which sections are mandatory",
                INTENT,
                sections.len()
            ),
        ));
    };
    let content = page.content().await.unwrap_or_default();
    let haystack = format!("{} {}", sections.join(" "), content);
    let missing: Vec<String> = expected_list(expected)
        .into_iter()
        .filter(|section| !mentions(&haystack, section))
        .collect();
    if missing.is_empty() {
        Ok(IntentOutcome::pass(
            page,
            format!("{}: all expected sections present ({})", INTENT, expected),
        ))
    } else {
        Ok(IntentOutcome::fail(
            page,
            format!("{}: missing sections: {}", INTENT, missing.join(", ")),
        ))
    }
}

pub(crate) async fn assert_thank_you(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent assert_thank_you";

    let url = page.url().await?.to_lowercase();
    let url_marker = ["thank", "danke", "confirmation", "bestaetigung"]
        .iter()
        .find(|needle| url.contains(*needle));
    let text_marker = first_visible(
        page.as_ref(),
        &[ElementQuery::text(TextMatch::Regex(THANK_YOU_PATTERN.to_string()))],
        ctx.timeouts.element(),
        ctx.timeouts.poll(),
    )
    .await;

    let marker = match (&text_marker, url_marker) {
        (Some((_, info)), _) => format!("text '{}'", normalize_ws(&info.text)),
        (None, Some(needle)) => format!("url contains '{}'", needle),
        (None, None) => {
            let candidates = ctx
                .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_thank_you")
                .await;
            return Ok(IntentOutcome::fail(
                page,
                format!("{}: no thank-you marker found.{}", INTENT, candidates),
            ));
        }
    };

    match params.expected.as_deref() {
        Some(expected) => {
            let content = page.content().await.unwrap_or_default();
            if mentions(&content, expected) {
                Ok(IntentOutcome::pass(
                    page,
                    format!("{}: {} and expected '{}' shown", INTENT, marker, expected),
                ))
            } else {
                Ok(IntentOutcome::fail(
                    page,
                    format!("{}: {} but expected '{}' missing", INTENT, marker, expected),
                ))
            }
        }
        None => Ok(IntentOutcome::warn(
            page,
            format!(
                "{}: {}; confirmation e-mail not verifiable from the page",
                INTENT, marker
            ),
        )),
    }
}
