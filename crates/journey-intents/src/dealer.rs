//! Dealer search and pickup selection

use crate::anchors::{expected_list, locate, mentions, visible_label};
use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::guards::settle;
use journey_browser::{ElementInfo, ElementQuery, ElementTarget, FrameRef, Page, PageHandle, TextMatch};
use journey_core::{IntentParams, Result};
use tracing::{debug, info};

const DEALER_FIELD_PATTERN: &str = "händler|haendler|dealer|plz|postleitzahl|ort|zip|city";
const MAX_ITEMS: usize = 50;

fn search_input_stages() -> Vec<Vec<ElementQuery>> {
    vec![
        vec![
            ElementQuery::test_id("dealer-search-input"),
            ElementQuery::css("[data-testid*=\"dealer-search\"] input"),
        ],
        vec![
            ElementQuery::role("searchbox", None),
            ElementQuery::css("input[type=\"search\"]"),
        ],
        vec![
            ElementQuery::role("textbox", Some(TextMatch::Regex(DEALER_FIELD_PATTERN.into()))),
            ElementQuery::aria_label(TextMatch::Regex(DEALER_FIELD_PATTERN.into())),
            ElementQuery::css("input[placeholder*=\"PLZ\" i]"),
        ],
    ]
}

fn dealer_result_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("dealer-list-item"),
        ElementQuery::test_id("dealer-card"),
        ElementQuery::css("[data-testid*=\"dealer-result\"]"),
        ElementQuery::css("[class*=\"dealer-card\"]"),
    ]
}

fn pickup_option_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::css("[data-testid*=\"pickup-option\"]"),
        ElementQuery::css("[data-testid*=\"pickup\"] [role=\"radio\"]"),
        ElementQuery::role("radio", Some(TextMatch::Regex("abhol|pickup|liefer|delivery".into()))),
    ]
}

/// Visible matches of the first query in `queries` that matches anything
pub(crate) async fn visible_items(
    page: &dyn Page,
    queries: &[ElementQuery],
) -> Vec<(ElementTarget, ElementInfo)> {
    for query in queries {
        let count = page.count(FrameRef::Main, query).await.unwrap_or(0);
        let mut items = Vec::new();
        for nth in 0..count.min(MAX_ITEMS) {
            let target = ElementTarget::nth(query.clone(), nth);
            if let Ok(Some(info)) = page.inspect(&target).await {
                if info.visible {
                    items.push((target, info));
                }
            }
        }
        if !items.is_empty() {
            return items;
        }
    }
    Vec::new()
}

/// Verdict for a result count against an optional threshold
fn judge_count(
    page: PageHandle,
    intent: &str,
    what: &str,
    count: usize,
    min: Option<u32>,
) -> IntentOutcome {
    match min {
        Some(min) if count >= min as usize => IntentOutcome::pass(
            page,
            format!("intent {}: {} {} (threshold {})", intent, count, what, min),
        ),
        Some(min) => IntentOutcome::fail(
            page,
            format!("intent {}: {} {}, below threshold {}", intent, count, what, min),
        ),
        None => IntentOutcome::warn(
            page,
            format!(
                "intent {}: {} {}; SPEC_REQUIRED: no threshold for 'many results'",
                intent, count, what
            ),
        ),
    }
}

/// Pick the item named like `wanted`, else the first unless the strategy
/// insists on a name match
fn choose<'a>(
    items: &'a [(ElementTarget, ElementInfo)],
    wanted: Option<&str>,
    strategy: Option<&str>,
) -> Option<(&'a ElementTarget, &'a ElementInfo, &'static str)> {
    if let Some(wanted) = wanted {
        if strategy != Some("first") {
            if let Some((target, info)) = items
                .iter()
                .find(|(_, info)| mentions(&visible_label(info), wanted))
            {
                return Some((target, info, "by name"));
            }
            if strategy == Some("by_name") {
                return None;
            }
        }
    }
    items.first().map(|(target, info)| (target, info, "first"))
}

pub(crate) async fn search_dealer(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let Some(query) = params.query.as_deref().or(params.value.as_deref()) else {
        return Ok(IntentOutcome::warn(
            page,
            "intent search_dealer: no 'query' parameter given",
        ));
    };
    let Some((input, _)) = locate(page.as_ref(), &search_input_stages(), ctx.timeouts).await else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_search_dealer")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent search_dealer: search input not found.{}", candidates),
        ));
    };

    page.fill(&input, query).await?;
    page.press_enter(&input).await?;
    let submit = ElementTarget::first(ElementQuery::role(
        "button",
        Some(TextMatch::Regex("^(suchen|search|händler suchen)$".into())),
    ));
    if matches!(page.inspect(&submit).await, Ok(Some(info)) if info.visible && info.enabled) {
        debug!("Clicking dealer search button");
        page.click(&submit).await?;
    }
    settle(page.as_ref(), ctx.timeouts).await;
    info!("Dealer search for '{}' via {}", query, input.query);

    let results = visible_items(page.as_ref(), &dealer_result_queries()).await;
    let mut outcome = judge_count(
        page,
        "search_dealer",
        "dealer results",
        results.len(),
        params.min_results,
    );
    outcome.message = format!("{} (searched '{}' via {})", outcome.message, query, input.query);
    Ok(outcome)
}

pub(crate) async fn assert_dealer_results(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let results = visible_items(page.as_ref(), &dealer_result_queries()).await;
    if results.is_empty() {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_dealer_results")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent assert_dealer_results: no dealer results visible.{}", candidates),
        ));
    }
    if let Some(expected) = params.expected.as_deref() {
        let hit = results
            .iter()
            .any(|(_, info)| mentions(&visible_label(info), expected));
        let message = format!(
            "intent assert_dealer_results: {} results, '{}' {}",
            results.len(),
            expected,
            if hit { "listed" } else { "not listed" }
        );
        return Ok(if hit {
            IntentOutcome::pass(page, message)
        } else {
            IntentOutcome::fail(page, message)
        });
    }
    Ok(judge_count(
        page,
        "assert_dealer_results",
        "dealer results",
        results.len(),
        params.min_results,
    ))
}

async fn click_choice(
    ctx: &IntentContext<'_>,
    page: PageHandle,
    target: &ElementTarget,
    radio: bool,
) -> Result<PageHandle> {
    if let Err(e) = page.scroll_into_view(target).await {
        debug!("Could not scroll choice into view: {}", e);
    }
    let page = if radio {
        page.check(target).await?;
        page
    } else {
        let clicked = page.click(target).await?;
        clicked.new_page.unwrap_or(page)
    };
    settle(page.as_ref(), ctx.timeouts).await;
    Ok(page)
}

pub(crate) async fn select_dealer(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let results = visible_items(page.as_ref(), &dealer_result_queries()).await;
    let wanted = params.value.as_deref().or(params.expected.as_deref());
    let Some((target, info, how)) = choose(&results, wanted, params.strategy.as_deref()) else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_select_dealer")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent select_dealer: no matching dealer to select.{}", candidates),
        ));
    };
    let label = visible_label(info);
    let target = target.clone();
    let page = click_choice(ctx, page, &target, false).await?;

    let confirm = ElementTarget::first(ElementQuery::role(
        "button",
        Some(TextMatch::Regex("händler auswählen|auswählen|select dealer|übernehmen".into())),
    ));
    if matches!(page.inspect(&confirm).await, Ok(Some(info)) if info.visible && info.enabled) {
        page.click(&confirm).await?;
        settle(page.as_ref(), ctx.timeouts).await;
    }

    match params.expected.as_deref() {
        Some(expected) => {
            let content = page.content().await.unwrap_or_default();
            let message = format!(
                "intent select_dealer: selected '{}' ({}, {})",
                label, how, target.query
            );
            Ok(if mentions(&content, expected) && mentions(&label, expected) {
                IntentOutcome::pass(page, message)
            } else {
                IntentOutcome::fail(page, format!("{}; expected '{}' not shown", message, expected))
            })
        }
        None => Ok(IntentOutcome::warn(
            page,
            format!(
                "intent select_dealer: selected '{}' ({}, {}); selection not verified",
                label, how, target.query
            ),
        )),
    }
}

pub(crate) async fn assert_pickup_options(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let options = visible_items(page.as_ref(), &pickup_option_queries()).await;
    if options.is_empty() {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_pickup_options")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent assert_pickup_options: no pickup options visible.{}", candidates),
        ));
    }
    let labels: Vec<String> = options.iter().map(|(_, info)| visible_label(info)).collect();
    if let Some(expected) = params.expected.as_deref() {
        let joined = labels.join(" | ");
        let missing: Vec<String> = expected_list(expected)
            .into_iter()
            .filter(|option| !mentions(&joined, option))
            .collect();
        return Ok(if missing.is_empty() {
            IntentOutcome::pass(
                page,
                format!("intent assert_pickup_options: all expected options shown ({})", joined),
            )
        } else {
            IntentOutcome::fail(
                page,
                format!(
                    "intent assert_pickup_options: missing {} (shown: {})",
                    missing.join(", "),
                    joined
                ),
            )
        });
    }
    let mut outcome = judge_count(
        page,
        "assert_pickup_options",
        "pickup options",
        options.len(),
        params.min_results,
    );
    outcome.message = format!("{} [{}]", outcome.message, labels.join(" | "));
    Ok(outcome)
}

pub(crate) async fn select_pickup(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    let options = visible_items(page.as_ref(), &pickup_option_queries()).await;
    let wanted = params.value.as_deref().or(params.expected.as_deref());
    let Some((target, info, how)) = choose(&options, wanted, params.strategy.as_deref()) else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_select_pickup")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("intent select_pickup: no matching pickup option.{}", candidates),
        ));
    };
    let label = visible_label(info);
    let radio = info.attr("role") == Some("radio") || info.attr("type") == Some("radio");
    let target = target.clone();
    let page = click_choice(ctx, page, &target, radio).await?;

    let message = format!("intent select_pickup: chose '{}' ({}, {})", label, how, target.query);
    Ok(match params.expected.as_deref() {
        Some(expected) if mentions(&label, expected) => IntentOutcome::pass(page, message),
        Some(expected) => {
            IntentOutcome::fail(page, format!("{}; expected '{}'", message, expected))
        }
        None => IntentOutcome::warn(page, format!("{}; selection not verified", message)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use journey_browser::mock::{MockElement, MockPage};
    use journey_core::Verdict;
    use std::sync::Arc;

    fn dealer_page() -> (Arc<MockPage>, Vec<usize>) {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        page.add(MockElement::input("search").test_id("dealer-search-input"));
        let results = ["Autohaus Nord", "Autohaus Süd", "Autohaus West"]
            .iter()
            .map(|name| page.add(MockElement::new("div").test_id("dealer-list-item").text(name).hidden()))
            .collect::<Vec<_>>();
        (page, results)
    }

    #[tokio::test]
    async fn test_search_dealer_with_threshold() {
        let (page, results) = dealer_page();
        for idx in &results {
            page.set_visible(*idx, true);
        }
        let mut harness = Harness::new();
        let params = IntentParams {
            query: Some("10115".into()),
            min_results: Some(2),
            ..Default::default()
        };
        let outcome = search_dealer(&mut harness.ctx(), page.clone(), &params).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(page.fills(), vec![(0, "10115".to_string())]);

        let params = IntentParams {
            query: Some("10115".into()),
            ..Default::default()
        };
        let outcome = search_dealer(&mut harness.ctx(), page, &params).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert!(outcome.message.contains("3 dealer results"));
    }

    #[tokio::test]
    async fn test_search_dealer_without_input_fails() {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        let mut harness = Harness::new();
        let params = IntentParams {
            query: Some("Berlin".into()),
            ..Default::default()
        };
        let outcome = search_dealer(&mut harness.ctx(), page, &params).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_assert_dealer_results_expected_name() {
        let (page, results) = dealer_page();
        for idx in &results {
            page.set_visible(*idx, true);
        }
        let mut harness = Harness::new();
        let params = IntentParams {
            expected: Some("autohaus süd".into()),
            ..Default::default()
        };
        let outcome = assert_dealer_results(&mut harness.ctx(), page.clone(), &params)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);

        let outcome = assert_dealer_results(&mut harness.ctx(), dealer_page().0, &IntentParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_select_dealer_by_name() {
        let (page, results) = dealer_page();
        for idx in &results {
            page.set_visible(*idx, true);
        }
        let mut harness = Harness::new();
        let params = IntentParams {
            value: Some("West".into()),
            ..Default::default()
        };
        let outcome = select_dealer(&mut harness.ctx(), page.clone(), &params).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert!(outcome.message.contains("'Autohaus West' (by name"));
        assert_eq!(page.click_count(results[2]), 1);

        let params = IntentParams {
            value: Some("Ost".into()),
            strategy: Some("by_name".into()),
            ..Default::default()
        };
        let outcome = select_dealer(&mut harness.ctx(), page, &params).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_pickup_options_and_selection() {
        let page = Arc::new(MockPage::new("https://shop.example/de/checkout.html"));
        let group = page.add(MockElement::new("div").test_id("pickup-group"));
        page.add(
            MockElement::new("div")
                .attr("role", "radio")
                .text("Abholung beim Händler")
                .child_of(group),
        );
        let delivery = page.add(
            MockElement::new("div")
                .attr("role", "radio")
                .text("Lieferung nach Hause")
                .child_of(group),
        );
        let mut harness = Harness::new();

        let params = IntentParams {
            expected: Some("Abholung, Lieferung".into()),
            ..Default::default()
        };
        let outcome = assert_pickup_options(&mut harness.ctx(), page.clone(), &params)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);

        let outcome = assert_pickup_options(&mut harness.ctx(), page.clone(), &IntentParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Warn);

        let params = IntentParams {
            value: Some("Lieferung".into()),
            expected: Some("Lieferung".into()),
            ..Default::default()
        };
        let outcome = select_pickup(&mut harness.ctx(), page.clone(), &params).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(page.element(delivery).unwrap().checked);
    }
}
