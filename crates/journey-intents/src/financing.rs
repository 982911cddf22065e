//! Financing layer and parameter changes

use crate::anchors::{locate, mentions, visible_label};
use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::guards::settle;
use journey_browser::page::{first_visible, normalize_ws};
use journey_browser::{ElementQuery, ElementTarget, FormField, Page, PageHandle, TextMatch};
use journey_core::{IntentParams, Result};
use tracing::{debug, info};

const TRIGGER_PATTERN: &str =
    "Angebot bearbeiten|Finanzierung anpassen|Rate anpassen|Finanzierungsdetails|Edit offer";

fn trigger_stages() -> Vec<Vec<ElementQuery>> {
    vec![
        vec![
            ElementQuery::test_id("finance-layer-button"),
            ElementQuery::test_id("open-finance-layer"),
        ],
        vec![ElementQuery::role(
            "button",
            Some(TextMatch::Regex(TRIGGER_PATTERN.to_string())),
        )],
        vec![
            ElementQuery::text(TextMatch::Contains("Angebot bearbeiten".into())),
            ElementQuery::text(TextMatch::Contains("Finanzierung".into())),
        ],
    ]
}

fn layer_queries() -> Vec<ElementQuery> {
    vec![
        ElementQuery::test_id("finance-layer"),
        ElementQuery::role("dialog", None),
        ElementQuery::css("[aria-modal=\"true\"]"),
    ]
}

/// Current rate/summary text, used to notice recalculation
async fn rate_text(page: &dyn Page) -> Option<String> {
    for query in [
        ElementQuery::test_id("finance-rate"),
        ElementQuery::test_id("summary-finance-wrapper"),
    ] {
        if let Ok(Some(info)) = page.inspect(&ElementTarget::first(query)).await {
            return Some(normalize_ws(&info.text));
        }
    }
    None
}

pub(crate) async fn open_financing_layer(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent open_financing_layer";

    let Some((trigger, _)) = locate(page.as_ref(), &trigger_stages(), ctx.timeouts).await else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_open_financing_layer")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("{}: layer trigger not found.{}", INTENT, candidates),
        ));
    };
    if let Err(e) = page.scroll_into_view(&trigger).await {
        debug!("Could not scroll financing trigger into view: {}", e);
    }
    let clicked = page.click(&trigger).await?;
    let page = clicked.new_page.unwrap_or(page);
    settle(page.as_ref(), ctx.timeouts).await;

    let layer = first_visible(
        page.as_ref(),
        &layer_queries(),
        ctx.timeouts.element(),
        ctx.timeouts.poll(),
    )
    .await;
    let Some((layer, layer_info)) = layer else {
        return Ok(IntentOutcome::warn(
            page,
            format!(
                "{}: clicked {} but no layer/dialog detected",
                INTENT, trigger.query
            ),
        ));
    };
    info!("Financing layer open ({})", layer.query);

    match params.expected.as_deref() {
        Some(expected) => {
            let content = format!(
                "{} {}",
                visible_label(&layer_info),
                page.content().await.unwrap_or_default()
            );
            let message = format!("{}: layer open ({}) via {}", INTENT, layer.query, trigger.query);
            Ok(if mentions(&content, expected) {
                IntentOutcome::pass(page, format!("{}, shows '{}'", message, expected))
            } else {
                IntentOutcome::fail(page, format!("{}, expected '{}' missing", message, expected))
            })
        }
        None => Ok(IntentOutcome::warn(
            page,
            format!(
                "{}: layer open ({}) via {}; content not verified",
                INTENT, layer.query, trigger.query
            ),
        )),
    }
}

/// Form control whose label/hint names `parameter`
fn control_for<'a>(fields: &'a [FormField], parameter: &str) -> Option<&'a FormField> {
    fields
        .iter()
        .filter(|f| !f.selector.is_empty())
        .find(|f| mentions(&f.label, parameter) || mentions(&f.hint, parameter))
}

/// Apply `value` to the parameter's control; returns the strategy used
async fn apply_parameter(
    page: &dyn Page,
    parameter: &str,
    value: &str,
) -> Result<Option<String>> {
    let fields = page.form_fields().await?;
    if let Some(field) = control_for(&fields, parameter) {
        let target = ElementTarget::first(ElementQuery::css(field.selector.clone()));
        if field.tag == "select" {
            let option = field
                .options
                .iter()
                .filter(|o| !o.disabled)
                .find(|o| mentions(&o.label, value) || o.value == value);
            if let Some(option) = option {
                page.select_option(&target, &option.value).await?;
                return Ok(Some(format!("select {} = '{}'", field.selector, option.label)));
            }
        } else if !matches!(field.input_type.as_str(), "checkbox" | "radio") {
            page.fill(&target, value).await?;
            return Ok(Some(format!("fill {}", field.selector)));
        }
    }

    let wanted = TextMatch::Contains(value.to_string());
    for role in ["radio", "option", "button", "tab"] {
        let target = ElementTarget::first(ElementQuery::role(role, Some(wanted.clone())));
        if let Ok(Some(info)) = page.inspect(&target).await {
            if info.visible && info.enabled {
                page.click(&target).await?;
                return Ok(Some(target.query.to_string()));
            }
        }
    }
    Ok(None)
}

pub(crate) async fn change_financing_parameter(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    params: &IntentParams,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent change_financing_parameter";

    let (Some(parameter), Some(value)) = (params.parameter.as_deref(), params.value.as_deref())
    else {
        return Ok(IntentOutcome::warn(
            page,
            format!("{}: 'parameter' and 'value' are both required", INTENT),
        ));
    };
    let before = rate_text(page.as_ref()).await;
    let Some(strategy) = apply_parameter(page.as_ref(), parameter, value).await? else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_change_financing_parameter")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!(
                "{}: no control for {}='{}' found.{}",
                INTENT, parameter, value, candidates
            ),
        ));
    };
    settle(page.as_ref(), ctx.timeouts).await;
    let after = rate_text(page.as_ref()).await;
    let recalculated = match (&before, &after) {
        (Some(before), Some(after)) if before != after => "rate recalculated",
        (Some(_), Some(_)) => "rate unchanged",
        _ => "rate not observable",
    };

    let message = format!(
        "{}: set {}='{}' via {}; {}",
        INTENT, parameter, value, strategy, recalculated
    );
    match params.expected.as_deref() {
        Some(expected) => {
            let content = page.content().await.unwrap_or_default();
            let shown = mentions(after.as_deref().unwrap_or_default(), expected)
                || mentions(&content, expected);
            Ok(if shown {
                IntentOutcome::pass(page, format!("{}; shows '{}'", message, expected))
            } else {
                IntentOutcome::fail(page, format!("{}; expected '{}' missing", message, expected))
            })
        }
        None => Ok(IntentOutcome::warn(
            page,
            format!("{}; SPEC_REQUIRED: UI-to-source comparison undefined", message),
        )),
    }
}
