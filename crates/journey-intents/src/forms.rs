//! Auto-fill of personal-data forms and the next-step gate
//!
//! Only dummy values are ever typed. Values come, in order, from the captured
//! form definition (matched by field `cid`), DOM `pattern` attributes,
//! `autocomplete` tokens and finally label/placeholder keywords.

use crate::anchors::{locate, visible_label};
use crate::checkout::NEXT_STEP_PATTERN;
use crate::outcome::{IntentContext, IntentOutcome};
use journey_browser::guards::settle;
use journey_browser::{ElementQuery, ElementTarget, FormField, Page, PageHandle, TextMatch};
use journey_core::{redact_url, IntentParams, Result};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

pub const DUMMY_FIRST_NAME: &str = "John";
pub const DUMMY_LAST_NAME: &str = "Doe";
pub const DUMMY_EMAIL: &str = "john.doe@example.com";
/// Digits only; the phone patterns reject `+` and spaces
pub const DUMMY_PHONE: &str = "15112345678";
pub const DUMMY_ZIP: &str = "12345";
/// No digits; house numbers are a separate field
pub const DUMMY_STREET: &str = "Teststraße";
pub const DUMMY_HOUSE_NUMBER: &str = "1";
pub const DUMMY_CITY: &str = "Berlin";

/// Field ids looked up in the form definition, in priority order
const SCHEMA_KEYS: [&str; 11] = [
    "firstname",
    "lastname",
    "email",
    "mobilephonecountrycode",
    "mobilephonenumber",
    "street",
    "housenumber",
    "zip",
    "city",
    "salutation",
    "title",
];

const CONSENT_KEYWORDS: [&str; 10] = [
    "agb",
    "datenschutz",
    "privacy",
    "terms",
    "bedingungen",
    "einverstanden",
    "zustimm",
    "consent",
    "agree",
    "accept",
];

/// Metadata of one form-definition field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaField {
    pub cid: String,
    pub field_type: String,
    pub label: String,
    pub pattern: String,
    pub input_type: String,
    /// Non-empty option values, in order
    pub options: Vec<String>,
}

fn str_field(node: &serde_json::Map<String, Value>, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn walk_schema(node: &Value, out: &mut HashMap<String, SchemaField>) {
    match node {
        Value::Object(map) => {
            if let Some(cid) = map.get("cid").and_then(Value::as_str).map(str::trim) {
                if !cid.is_empty() {
                    let options = map
                        .get("options")
                        .and_then(Value::as_array)
                        .map(|options| {
                            options
                                .iter()
                                .filter_map(|o| o.get("value").and_then(Value::as_str))
                                .map(str::trim)
                                .filter(|v| !v.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    out.insert(
                        cid.to_lowercase(),
                        SchemaField {
                            cid: cid.to_string(),
                            field_type: str_field(map, "type").to_lowercase(),
                            label: str_field(map, "label").to_lowercase(),
                            pattern: str_field(map, "pattern"),
                            input_type: str_field(map, "inputType").to_lowercase(),
                            options,
                        },
                    );
                }
            }
            for (key, child) in map {
                if key != "options" {
                    walk_schema(child, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|child| walk_schema(child, out)),
        _ => {}
    }
}

/// Flatten a form definition into `cid (lowercase) → field`
pub fn schema_hints(schema: &Value) -> HashMap<String, SchemaField> {
    let root = schema.get("formDefinition").unwrap_or(schema);
    let mut out = HashMap::new();
    if let Some(fields) = root.get("fields") {
        walk_schema(fields, &mut out);
    }
    out
}

fn looks_digits_pattern(pattern: &str) -> bool {
    let p = pattern.to_lowercase();
    (p.contains("[0-9]") || p.contains("\\d")) && p.contains('{') && p.contains('}')
}

fn value_for_schema(hints: &HashMap<String, SchemaField>, cid: &str) -> Option<String> {
    let field = hints.get(cid)?;
    let label = field.label.as_str();

    if field.field_type == "select" {
        let preferred = field.options.iter().find(|v| match cid {
            "mobilephonecountrycode" => v.as_str() == "+49",
            "salutation" => matches!(v.as_str(), "MR" | "MS"),
            _ => false,
        });
        return preferred.or(field.options.first()).cloned();
    }

    let value = if cid.contains("email") || label.contains("e-mail") || field.input_type == "email" {
        DUMMY_EMAIL
    } else if cid.contains("mobilephonenumber") || label.contains("mobil") || label.contains("phone") {
        DUMMY_PHONE
    } else if matches!(cid, "zip" | "postalcode" | "postcode") || label.contains("postleitz") {
        DUMMY_ZIP
    } else if cid == "street" || label.contains("straße") || label.contains("strasse") {
        DUMMY_STREET
    } else if matches!(cid, "housenumber" | "house_number") || label.contains("hausnummer") {
        DUMMY_HOUSE_NUMBER
    } else if matches!(cid, "city" | "ort") || label.contains("stadt") {
        DUMMY_CITY
    } else if matches!(cid, "firstname" | "first_name") || label.contains("vorname") {
        DUMMY_FIRST_NAME
    } else if matches!(cid, "lastname" | "last_name") || label.contains("nachname") {
        DUMMY_LAST_NAME
    } else if looks_digits_pattern(&field.pattern) {
        DUMMY_ZIP
    } else {
        return None;
    };
    Some(value.to_string())
}

fn any_in(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Dummy value for a text-like control, `None` when nothing fits
pub fn pick_value(field: &FormField, hints: &HashMap<String, SchemaField>) -> Option<String> {
    let hint = field.hint.trim().to_lowercase();
    let input_type = field.input_type.trim().to_lowercase();
    let autocomplete = field.autocomplete.trim().to_lowercase();
    let pattern = field.pattern.trim().to_lowercase();

    for cid in SCHEMA_KEYS {
        if hint.contains(cid) {
            if let Some(value) = value_for_schema(hints, cid) {
                return Some(value);
            }
        }
    }

    if !pattern.is_empty() {
        if pattern.contains("[0-9]{5}") || pattern.contains("\\d{5}") {
            return Some(DUMMY_ZIP.into());
        }
        if pattern.contains("[0-9]{5,15}") || pattern.contains("\\d{5,15}") {
            return Some(DUMMY_PHONE.into());
        }
        if pattern.contains("äöü")
            && !pattern.contains("0-9")
            && any_in(&hint, &["straße", "strasse", "street"])
        {
            return Some(DUMMY_STREET.into());
        }
    }

    if field.tag == "input" && input_type == "email" {
        return Some(DUMMY_EMAIL.into());
    }

    let by_autocomplete = match autocomplete.as_str() {
        "given-name" | "given_name" | "firstname" | "first_name" => Some(DUMMY_FIRST_NAME),
        "family-name" | "family_name" | "lastname" | "last_name" => Some(DUMMY_LAST_NAME),
        "email" => Some(DUMMY_EMAIL),
        "tel" | "tel-national" | "tel-local" | "mobile" => Some(DUMMY_PHONE),
        "postal-code" | "postal_code" | "zip" => Some(DUMMY_ZIP),
        "street-address" | "street_address" => Some(DUMMY_STREET),
        _ => None,
    };
    if let Some(value) = by_autocomplete {
        return Some(value.into());
    }

    let keywords: [(&[&str], &str); 8] = [
        (
            &["vorname", "firstname", "first name", "given name", "given-name", "first_name"],
            DUMMY_FIRST_NAME,
        ),
        (
            &["nachname", "lastname", "last name", "surname", "family name", "family-name", "last_name"],
            DUMMY_LAST_NAME,
        ),
        (&["e-mail", "email", "mail", "e_mail"], DUMMY_EMAIL),
        (&["telefon", "phone", "mobile", "handy", "tel"], DUMMY_PHONE),
        (&["plz", "postleitz", "postal", "zip"], DUMMY_ZIP),
        (&["hausnummer", "house number", "housenumber"], DUMMY_HOUSE_NUMBER),
        (&["straße", "strasse", "street", "address"], DUMMY_STREET),
        (&["stadt", "ort", "city"], DUMMY_CITY),
    ];
    keywords
        .iter()
        .find(|(needles, _)| any_in(&hint, needles))
        .map(|(_, value)| value.to_string())
}

pub fn is_consent_checkbox(hint: &str) -> bool {
    any_in(&hint.to_lowercase(), &CONSENT_KEYWORDS)
}

/// What an auto-fill pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoFillReport {
    pub visible: usize,
    pub attempted: usize,
    pub filled: usize,
}

impl AutoFillReport {
    pub fn message(&self) -> String {
        if self.visible == 0 {
            "auto-fill: no visible inputs".to_string()
        } else if self.filled == 0 {
            "auto-fill: nothing filled".to_string()
        } else {
            format!("auto-fill: filled {}/{} fields", self.filled, self.attempted)
        }
    }
}

enum FillAction {
    Check,
    Select(String),
    Fill(String),
}

fn plan(field: &FormField, hints: &HashMap<String, SchemaField>) -> Option<FillAction> {
    if field.tag == "input" && field.input_type.eq_ignore_ascii_case("checkbox") {
        if field.checked == Some(true) || !is_consent_checkbox(&field.hint) {
            return None;
        }
        return Some(FillAction::Check);
    }
    if !field.value.trim().is_empty() {
        return None;
    }
    if field.tag == "select" {
        return field
            .options
            .iter()
            .find(|o| !o.disabled && !o.value.trim().is_empty())
            .map(|o| FillAction::Select(o.value.trim().to_string()));
    }
    if field.input_type.eq_ignore_ascii_case("radio") {
        return None;
    }
    pick_value(field, hints).map(FillAction::Fill)
}

/// Fill empty visible fields with dummy values and tick consent boxes
///
/// Per-field failures are skipped; only reading the form can fail.
pub async fn auto_fill(page: &dyn Page, form_definition: Option<&Value>) -> Result<AutoFillReport> {
    let fields = page.form_fields().await?;
    let hints = form_definition.map(schema_hints).unwrap_or_default();
    let mut report = AutoFillReport {
        visible: fields.len(),
        ..Default::default()
    };

    for field in &fields {
        if field.selector.trim().is_empty() {
            continue;
        }
        let Some(action) = plan(field, &hints) else {
            continue;
        };
        report.attempted += 1;
        let target = ElementTarget::first(ElementQuery::css(field.selector.clone()));
        let applied = match &action {
            FillAction::Check => page.check(&target).await,
            FillAction::Select(value) => page.select_option(&target, value).await,
            FillAction::Fill(value) => page.fill(&target, value).await,
        };
        match applied {
            Ok(()) => report.filled += 1,
            Err(e) => debug!("Auto-fill skipped {}: {}", field.selector, e),
        }
    }
    if report.filled > 0 {
        info!("{}", report.message());
    }
    Ok(report)
}

fn is_text_like(field: &FormField) -> bool {
    field.tag == "textarea"
        || (field.tag == "input"
            && !matches!(field.input_type.as_str(), "checkbox" | "radio" | "file" | "range"))
}

pub(crate) async fn fill_personal_data_required(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent fill_personal_data_required";

    let report = auto_fill(page.as_ref(), ctx.form_definition).await?;
    if report.visible == 0 {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_fill_personal_data")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("{}: {}.{}", INTENT, report.message(), candidates),
        ));
    }
    settle(page.as_ref(), ctx.timeouts).await;

    let empty: Vec<String> = page
        .form_fields()
        .await?
        .into_iter()
        .filter(|f| is_text_like(f) && f.value.trim().is_empty())
        .map(|f| if f.label.is_empty() { f.selector } else { f.label })
        .collect();
    let alerts = page.ui_alerts().await.unwrap_or_default();

    let message = format!("{}: {}", INTENT, report.message());
    if empty.is_empty() && alerts.is_empty() {
        return Ok(IntentOutcome::pass(
            page,
            format!("{}; all visible fields hold values, no validation alerts", message),
        ));
    }
    let mut details = Vec::new();
    if !empty.is_empty() {
        details.push(format!("still empty: {}", empty.join(", ")));
    }
    if !alerts.is_empty() {
        details.push(format!("alerts: {}", alerts.join(" | ")));
    }
    Ok(IntentOutcome::warn(page, format!("{}; {}", message, details.join("; "))))
}

fn next_step_stages() -> Vec<Vec<ElementQuery>> {
    vec![
        vec![ElementQuery::test_id("cta-next-step")],
        vec![ElementQuery::role(
            "button",
            Some(TextMatch::Regex(NEXT_STEP_PATTERN.into())),
        )],
    ]
}

pub(crate) async fn assert_next_step_gate(
    ctx: &mut IntentContext<'_>,
    page: PageHandle,
    _params: &IntentParams,
) -> Result<IntentOutcome> {
    const INTENT: &str = "intent assert_next_step_gate";

    let Some((cta, info)) = locate(page.as_ref(), &next_step_stages(), ctx.timeouts).await else {
        let candidates = ctx
            .candidates_suffix(page.as_ref(), "ui_inventory_intent_assert_next_step_gate")
            .await;
        return Ok(IntentOutcome::fail(
            page,
            format!("{}: Next Step CTA not found.{}", INTENT, candidates),
        ));
    };
    if info.looks_deactivated() {
        return Ok(IntentOutcome::pass(
            page,
            format!("{}: CTA '{}' is disabled while required data is missing", INTENT, visible_label(&info)),
        ));
    }

    let before = redact_url(&page.url().await.unwrap_or_default());
    let clicked = page.click(&cta).await?;
    let opened = clicked.new_page.is_some();
    let page = clicked.new_page.unwrap_or(page);
    settle(page.as_ref(), ctx.timeouts).await;
    let after = redact_url(&page.url().await.unwrap_or_default());
    let alerts = page.ui_alerts().await.unwrap_or_default();

    if opened || (!after.is_empty() && after != before) {
        return Ok(IntentOutcome::fail(
            page,
            format!("{}: CTA advanced the journey (now {}) without blocking", INTENT, after),
        ));
    }
    if !alerts.is_empty() {
        return Ok(IntentOutcome::pass(
            page,
            format!(
                "{}: gate held, {} validation alert(s): {}",
                INTENT,
                alerts.len(),
                alerts.join(" | ")
            ),
        ));
    }
    Ok(IntentOutcome::warn(
        page,
        format!("{}: CTA clicked, no navigation and no validation alert", INTENT),
    ))
}
