//! Charter model: scenarios, test cases and the closed step union
//!
//! Charters are authored as loosely-typed JSON (`"action": "Click CTA"`,
//! `"data-testid": ...`). They are parsed once into [`Step`] values and every
//! step is validated at load time, so unknown actions and unknown intents never
//! reach the executor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::{JourneyError, Result};

/// Sentinel test id emitted by charter generators when no hook is known yet
pub const PLACEHOLDER_TEST_ID: &str = "placeholder-testid";

/// Loaded, validated charter
#[derive(Debug, Clone, Serialize)]
pub struct Charter {
    pub scenarios: Vec<Scenario>,
}

/// A named group of test cases
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub test_cases: Vec<TestCase>,
    /// Reporting-only metadata, never enforced
    pub negative_tests: Option<Value>,
    /// Reporting-only metadata, never enforced
    pub device_matrix: Option<Value>,
}

/// A test case with its ordered steps
#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    pub id: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl TestCase {
    /// Machine-readable verification bullets (`-` prefixed description lines)
    pub fn bullets(&self) -> Vec<String> {
        self.description
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('-'))
            .map(|line| line.trim_start_matches(['-', ' ']).trim().to_string())
            .filter(|b| !b.is_empty())
            .collect()
    }

    /// Whether this test case drives the journey forward (clicks, fills or a
    /// checkout start) as opposed to asserting on a stable screen.
    ///
    /// A case opening with a null `open_url` assumes the UI stays where it is.
    pub fn is_journey_driver(&self) -> bool {
        let Some(first) = self.steps.first() else {
            return false;
        };
        if let StepKind::OpenUrl { target: None } = first.kind {
            return false;
        }
        self.steps.iter().any(|s| match &s.kind {
            StepKind::Click { .. } | StepKind::Fill { .. } | StepKind::Check { .. } => true,
            StepKind::Intent(intent) => intent.intent == IntentKind::StartCheckout,
            _ => false,
        })
    }
}

/// Raw locator hints as written in the charter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorHints {
    /// Pre-resolved structural path from an external snapshot tool
    pub node_path: Option<String>,
    pub selector: Option<String>,
    pub test_id: Option<String>,
    pub aria_label: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub value: Option<String>,
}

impl LocatorHints {
    /// Test id usable for resolution (the placeholder sentinel is rejected)
    pub fn usable_test_id(&self) -> Option<&str> {
        self.test_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != PLACEHOLDER_TEST_ID)
    }

    /// True when the only hint is the placeholder test id
    pub fn is_placeholder_only(&self) -> bool {
        self.test_id.as_deref() == Some(PLACEHOLDER_TEST_ID)
            && self.aria_label.is_none()
            && self.selector.is_none()
            && self.role.is_none()
            && self.text.is_none()
            && self.name.is_none()
    }

    /// Lowercased target phrases used to bias discovery clicks
    pub fn target_phrases(&self) -> Vec<String> {
        [&self.text, &self.name, &self.aria_label]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Compact description for error messages
    pub fn describe(&self) -> String {
        format!(
            "data-testid='{}', aria-label='{}', role='{}', name='{}', text='{}', selector='{}'",
            self.test_id.as_deref().unwrap_or("None"),
            self.aria_label.as_deref().unwrap_or("None"),
            self.role.as_deref().unwrap_or("None"),
            self.name.as_deref().unwrap_or("None"),
            self.text.as_deref().unwrap_or("None"),
            self.selector.as_deref().unwrap_or("None"),
        )
    }
}

/// Catalog of supported high-level intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    StartCheckout,
    AssertCheckoutLoaded,
    AssertTabSliderPresent,
    AssertPriceBoxPresent,
    AssertStickyBarPresent,
    AssertStickyBehaviorOnScroll,
    NavigateToTab,
    AssertActiveTab,
    SearchDealer,
    AssertDealerResults,
    SelectDealer,
    AssertPickupOptions,
    SelectPickup,
    OpenFinancingLayer,
    ChangeFinancingParameter,
    AssertSummarySections,
    AssertThankYou,
    FillPersonalDataRequired,
    AssertNextStepGate,
    AssertDucEntrypointCaptured,
}

impl IntentKind {
    /// Parse an intent name, accepting the historical aliases
    pub fn from_name(raw: &str) -> Option<Self> {
        let name = raw.trim().to_lowercase();
        let kind = match name.as_str() {
            "start_checkout" | "start_checkout_journey" | "start ecom" | "start ecom journey" => {
                IntentKind::StartCheckout
            }
            "assert_checkout_loaded" | "assert_ecom_loaded" | "assert ecom loaded" => {
                IntentKind::AssertCheckoutLoaded
            }
            "assert_tab_slider_present" | "assert_tab_slider" | "assert tabs" => {
                IntentKind::AssertTabSliderPresent
            }
            "assert_price_box_present" | "assert_price_box" | "assert price box" => {
                IntentKind::AssertPriceBoxPresent
            }
            "assert_sticky_bar_present" | "assert_sticky_bar" | "assert next step cta" => {
                IntentKind::AssertStickyBarPresent
            }
            "assert_sticky_behavior_on_scroll" => IntentKind::AssertStickyBehaviorOnScroll,
            "navigate_to_tab" => IntentKind::NavigateToTab,
            "assert_active_tab" => IntentKind::AssertActiveTab,
            "search_dealer" => IntentKind::SearchDealer,
            "assert_dealer_results" => IntentKind::AssertDealerResults,
            "select_dealer" => IntentKind::SelectDealer,
            "assert_pickup_options" => IntentKind::AssertPickupOptions,
            "select_pickup" => IntentKind::SelectPickup,
            "open_financing_layer" => IntentKind::OpenFinancingLayer,
            "change_financing_parameter" => IntentKind::ChangeFinancingParameter,
            "assert_summary_sections" => IntentKind::AssertSummarySections,
            "assert_thank_you" => IntentKind::AssertThankYou,
            "fill_personal_data_required" => IntentKind::FillPersonalDataRequired,
            "assert_next_step_gate" => IntentKind::AssertNextStepGate,
            "assert_duc_entrypoint_captured" => IntentKind::AssertDucEntrypointCaptured,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::StartCheckout => "start_checkout",
            IntentKind::AssertCheckoutLoaded => "assert_checkout_loaded",
            IntentKind::AssertTabSliderPresent => "assert_tab_slider_present",
            IntentKind::AssertPriceBoxPresent => "assert_price_box_present",
            IntentKind::AssertStickyBarPresent => "assert_sticky_bar_present",
            IntentKind::AssertStickyBehaviorOnScroll => "assert_sticky_behavior_on_scroll",
            IntentKind::NavigateToTab => "navigate_to_tab",
            IntentKind::AssertActiveTab => "assert_active_tab",
            IntentKind::SearchDealer => "search_dealer",
            IntentKind::AssertDealerResults => "assert_dealer_results",
            IntentKind::SelectDealer => "select_dealer",
            IntentKind::AssertPickupOptions => "assert_pickup_options",
            IntentKind::SelectPickup => "select_pickup",
            IntentKind::OpenFinancingLayer => "open_financing_layer",
            IntentKind::ChangeFinancingParameter => "change_financing_parameter",
            IntentKind::AssertSummarySections => "assert_summary_sections",
            IntentKind::AssertThankYou => "assert_thank_you",
            IntentKind::FillPersonalDataRequired => "fill_personal_data_required",
            IntentKind::AssertNextStepGate => "assert_next_step_gate",
            IntentKind::AssertDucEntrypointCaptured => "assert_duc_entrypoint_captured",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional intent parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentParams {
    /// Target tab label (navigate_to_tab, assert_active_tab)
    pub tab: Option<String>,
    /// Free-text query (search_dealer)
    pub query: Option<String>,
    /// Explicit expected value; enables a deterministic comparison
    pub expected: Option<String>,
    /// Externally supplied tab-count threshold
    pub min_tabs: Option<u32>,
    /// Externally supplied result-count threshold
    pub min_results: Option<u32>,
    /// Financing parameter to change
    pub parameter: Option<String>,
    /// Value to apply
    pub value: Option<String>,
    /// Selection strategy, e.g. `first`
    pub strategy: Option<String>,
    /// Charter marks this requirement as not yet machine-checkable
    pub spec_required: bool,
}

/// An intent step with its parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentStep {
    pub intent: IntentKind,
    pub label: Option<String>,
    pub params: IntentParams,
}

/// Closed union of executable step kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    OpenUrl { target: Option<String> },
    Wait { seconds: u64 },
    Click { hints: LocatorHints },
    Fill { hints: LocatorHints, value: String },
    Check { hints: LocatorHints },
    Intent(IntentStep),
}

/// One charter step: raw action label plus the validated kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// Action as written in the charter (used for step ids and file names)
    pub action: String,
    pub kind: StepKind,
}

impl Step {
    /// Normalized action name
    pub fn normalized_action(&self) -> &'static str {
        match self.kind {
            StepKind::OpenUrl { .. } => "open_url",
            StepKind::Wait { .. } => "wait",
            StepKind::Click { .. } => "click",
            StepKind::Fill { .. } => "fill",
            StepKind::Check { .. } => "check",
            StepKind::Intent(_) => "intent",
        }
    }

    pub fn intent(&self) -> Option<&IntentStep> {
        match &self.kind {
            StepKind::Intent(intent) => Some(intent),
            _ => None,
        }
    }

    pub fn hints(&self) -> Option<&LocatorHints> {
        match &self.kind {
            StepKind::Click { hints } | StepKind::Fill { hints, .. } | StepKind::Check { hints } => {
                Some(hints)
            }
            _ => None,
        }
    }

    /// Navigation and waits never count as blockers
    pub fn can_block(&self) -> bool {
        !matches!(self.kind, StepKind::OpenUrl { .. } | StepKind::Wait { .. })
    }
}

/// Map free-form charter action names onto canonical names
pub fn normalize_action(action: &str) -> String {
    let a = action.trim().to_lowercase();
    match a.as_str() {
        "open url" | "open" | "goto" | "navigate" => "open_url".to_string(),
        "wait" | "sleep" => "wait".to_string(),
        "click" | "click cta" | "tap" => "click".to_string(),
        "fill" | "fill input" | "type" | "enter" => "fill".to_string(),
        "check" | "verify" | "verify ui elements" | "assert" => "check".to_string(),
        "intent" | "goal" | "agent" | "agent step" => "intent".to_string(),
        _ => a.replace(' ', "_"),
    }
}

// Charter JSON shapes

#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(rename = "testScenario", alias = "name", default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "testCases", default)]
    test_cases: Vec<RawTestCase>,
    #[serde(rename = "negativeTests", default)]
    negative_tests: Option<Value>,
    #[serde(rename = "deviceMatrix", default)]
    device_matrix: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTestCase {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    steps: Vec<serde_json::Map<String, Value>>,
}

fn str_field(raw: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match raw.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn u32_field(raw: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        // "<TODO>" placeholders from generated charters are treated as absent
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_hints(raw: &serde_json::Map<String, Value>) -> LocatorHints {
    let node_path = str_field(raw, &["nodeCssSelector", "node_css_selector"]).and_then(|p| {
        let cleaned = p.strip_suffix("#text").unwrap_or(&p);
        let cleaned = cleaned.trim_end_matches('#').trim();
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    });
    LocatorHints {
        node_path,
        selector: str_field(raw, &["selector"]),
        test_id: str_field(raw, &["data-testid"]),
        aria_label: str_field(raw, &["aria-label", "aria_label"]),
        role: str_field(raw, &["role"]),
        name: str_field(raw, &["name"]),
        text: str_field(raw, &["text"]),
        value: str_field(raw, &["value"]),
    }
}

fn parse_step(case_id: &str, step_num: usize, raw: &serde_json::Map<String, Value>) -> Result<Step> {
    let invalid = |reason: String| JourneyError::InvalidStep {
        case_id: case_id.to_string(),
        step_num,
        reason,
    };

    let action = str_field(raw, &["action"]).ok_or_else(|| invalid("missing 'action'".into()))?;

    let kind = match normalize_action(&action).as_str() {
        "open_url" => StepKind::OpenUrl {
            target: str_field(raw, &["value"]),
        },
        "wait" => {
            let seconds = match raw.get("value") {
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            }
            .ok_or_else(|| invalid("wait requires a numeric 'value' in seconds".into()))?;
            StepKind::Wait { seconds }
        }
        "click" => StepKind::Click {
            hints: parse_hints(raw),
        },
        "fill" => {
            let value = str_field(raw, &["value"])
                .ok_or_else(|| invalid("fill requires a 'value'".into()))?;
            // The fill value is data, never a locator fallback
            let mut hints = parse_hints(raw);
            hints.value = None;
            StepKind::Fill { hints, value }
        }
        "check" => StepKind::Check {
            hints: parse_hints(raw),
        },
        "intent" => {
            let name = str_field(raw, &["intent", "goal"])
                .ok_or_else(|| invalid("intent step without 'intent' field".into()))?;
            let intent = IntentKind::from_name(&name)
                .ok_or_else(|| invalid(format!("unknown intent '{}'", name)))?;
            StepKind::Intent(IntentStep {
                intent,
                label: str_field(raw, &["name"]),
                params: IntentParams {
                    tab: str_field(raw, &["tab"]),
                    query: str_field(raw, &["query"]).filter(|q| q != "<TODO>"),
                    expected: str_field(raw, &["expected"]),
                    min_tabs: u32_field(raw, "min_tabs"),
                    min_results: u32_field(raw, "min_results"),
                    parameter: str_field(raw, &["parameter"]).filter(|p| p != "<TODO>"),
                    value: str_field(raw, &["value"]).filter(|v| v != "<TODO>"),
                    strategy: str_field(raw, &["strategy"]),
                    spec_required: raw
                        .get("spec_required")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
            })
        }
        other => return Err(invalid(format!("unknown action '{}'", other))),
    };

    Ok(Step { action, kind })
}

impl Charter {
    /// Parse and validate a charter from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: Vec<RawScenario> = serde_json::from_str(content)
            .map_err(|e| JourneyError::Charter(format!("invalid charter JSON: {}", e)))?;

        let mut seen_ids = HashSet::new();
        let mut scenarios = Vec::with_capacity(raw.len());

        for (idx, scenario) in raw.into_iter().enumerate() {
            let mut test_cases = Vec::with_capacity(scenario.test_cases.len());
            for tc in scenario.test_cases {
                let id = tc
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        JourneyError::Charter(format!("scenario {} has a test case without id", idx + 1))
                    })?;
                if !seen_ids.insert(id.clone()) {
                    return Err(JourneyError::Charter(format!("duplicate test case id '{}'", id)));
                }
                let steps = tc
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(i, raw_step)| parse_step(&id, i + 1, raw_step))
                    .collect::<Result<Vec<_>>>()?;
                test_cases.push(TestCase {
                    id,
                    description: tc.description.unwrap_or_default(),
                    steps,
                });
            }
            scenarios.push(Scenario {
                name: scenario.name.unwrap_or_else(|| format!("Scenario {}", idx + 1)),
                description: scenario.description.unwrap_or_default(),
                test_cases,
                negative_tests: scenario.negative_tests,
                device_matrix: scenario.device_matrix,
            });
        }

        Ok(Self { scenarios })
    }

    /// Load and validate a charter file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Total number of steps across all test cases
    pub fn step_count(&self) -> usize {
        self.scenarios
            .iter()
            .flat_map(|s| &s.test_cases)
            .map(|tc| tc.steps.len())
            .sum()
    }
}
