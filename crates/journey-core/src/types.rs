//! Core record types produced during a run
//!
//! Everything here is write-once evidence: created by the runner, appended to
//! durable storage, never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::verdict::{AtomicCheckResult, Verdict};

/// Which resolver strategy produced an element, and how it was described
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocator {
    /// Strategy number in resolver priority order (1-based), 0 for discovery
    pub strategy: u8,
    pub description: String,
}

/// Immutable record of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub ts: DateTime<Utc>,
    pub case_id: String,
    /// 1-based index within the test case
    pub step_index: usize,
    pub step_id: String,
    /// Normalized action name
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub verdict: Verdict,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atomic: Option<AtomicCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<ResolvedLocator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Page URL with query and fragment stripped
    pub page_url: String,
}

/// Step id as used in traces: `TC-01-Step3-ClickCTA`
pub fn step_id(case_id: &str, step_num: usize, action: &str) -> String {
    let compact: String = action.chars().filter(|c| !c.is_whitespace()).collect();
    format!("{}-Step{}-{}", case_id, step_num, compact)
}

/// Screenshot file name for a step: `TC-01_Step-3_Click-CTA.png`
pub fn screenshot_name(case_id: &str, step_num: usize, action: &str) -> String {
    format!("{}_Step-{}_{}.png", case_id, step_num, action.trim().replace(' ', "-"))
}

/// Direction of an observed network event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Request,
    Response,
}

/// Unredacted event as observed by the browser, before classification
///
/// Only ever lives inside the capture queue; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNetworkEvent {
    pub kind: NetworkKind,
    pub url: String,
    pub method: Option<String>,
    pub resource_type: Option<String>,
    pub status: Option<u16>,
    pub headers: Option<Value>,
    /// Request post data or response body text
    pub body: Option<String>,
}

impl RawNetworkEvent {
    pub fn request(method: &str, url: impl Into<String>) -> Self {
        Self {
            kind: NetworkKind::Request,
            url: url.into(),
            method: Some(method.to_string()),
            resource_type: None,
            status: None,
            headers: None,
            body: None,
        }
    }

    pub fn response(status: u16, url: impl Into<String>) -> Self {
        Self {
            kind: NetworkKind::Response,
            url: url.into(),
            method: None,
            resource_type: None,
            status: Some(status),
            headers: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: Value) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// A redacted, step-tagged request or response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub ts: DateTime<Utc>,
    /// Step id active when the event was drained
    pub step: Option<String>,
    pub kind: NetworkKind,
    pub method: Option<String>,
    pub resource_type: Option<String>,
    pub status: Option<u16>,
    pub ok: Option<bool>,
    /// URL with query and fragment stripped
    pub url: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    /// Named artifact written for this event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<String>,
    /// Numbered generic artifact written for this event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_api: Option<String>,
}

/// One visible interactive element in a UI snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiInventoryItem {
    pub tag: String,
    pub role: Option<String>,
    pub aria_label: Option<String>,
    pub test_id: Option<String>,
    pub id: Option<String>,
    pub name_attr: Option<String>,
    pub type_attr: Option<String>,
    /// Visible text, truncated to 120 characters
    pub text: String,
    pub href: Option<String>,
    pub css_path: String,
    pub score: i32,
}

impl UiInventoryItem {
    /// Buttons, links and anything with a button/link role
    pub fn is_clickable(&self) -> bool {
        let tag = self.tag.to_lowercase();
        let role = self.role.as_deref().unwrap_or("").to_lowercase();
        tag == "button" || tag == "a" || role.contains("button") || role.contains("link")
    }

    /// Lowercased haystack used for keyword matching
    pub fn haystack(&self) -> String {
        [
            Some(self.text.as_str()),
            self.aria_label.as_deref(),
            self.test_id.as_deref(),
            self.href.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

/// APP = the system under test is broken; SCRIPT = automation could not proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingKind {
    App,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A failure worth a human look
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub severity: Severity,
    pub case_id: String,
    pub step_num: usize,
    pub action: String,
    pub selector: Option<String>,
    pub summary: String,
    pub screenshot: Option<String>,
}

/// Aggregate counters over the step stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub steps_total: usize,
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
    pub aborted: bool,
    pub abort_reason: Option<String>,
    /// Evidence writes that failed open
    pub evidence_gaps: usize,
}

impl Totals {
    pub fn record(&mut self, verdict: Verdict) {
        self.steps_total += 1;
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Warn => self.warn += 1,
            Verdict::Fail => self.fail += 1,
        }
    }
}

/// Run metadata written at start and rewritten at the end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub start_url_redacted: String,
    pub charter_file: String,
    pub headless: bool,
    pub stop_on_blocker: bool,
    pub max_steps: Option<usize>,
    pub totals: Totals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_id_and_screenshot_name() {
        assert_eq!(step_id("TC-01", 3, "Click CTA"), "TC-01-Step3-ClickCTA");
        assert_eq!(
            screenshot_name("TC-01", 3, "Click CTA"),
            "TC-01_Step-3_Click-CTA.png"
        );
    }

    #[test]
    fn test_totals_record() {
        let mut totals = Totals::default();
        totals.record(Verdict::Pass);
        totals.record(Verdict::Warn);
        totals.record(Verdict::Warn);
        totals.record(Verdict::Fail);
        assert_eq!((totals.steps_total, totals.pass, totals.warn, totals.fail), (4, 1, 2, 1));
    }

    #[test]
    fn test_clickable_and_haystack() {
        let item = UiInventoryItem {
            tag: "div".into(),
            role: Some("button".into()),
            aria_label: Some("Online Leasen".into()),
            text: "Jetzt".into(),
            ..Default::default()
        };
        assert!(item.is_clickable());
        assert_eq!(item.haystack(), "jetzt online leasen");
    }

    #[test]
    fn test_finding_serializes_type_uppercase() {
        let finding = Finding {
            kind: FindingKind::App,
            severity: Severity::Critical,
            case_id: "TC-01".into(),
            step_num: 1,
            action: "click".into(),
            selector: None,
            summary: "Critical Error: Detected '404' page".into(),
            screenshot: None,
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["type"], "APP");
        assert_eq!(json["severity"], "critical");
    }
}
