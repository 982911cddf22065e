//! Post-run network summaries
//!
//! Both reports are derived from `network_trace.jsonl` and the artifacts
//! already on disk, so they can be regenerated for any finished run.

use crate::artifacts::{
    latest_numbered, read_json, DUC_LEASING_REQUEST, DUC_LEASING_RESPONSE,
    PROCESS_OPPORTUNITIES_PAYLOAD, PROCESS_OPPORTUNITIES_RESPONSE,
};
use crate::classify::{checkpoint_bucket, service_for_url};
use crate::pipeline::NETWORK_TRACE_FILE;
use crate::redact::redact_url_value;
use crate::trace::read_jsonl;
use chrono::Utc;
use journey_core::{Finding, FindingKind, Result, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const DATAFLOW_INVENTORY_FILE: &str = "dataflow_inventory.json";
pub const TECHNICAL_CHECKPOINTS_FILE: &str = "technical_checkpoints.json";

const MAX_SERVICE_EXAMPLES: usize = 4;
const MAX_SERVICE_STEPS: usize = 12;
const MAX_BUCKET_EXAMPLES: usize = 3;
const MAX_HOSTS: usize = 20;

/// Keys copied from the latest chosen-vehicle response
const CHOSEN_VEHICLE_KEYS: [&str; 7] = [
    "modelCode",
    "modelcode",
    "model",
    "derivative",
    "derivate",
    "vehicleId",
    "vehicle_id",
];

/// Hit statistics for one service or bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStats {
    pub hits: usize,
    pub statuses: BTreeMap<String, usize>,
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    pub all_2xx: bool,
}

impl Default for EndpointStats {
    fn default() -> Self {
        Self {
            hits: 0,
            statuses: BTreeMap::new(),
            examples: Vec::new(),
            steps: Vec::new(),
            all_2xx: true,
        }
    }
}

impl EndpointStats {
    fn record(&mut self, status: i64, url: &str, step: Option<&str>, max_examples: usize) {
        self.hits += 1;
        *self.statuses.entry(status.to_string()).or_insert(0) += 1;
        if !url.is_empty() && self.examples.len() < max_examples {
            self.examples.push(url.to_string());
        }
        if let Some(step) = step {
            if self.steps.len() < MAX_SERVICE_STEPS && !self.steps.iter().any(|s| s == step) {
                self.steps.push(step.to_string());
            }
        }
        if !(200..=299).contains(&status) {
            self.all_2xx = false;
        }
    }
}

/// Non-2xx response, labelled by service or bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCall {
    pub label: String,
    pub status: i64,
    pub url: String,
    pub step: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCount {
    pub host: String,
    pub hits: usize,
}

/// Which backend services the frontend talked to during the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataflowInventory {
    pub generated_at: String,
    pub network_trace: String,
    pub hosts: Vec<HostCount>,
    pub services: BTreeMap<String, EndpointStats>,
    pub non_2xx: Vec<FailedCall>,
}

/// Response records only; markers and requests are skipped
fn responses(events: &[Value]) -> impl Iterator<Item = (&str, i64, Option<&str>)> {
    events
        .iter()
        .filter(|ev| ev.get("kind").and_then(Value::as_str) == Some("response"))
        .map(|ev| {
            let url = ev.get("url").and_then(Value::as_str).unwrap_or("");
            let status = ev.get("status").and_then(Value::as_i64).unwrap_or(-1);
            let step = ev.get("step").and_then(Value::as_str);
            (url, status, step)
        })
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Aggregate trace records into a [`DataflowInventory`]
pub fn build_dataflow(events: &[Value]) -> DataflowInventory {
    let mut services: BTreeMap<String, EndpointStats> = BTreeMap::new();
    let mut hosts: BTreeMap<String, usize> = BTreeMap::new();
    let mut non_2xx = Vec::new();

    for (url, status, step) in responses(events) {
        let service = service_for_url(url);
        if let Some(host) = host_of(url) {
            *hosts.entry(host).or_insert(0) += 1;
        }
        services
            .entry(service.clone())
            .or_default()
            .record(status, url, step, MAX_SERVICE_EXAMPLES);
        if !(200..=299).contains(&status) {
            non_2xx.push(FailedCall {
                label: service,
                status,
                url: url.to_string(),
                step: step.map(str::to_string),
            });
        }
    }

    let mut hosts: Vec<HostCount> = hosts
        .into_iter()
        .map(|(host, hits)| HostCount { host, hits })
        .collect();
    hosts.sort_by(|a, b| b.hits.cmp(&a.hits));
    hosts.truncate(MAX_HOSTS);

    DataflowInventory {
        generated_at: Utc::now().to_rfc3339(),
        network_trace: NETWORK_TRACE_FILE.to_string(),
        hosts,
        services,
        non_2xx,
    }
}

fn mermaid_id(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("N_{}", cleaned)
}

fn health_lines(stats: &BTreeMap<String, EndpointStats>, empty: &str) -> Vec<String> {
    if stats.is_empty() {
        return vec![format!("- {}", empty)];
    }
    let mut lines = Vec::new();
    for (name, st) in stats {
        lines.push(format!(
            "- {}: {} (hits={}, statuses={:?})",
            name,
            if st.all_2xx { "PASS" } else { "FAIL" },
            st.hits,
            st.statuses
        ));
        lines.extend(st.examples.iter().map(|ex| format!("  - example: {}", ex)));
    }
    lines
}

fn render_dataflow_markdown(inventory: &DataflowInventory) -> String {
    let mut md = vec![
        "# Dataflow Inventory".to_string(),
        String::new(),
        format!("Source: {}", inventory.network_trace),
        String::new(),
        "## Services".to_string(),
        String::new(),
    ];
    md.extend(health_lines(
        &inventory.services,
        "No backend responses in the trace (short run or narrow filter).",
    ));
    md.extend([
        String::new(),
        "## Flow".to_string(),
        String::new(),
        "```mermaid".to_string(),
        "flowchart LR".to_string(),
        "  FE[Checkout Frontend]".to_string(),
    ]);
    for (name, stats) in &inventory.services {
        if stats.hits == 0 {
            continue;
        }
        let id = mermaid_id(name);
        md.push(format!("  {}[{}]", id, name));
        md.push(format!("  FE --> {}", id));
    }
    md.push("```".to_string());
    md.join("\n")
}

/// Build the dataflow inventory from the run's trace and write json + md
pub fn write_dataflow_inventory(run_dir: &Path) -> Result<DataflowInventory> {
    let events = read_jsonl(&run_dir.join(NETWORK_TRACE_FILE));
    let inventory = build_dataflow(&events);
    std::fs::write(
        run_dir.join(DATAFLOW_INVENTORY_FILE),
        serde_json::to_string_pretty(&inventory)?,
    )?;
    std::fs::write(
        run_dir.join("dataflow_inventory.md"),
        render_dataflow_markdown(&inventory),
    )?;
    info!(
        "Dataflow inventory: {} services, {} non-2xx",
        inventory.services.len(),
        inventory.non_2xx.len()
    );
    Ok(inventory)
}

/// Continuation evidence from a leasing response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DucContinuation {
    /// Key → redacted URL
    pub continuation_links: BTreeMap<String, String>,
    pub token_present: bool,
}

fn is_link_key(key: &str) -> bool {
    let k = key.to_lowercase();
    (k.contains("entry") && k.contains("point"))
        || (k.contains("continue") && k.contains("checkout"))
        || (k.contains("url") && k.contains("checkout"))
}

fn visit_keys<'a>(value: &'a Value, found: &mut Vec<(&'a str, &'a Value)>, pred: &dyn Fn(&str) -> bool) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if pred(key) {
                    found.push((key.as_str(), child));
                }
                visit_keys(child, found, pred);
            }
        }
        Value::Array(items) => items.iter().for_each(|child| visit_keys(child, found, pred)),
        _ => {}
    }
}

/// Continuation links and token presence anywhere in `body`
pub fn duc_continuation(body: &Value) -> DucContinuation {
    let mut links = Vec::new();
    visit_keys(body, &mut links, &is_link_key);
    let continuation_links = links
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_str()
                .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
                .map(|s| (key.to_string(), redact_url_value(s)))
        })
        .collect();

    let mut tokens = Vec::new();
    visit_keys(body, &mut tokens, &|k: &str| k.to_lowercase().contains("token"));
    DucContinuation {
        continuation_links,
        token_present: !tokens.is_empty(),
    }
}

/// Continuation evidence from the persisted leasing response, if any
pub fn read_duc_continuation(run_dir: &Path) -> Option<DucContinuation> {
    read_json(&run_dir.join(DUC_LEASING_RESPONSE)).map(|body| duc_continuation(&body))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalCheckpoints {
    pub generated_at: String,
    pub network_trace: String,
    pub endpoints: BTreeMap<String, EndpointStats>,
    pub non_2xx: Vec<FailedCall>,
    #[serde(rename = "processOpportunities")]
    pub process_opportunities: Value,
    #[serde(rename = "ducLeasing")]
    pub duc_leasing: Value,
    #[serde(rename = "chosenVehicle")]
    pub chosen_vehicle: Option<serde_json::Map<String, Value>>,
}

fn existing(run_dir: &Path, name: &str) -> Option<String> {
    run_dir.join(name).exists().then(|| name.to_string())
}

fn chosen_vehicle_extract(run_dir: &Path) -> Option<serde_json::Map<String, Value>> {
    let path = latest_numbered(run_dir, "chosenVehicle_response")?;
    let Value::Object(body) = read_json(&path)? else {
        return None;
    };
    let extract: serde_json::Map<String, Value> = CHOSEN_VEHICLE_KEYS
        .iter()
        .filter_map(|k| body.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect();
    (!extract.is_empty()).then_some(extract)
}

/// Per-bucket call health plus the primary integration artifacts
pub fn build_checkpoints(run_dir: &Path, events: &[Value]) -> TechnicalCheckpoints {
    let mut endpoints: BTreeMap<String, EndpointStats> = BTreeMap::new();
    let mut non_2xx = Vec::new();
    for (url, status, step) in responses(events) {
        let Some(bucket) = checkpoint_bucket(url) else {
            continue;
        };
        let stats = endpoints.entry(bucket.to_string()).or_default();
        stats.record(status, url, None, MAX_BUCKET_EXAMPLES);
        if !(200..=299).contains(&status) {
            non_2xx.push(FailedCall {
                label: bucket.to_string(),
                status,
                url: url.to_string(),
                step: step.map(str::to_string),
            });
        }
    }

    let payload_keys = read_json(&run_dir.join(PROCESS_OPPORTUNITIES_PAYLOAD)).and_then(|v| {
        v.as_object().map(|m| {
            let mut keys: Vec<String> = m.keys().cloned().collect();
            keys.sort();
            keys
        })
    });
    let duc = read_duc_continuation(run_dir).unwrap_or_default();

    TechnicalCheckpoints {
        generated_at: Utc::now().to_rfc3339(),
        network_trace: NETWORK_TRACE_FILE.to_string(),
        endpoints,
        non_2xx,
        process_opportunities: serde_json::json!({
            "payload_file": existing(run_dir, PROCESS_OPPORTUNITIES_PAYLOAD),
            "response_file": existing(run_dir, PROCESS_OPPORTUNITIES_RESPONSE),
            "payload_keys": payload_keys,
        }),
        duc_leasing: serde_json::json!({
            "request_file": existing(run_dir, DUC_LEASING_REQUEST),
            "response_file": existing(run_dir, DUC_LEASING_RESPONSE),
            "continuation_links": duc.continuation_links,
            "token_present": duc.token_present,
        }),
        chosen_vehicle: chosen_vehicle_extract(run_dir),
    }
}

/// APP/high finding for every backend 5xx
pub fn backend_findings(checkpoints: &TechnicalCheckpoints) -> Vec<Finding> {
    checkpoints
        .non_2xx
        .iter()
        .filter(|call| call.status >= 500)
        .map(|call| Finding {
            kind: FindingKind::App,
            severity: Severity::High,
            case_id: "NETWORK".to_string(),
            step_num: 0,
            action: call.step.clone().unwrap_or_default(),
            selector: Some(call.url.clone()),
            summary: format!("Backend response {} for {}", call.status, call.label),
            screenshot: None,
        })
        .collect()
}

fn file_or_missing(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("not captured")
        .to_string()
}

fn render_checkpoints_markdown(cp: &TechnicalCheckpoints, run_dir: &Path) -> String {
    let mut md = vec![
        "# Technical Checkpoints".to_string(),
        String::new(),
        "## 1) Call health (2xx)".to_string(),
        String::new(),
    ];
    md.extend(health_lines(
        &cp.endpoints,
        "No relevant endpoints in the trace (short run or narrow filter).",
    ));
    md.extend([
        String::new(),
        "## 2) processOpportunities".to_string(),
        String::new(),
        format!("- Payload: {}", file_or_missing(&cp.process_opportunities, "payload_file")),
        format!("- Response: {}", file_or_missing(&cp.process_opportunities, "response_file")),
        String::new(),
        "## 3) duc-leasing".to_string(),
        String::new(),
        format!("- Request: {}", file_or_missing(&cp.duc_leasing, "request_file")),
        format!("- Response: {}", file_or_missing(&cp.duc_leasing, "response_file")),
        format!(
            "- Token present (presence only): {}",
            cp.duc_leasing["token_present"].as_bool().unwrap_or(false)
        ),
    ]);
    match cp.duc_leasing["continuation_links"].as_object() {
        Some(links) if !links.is_empty() => {
            md.push("- Continuation links (redacted):".to_string());
            for (key, url) in links {
                md.push(format!("  - {}: {}", key, url.as_str().unwrap_or("")));
            }
        }
        _ => md.push("- Continuation links: not found (run may have ended before this step).".to_string()),
    }
    md.extend([
        String::new(),
        "## 4) Dealer / pickup / chosen vehicle".to_string(),
        String::new(),
        format!(
            "- api/: {}",
            if run_dir.join(crate::artifacts::API_DIR).exists() { "present" } else { "absent" }
        ),
    ]);
    if let Some(vehicle) = &cp.chosen_vehicle {
        md.push(format!("- chosenVehicle extract: {}", Value::Object(vehicle.clone())));
    }
    md.join("\n")
}

/// Write technical_checkpoints.json + .md and return the backend findings
pub fn write_technical_checkpoints(run_dir: &Path) -> Result<Vec<Finding>> {
    let events = read_jsonl(&run_dir.join(NETWORK_TRACE_FILE));
    let checkpoints = build_checkpoints(run_dir, &events);
    std::fs::write(
        run_dir.join(TECHNICAL_CHECKPOINTS_FILE),
        serde_json::to_string_pretty(&checkpoints)?,
    )?;
    std::fs::write(
        run_dir.join("technical_checkpoints.md"),
        render_checkpoints_markdown(&checkpoints, run_dir),
    )?;
    Ok(backend_findings(&checkpoints))
}
