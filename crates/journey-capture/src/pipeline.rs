//! Drained-event processing
//!
//! Turns raw browser events into redacted, step-tagged [`NetworkEvent`]s,
//! appends them to the network trace and persists artifacts for the
//! endpoints worth auditing.

use crate::artifacts::{
    ArtifactStore, DUC_LEASING_REQUEST, DUC_LEASING_RESPONSE, FORM_DEFINITION_RESPONSE,
    FORM_SNAPSHOT_BEFORE_DUC_LEASING, FORM_SNAPSHOT_BEFORE_PROCESS_OPPORTUNITIES,
    PROCESS_OPPORTUNITIES_PAYLOAD, PROCESS_OPPORTUNITIES_RESPONSE,
};
use crate::classify::{category_for_url, is_captured, is_primary_target, service_for_url};
use crate::redact::{digest, Redactor};
use crate::trace::JsonlWriter;
use chrono::Utc;
use journey_browser::Page;
use journey_core::fail_open::{fail_open, fail_open_sync, EvidenceGaps};
use journey_core::{redact_url, NetworkEvent, NetworkKind, RawNetworkEvent, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum fields kept in a form snapshot
pub const MAX_FORM_FIELDS: usize = 200;

pub const NETWORK_TRACE_FILE: &str = "network_trace.jsonl";

/// Hashed snapshot of the visible form fields
///
/// Values are stored as digest + length only.
pub async fn form_snapshot(page: &dyn Page) -> Result<Value> {
    let fields = page.form_fields().await?;
    let items: Vec<Value> = fields
        .iter()
        .take(MAX_FORM_FIELDS)
        .map(|field| {
            json!({
                "tag": field.tag,
                "type": field.input_type,
                "label": field.label,
                "testid": field.test_id,
                "name": field.name,
                "id": field.id,
                "value": digest(&field.value),
                "checked": field.checked,
            })
        })
        .collect();
    Ok(json!({
        "url": redact_url(&page.url().await?),
        "count": items.len(),
        "items": items,
    }))
}

fn parse_body(raw: &RawNetworkEvent) -> Option<Value> {
    raw.body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .and_then(|b| serde_json::from_str(b).ok())
}

fn is_post(raw: &RawNetworkEvent) -> bool {
    raw.method
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case("POST"))
}

/// Capture state for one run
pub struct CapturePipeline {
    store: ArtifactStore,
    trace: JsonlWriter,
    redactor: Redactor,
    gaps: Arc<EvidenceGaps>,
}

impl CapturePipeline {
    pub fn new(run_dir: impl Into<PathBuf>, gaps: Arc<EvidenceGaps>) -> Self {
        let run_dir = run_dir.into();
        Self {
            trace: JsonlWriter::new(run_dir.join(NETWORK_TRACE_FILE)),
            store: ArtifactStore::new(run_dir),
            redactor: Redactor::new(),
            gaps,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn trace(&self) -> &JsonlWriter {
        &self.trace
    }

    /// Lifecycle marker in the network trace (fail-open)
    pub async fn mark(&self, event: &str, step: Option<&str>, extra: Value) {
        fail_open("network_trace::mark", &self.gaps, || {
            self.trace.mark(event, step, extra)
        })
        .await;
    }

    /// Process drained events under the step that was active
    ///
    /// `page` is used for form snapshots before the primary submissions.
    /// Returns the events that passed the capture filter.
    pub async fn process(
        &mut self,
        events: Vec<RawNetworkEvent>,
        step: Option<&str>,
        page: Option<&dyn Page>,
    ) -> Vec<NetworkEvent> {
        let mut recorded = Vec::new();
        for raw in events {
            if !is_captured(&raw.url) {
                continue;
            }
            let mut event = self.to_event(&raw, step);
            match raw.kind {
                NetworkKind::Request => self.on_request(&raw, &mut event, page).await,
                NetworkKind::Response => self.on_response(&raw, &mut event),
            }
            fail_open("network_trace::append", &self.gaps, || self.trace.append(&event)).await;
            recorded.push(event);
        }
        recorded
    }

    fn to_event(&self, raw: &RawNetworkEvent, step: Option<&str>) -> NetworkEvent {
        let headers = if is_primary_target(&raw.url) {
            raw.headers.as_ref().map(|h| self.redactor.redact_headers(h))
        } else {
            None
        };
        NetworkEvent {
            ts: Utc::now(),
            step: step.map(str::to_string),
            kind: raw.kind,
            method: raw.method.clone(),
            resource_type: raw.resource_type.clone(),
            status: raw.status,
            ok: raw.status.map(|s| (200..=299).contains(&s)),
            url: redact_url(&raw.url),
            bucket: service_for_url(&raw.url),
            headers,
            saved: None,
            saved_api: None,
        }
    }

    fn numbered(&mut self, kind: &str, payload: &Value) -> Option<String> {
        let result = self.store.write_numbered(kind, payload);
        fail_open_sync("artifacts::write_numbered", &self.gaps, result)
    }

    fn named(&self, name: &str, payload: &Value) -> Option<String> {
        fail_open_sync("artifacts::write_named", &self.gaps, self.store.write_named(name, payload))
    }

    async fn on_request(
        &mut self,
        raw: &RawNetworkEvent,
        event: &mut NetworkEvent,
        page: Option<&dyn Page>,
    ) {
        if !is_post(raw) {
            return;
        }
        let lower = raw.url.to_lowercase();
        let (named, kind, snapshot_name) = if lower.contains("processopportunities") {
            (
                PROCESS_OPPORTUNITIES_PAYLOAD,
                "processOpportunities_payload",
                FORM_SNAPSHOT_BEFORE_PROCESS_OPPORTUNITIES,
            )
        } else if lower.contains("duc-leasing") {
            (DUC_LEASING_REQUEST, "duc_leasing_request", FORM_SNAPSHOT_BEFORE_DUC_LEASING)
        } else {
            return;
        };

        let Some(payload) = parse_body(raw) else {
            debug!("{} POST payload was not JSON", kind);
            return;
        };
        info!("Captured {} ({})", kind, event.url);
        event.saved = self.named(named, &payload);
        event.saved_api = self.numbered(kind, &payload);

        if let Some(page) = page {
            let store = &self.store;
            fail_open("artifacts::form_snapshot", &self.gaps, || async move {
                let snapshot = form_snapshot(page).await?;
                store.write_plain(snapshot_name, &snapshot)
            })
            .await;
        }
    }

    fn on_response(&mut self, raw: &RawNetworkEvent, event: &mut NetworkEvent) {
        let lower = raw.url.to_lowercase();
        let body = parse_body(raw);

        if lower.contains("/bff-forms/formdefinition") {
            if let Some(schema) = body.as_ref().filter(|b| b.is_object()) {
                event.saved = self.named(FORM_DEFINITION_RESPONSE, schema);
                event.saved_api = self.numbered("formDefinition_response", schema);
                self.store.set_form_definition(schema);
            }
        }

        let Some(body) = body else {
            return;
        };
        if let Some(category) = category_for_url(&raw.url).filter(|c| !c.is_primary()) {
            event.saved_api = self.numbered(&format!("{}_response", category), &body);
        }
        if lower.contains("duc-leasing") {
            info!("Captured duc-leasing response ({})", event.url);
            event.saved = self.named(DUC_LEASING_RESPONSE, &body);
            event.saved_api = self.numbered("duc_leasing_response", &body);
        }
        if lower.contains("processopportunities") {
            info!("Captured processOpportunities response ({})", event.url);
            event.saved = self.named(PROCESS_OPPORTUNITIES_RESPONSE, &body);
            event.saved_api = self.numbered("processOpportunities_response", &body);
        }
    }
}
