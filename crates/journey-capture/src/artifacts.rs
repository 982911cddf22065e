//! Redacted artifact store
//!
//! Named files (`duc_leasing_response.json`, ...) always hold the latest
//! occurrence; numbered files under `api/` keep every occurrence with a
//! per-kind counter. Both go through the redactor before touching disk.

use crate::redact::Redactor;
use journey_core::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const API_DIR: &str = "api";

pub const PROCESS_OPPORTUNITIES_PAYLOAD: &str = "processOpportunities_payload_redacted.json";
pub const PROCESS_OPPORTUNITIES_RESPONSE: &str = "processOpportunities_response_redacted.json";
pub const DUC_LEASING_REQUEST: &str = "duc_leasing_request_redacted.json";
pub const DUC_LEASING_RESPONSE: &str = "duc_leasing_response.json";
pub const FORM_DEFINITION_RESPONSE: &str = "formDefinition_response_redacted.json";
pub const FORM_SNAPSHOT_BEFORE_PROCESS_OPPORTUNITIES: &str =
    "form_snapshot_before_processOpportunities.json";
pub const FORM_SNAPSHOT_BEFORE_DUC_LEASING: &str = "form_snapshot_before_duc_leasing.json";

/// Run-scoped artifact writer; owns the numbered-artifact counters
pub struct ArtifactStore {
    run_dir: PathBuf,
    counters: HashMap<String, usize>,
    redactor: Redactor,
    form_definition: Option<Value>,
}

impl ArtifactStore {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            counters: HashMap::new(),
            redactor: Redactor::new(),
            form_definition: None,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Occurrences written so far for `kind`
    pub fn count(&self, kind: &str) -> usize {
        self.counters.get(kind).copied().unwrap_or(0)
    }

    /// Write `api/<kind>_NNN.json`, returning the run-relative path
    ///
    /// The counter advances even when the write fails, so numbers stay unique.
    pub fn write_numbered(&mut self, kind: &str, payload: &Value) -> Result<String> {
        let counter = self.counters.entry(kind.to_string()).or_insert(0);
        *counter += 1;
        let name = format!("{}_{:03}.json", kind, counter);

        let dir = self.run_dir.join(API_DIR);
        std::fs::create_dir_all(&dir)?;
        let redacted = self.redactor.redact(payload);
        std::fs::write(dir.join(&name), serde_json::to_string_pretty(&redacted)?)?;
        debug!("API artifact written: {}/{}", API_DIR, name);
        Ok(format!("{}/{}", API_DIR, name))
    }

    /// Redact `payload` and write it to `<run_dir>/<name>`
    pub fn write_named(&self, name: &str, payload: &Value) -> Result<String> {
        self.write_plain(name, &self.redactor.redact(payload))
    }

    /// Write an already-safe document (e.g. a hashed form snapshot) as is
    pub fn write_plain(&self, name: &str, document: &Value) -> Result<String> {
        std::fs::create_dir_all(&self.run_dir)?;
        std::fs::write(self.run_dir.join(name), serde_json::to_string_pretty(document)?)?;
        debug!("Artifact written: {}", name);
        Ok(name.to_string())
    }

    /// Remember the latest form definition (stored redacted)
    pub fn set_form_definition(&mut self, schema: &Value) {
        self.form_definition = Some(self.redactor.redact(schema));
    }

    /// Latest captured form definition, used for auto-fill hints
    pub fn form_definition(&self) -> Option<&Value> {
        self.form_definition.as_ref()
    }
}

/// Parse a persisted JSON artifact, `None` when missing or malformed
pub fn read_json(path: &Path) -> Option<Value> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Newest `api/<kind>_NNN.json` by file name
pub fn latest_numbered(run_dir: &Path, kind: &str) -> Option<PathBuf> {
    let prefix = format!("{}_", kind);
    let mut matches: Vec<PathBuf> = std::fs::read_dir(run_dir.join(API_DIR))
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".json"))
        })
        .collect();
    matches.sort();
    matches.pop()
}
