//! JSON redaction
//!
//! A [`Redactor`] walks a `serde_json::Value` and rebuilds it with secrets
//! replaced, PII hashed and URL strings stripped of query and fragment. The
//! key policy is injected through [`KeyClassifier`].

use crate::classify::{DefaultKeyPolicy, KeyClass, KeyClassifier};
use journey_core::redact_url;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Marker written in place of sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// Header values longer than this are replaced by their length
pub const MAX_HEADER_LEN: usize = 200;

/// Hex SHA-256 of a UTF-8 string
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// `{"_sha256": ..., "_len": ...}` stand-in for a PII string
pub fn digest(value: &str) -> Value {
    json!({
        "_sha256": sha256_hex(value),
        "_len": value.chars().count(),
    })
}

/// Strip query and fragment from absolute http(s) URLs, leave other strings alone
pub fn redact_url_value(value: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        redact_url(value)
    } else {
        value.to_string()
    }
}

/// Typed visitor over JSON values
pub struct Redactor<C = DefaultKeyPolicy> {
    classifier: C,
}

impl Default for Redactor<DefaultKeyPolicy> {
    fn default() -> Self {
        Self::new()
    }
}

impl Redactor<DefaultKeyPolicy> {
    pub fn new() -> Self {
        Self {
            classifier: DefaultKeyPolicy,
        }
    }
}

impl<C: KeyClassifier> Redactor<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Redacted copy of `value`
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.visit_object(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            Value::String(s) => Value::String(redact_url_value(s)),
            other => other.clone(),
        }
    }

    fn visit_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| (key.clone(), self.visit_entry(key, value)))
            .collect()
    }

    fn visit_entry(&self, key: &str, value: &Value) -> Value {
        match (self.classifier.classify(key), value) {
            (KeyClass::Sensitive, _) => Value::String(REDACTED.to_string()),
            (KeyClass::Pii, Value::String(s)) => digest(s),
            _ => self.redact(value),
        }
    }

    /// Header map with sensitive values masked and long values summarized
    ///
    /// Anything that is not an object becomes an empty object.
    pub fn redact_headers(&self, headers: &Value) -> Value {
        let Value::Object(map) = headers else {
            return Value::Object(Map::new());
        };
        let out = map
            .iter()
            .map(|(key, value)| {
                let value = match (self.classifier.classify(key), value) {
                    (KeyClass::Sensitive, _) => Value::String(REDACTED.to_string()),
                    (_, Value::String(s)) if s.chars().count() > MAX_HEADER_LEN => {
                        Value::String(format!("<string len={}>", s.chars().count()))
                    }
                    (_, other) => other.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        Value::Object(out)
    }
}
