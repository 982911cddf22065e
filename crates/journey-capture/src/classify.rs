//! URL and key classification
//!
//! Everything here is a pure function of a URL or a JSON key, so the capture
//! policy can be tested without a browser.

use url::Url;

/// Key fragments whose values never reach disk
pub const SENSITIVE_KEYWORDS: [&str; 16] = [
    "oneapikey",
    "endpoint",
    "signature",
    "token",
    "authorization",
    "cookie",
    "set-cookie",
    "apikey",
    "api_key",
    "client_secret",
    "password",
    "passwd",
    "secret",
    "id_token",
    "access_token",
    "refresh_token",
];

/// Key fragments that mark personally identifying values
pub const PII_KEYWORDS: [&str; 11] = [
    "email",
    "e_mail",
    "first",
    "firstname",
    "first_name",
    "last",
    "lastname",
    "last_name",
    "phone",
    "mobile",
    "tel",
];

/// Analytics and telemetry hosts that are never captured
pub const DENY_HOSTS: [&str; 7] = [
    "fsignals.plt-live.net",
    "google-analytics",
    "googletagmanager",
    "doubleclick",
    "hotjar",
    "sentry",
    "datadoghq",
];

/// URL fragments of the product backends worth capturing
pub const ALLOW_SUBSTRINGS: [&str; 13] = [
    "/bff-forms/",
    "/bff/",
    "/app/authproxy/",
    "processopportunities",
    "duc-leasing",
    "chosenvehicle",
    "chosen-vehicle",
    "pickuplocation",
    "pickup-location",
    "/pickup",
    "webcalc",
    "sds",
    "dealer",
];

/// How a JSON key's value is treated on persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// Replaced by the redaction marker
    Sensitive,
    /// String values replaced by a digest and a length
    Pii,
    Plain,
}

/// Decides the [`KeyClass`] of a JSON key
pub trait KeyClassifier: Send + Sync {
    fn classify(&self, key: &str) -> KeyClass;
}

/// Substring match against [`SENSITIVE_KEYWORDS`] and [`PII_KEYWORDS`]
/// after lowercasing and mapping `-` to `_`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyPolicy;

impl KeyClassifier for DefaultKeyPolicy {
    fn classify(&self, key: &str) -> KeyClass {
        let key = key.to_lowercase().replace('-', "_");
        if SENSITIVE_KEYWORDS.iter().any(|word| key.contains(word)) {
            KeyClass::Sensitive
        } else if PII_KEYWORDS.iter().any(|word| key.contains(word)) {
            KeyClass::Pii
        } else {
            KeyClass::Plain
        }
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .filter(|h| !h.is_empty())
}

/// Host belongs to an analytics/telemetry vendor
pub fn is_denied_host(url: &str) -> bool {
    host_of(url).is_some_and(|host| DENY_HOSTS.iter().any(|d| host.contains(d)))
}

/// Opportunity submission or leasing continuation
pub fn is_primary_target(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("processopportunities") || lower.contains("duc-leasing")
}

/// Whether traffic to `url` is recorded at all
pub fn is_captured(url: &str) -> bool {
    if is_primary_target(url) {
        return true;
    }
    if is_denied_host(url) {
        return false;
    }
    let lower = url.to_lowercase();
    ALLOW_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// Semantic category for numbered API artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    ProcessOpportunities,
    DucLeasing,
    PickupLocation,
    Pickup,
    ChosenVehicle,
    Dealer,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessOpportunities => "processOpportunities",
            Self::DucLeasing => "duc_leasing",
            Self::PickupLocation => "pickupLocation",
            Self::Pickup => "pickup",
            Self::ChosenVehicle => "chosenVehicle",
            Self::Dealer => "dealer",
        }
    }

    /// Primary categories get named artifacts instead of `<category>_response`
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::ProcessOpportunities | Self::DucLeasing)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn category_for_url(url: &str) -> Option<Category> {
    let lower = url.to_lowercase();
    if lower.contains("processopportunities") {
        Some(Category::ProcessOpportunities)
    } else if lower.contains("duc-leasing") {
        Some(Category::DucLeasing)
    } else if lower.contains("pickuplocation") || lower.contains("pickup-location") {
        Some(Category::PickupLocation)
    } else if lower.contains("/pickup") {
        Some(Category::Pickup)
    } else if lower.contains("chosenvehicle") || lower.contains("chosen-vehicle") {
        Some(Category::ChosenVehicle)
    } else if lower.contains("sds") || lower.contains("dealer") {
        Some(Category::Dealer)
    } else {
        None
    }
}

/// Service label used for trace buckets and the dataflow inventory
pub fn service_for_url(url: &str) -> String {
    let lower = url.to_lowercase();
    let label = if lower.contains("authproxy") {
        if lower.contains("authenticated") {
            "authproxy/authenticated"
        } else if lower.contains("/user") {
            "authproxy/user"
        } else {
            "authproxy"
        }
    } else if lower.contains("processopportunities") {
        "processOpportunities"
    } else if lower.contains("duc-leasing") {
        "duc-leasing"
    } else if lower.contains("/bff-forms/") {
        "bff-forms"
    } else if lower.contains("/bff/") {
        "bff"
    } else if lower.contains("chosenvehicle") || lower.contains("chosen-vehicle") {
        "chosenVehicle"
    } else if lower.contains("pickuplocation") || lower.contains("pickup-location") {
        "pickupLocation"
    } else if lower.contains("/pickup") {
        "pickup"
    } else if lower.contains("sds") || lower.contains("dealer") {
        "dealer/sds"
    } else {
        return match host_of(url) {
            Some(host) => format!("host:{}", host),
            None => "other".to_string(),
        };
    };
    label.to_string()
}

/// Checkpoint buckets, most specific first
const CHECKPOINT_BUCKETS: [(&str, &[&str]); 8] = [
    ("processOpportunities", &["processopportunities"]),
    ("duc-leasing", &["duc-leasing"]),
    ("dealer/sds", &["sds", "dealer"]),
    ("pickupLocation", &["pickuplocation", "pickup-location"]),
    ("pickup", &["/pickup"]),
    ("chosenVehicle", &["chosenvehicle", "chosen-vehicle"]),
    ("bff-forms", &["/bff-forms/"]),
    ("bff", &["/bff/"]),
];

/// Bucket for the technical checkpoint health table
pub fn checkpoint_bucket(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    CHECKPOINT_BUCKETS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(name, _)| *name)
}
