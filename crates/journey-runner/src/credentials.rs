//! HTTP basic-auth credentials for protected staging sites
//!
//! `.secrets/credentials.json` maps arbitrary keys to
//! `{ "base_url": ..., "username": ..., "password": ... }`; the first entry
//! whose `base_url` prefixes the start URL wins.

use journey_browser::HttpCredentials;
use journey_core::{redact_url, JourneyError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

pub const CREDENTIALS_FILE: &str = ".secrets/credentials.json";

/// First entry (in file order) whose `base_url` prefixes `url`
pub fn credentials_for_url(url: &str, data: &Value) -> Option<HttpCredentials> {
    let entries = data.as_object()?;
    for (key, entry) in entries {
        let Some(base_url) = entry.get("base_url").and_then(Value::as_str) else {
            continue;
        };
        if !url.starts_with(base_url) {
            continue;
        }
        let username = entry.get("username").and_then(Value::as_str);
        let password = entry.get("password").and_then(Value::as_str);
        if let (Some(username), Some(password)) = (username, password) {
            info!("Using credentials '{}' for {}", key, redact_url(url));
            return Some(HttpCredentials {
                username: username.to_string(),
                password: password.to_string(),
            });
        }
    }
    None
}

/// Load credentials for `url` from `path`
///
/// A missing file means no authentication; a malformed one is an error.
pub fn load_credentials(path: &Path, url: &str) -> Result<Option<HttpCredentials>> {
    if !path.exists() {
        info!("No credentials file found, proceeding without authentication");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&content).map_err(|e| {
        JourneyError::Config(format!("could not decode {}: {}", path.display(), e))
    })?;
    let found = credentials_for_url(url, &data);
    if found.is_none() {
        warn!("No matching credentials for {}", redact_url(url));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_match_in_file_order() {
        let data = json!({
            "prod": {"base_url": "https://shop.example/", "username": "p", "password": "pw"},
            "staging": {"base_url": "https://staging.shop.example/", "username": "s", "password": "sw"},
            "broken": {"base_url": "https://staging.shop.example/de"}
        });
        let creds = credentials_for_url("https://staging.shop.example/de1/x", &data).unwrap();
        assert_eq!(creds.username, "s");
        assert!(credentials_for_url("https://elsewhere.example/", &data).is_none());
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        assert_eq!(load_credentials(&path, "https://x/").unwrap(), None);

        std::fs::write(&path, "{not json").unwrap();
        assert!(load_credentials(&path, "https://x/").is_err());

        std::fs::write(
            &path,
            r#"{"a": {"base_url": "https://x/", "username": "u", "password": "p"}}"#,
        )
        .unwrap();
        assert_eq!(
            load_credentials(&path, "https://x/y").unwrap(),
            Some(HttpCredentials {
                username: "u".into(),
                password: "p".into()
            })
        );
    }
}
