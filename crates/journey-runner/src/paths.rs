//! Run directory layout and charter URL resolution

use journey_core::Result;
use std::path::{Path, PathBuf};
use url::Url;

pub const SCREENSHOTS_DIR: &str = "screenshots";
pub const INPUTS_DIR: &str = "inputs";
pub const START_URL_FILE: &str = "start_url_redacted.txt";

/// `<results_root>/<run_id>/` and its fixed subdirectories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub run_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub inputs_dir: PathBuf,
}

impl RunPaths {
    pub fn new(results_root: &Path, run_id: &str) -> Self {
        let run_dir = results_root.join(run_id);
        Self {
            screenshots_dir: run_dir.join(SCREENSHOTS_DIR),
            inputs_dir: run_dir.join(INPUTS_DIR),
            run_dir,
        }
    }

    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(&self.screenshots_dir)?;
        std::fs::create_dir_all(&self.inputs_dir)?;
        Ok(())
    }

    pub fn screenshot(&self, name: &str) -> PathBuf {
        self.screenshots_dir.join(name)
    }
}

/// Local timestamp run id, e.g. `2024-05-01_09-30-00`
pub fn default_run_id() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Resolve a charter `open_url` value against the start URL
///
/// Absolute URLs pass through. Paths get the start URL's first path segment
/// (the locale, e.g. `/de1`) prepended unless they already carry it. Empty
/// values and unparseable start URLs yield `None`.
pub fn resolve_open_url(start_url: &str, value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let lower = value.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(value.to_string());
    }

    let start = Url::parse(start_url).ok()?;
    start.host_str()?;
    let base = start.origin().ascii_serialization();
    let locale = start
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .unwrap_or_default();

    if value.starts_with('/') {
        let prefixed = !locale.is_empty()
            && (value.starts_with(&format!("/{}/", locale))
                || value.starts_with(&format!("/{}?", locale)));
        if locale.is_empty() || prefixed {
            return Some(format!("{}{}", base, value));
        }
        return Some(format!("{}/{}{}", base, locale, value));
    }
    let relative = value.trim_start_matches('/');
    if locale.is_empty() {
        Some(format!("{}/{}", base, relative))
    } else {
        Some(format!("{}/{}/{}", base, locale, relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "https://shop.example/de1/konfigurator.html?session=abc";

    #[test]
    fn test_absolute_and_empty_values() {
        assert_eq!(
            resolve_open_url(START, Some("https://other.example/x")).as_deref(),
            Some("https://other.example/x")
        );
        assert_eq!(resolve_open_url(START, None), None);
        assert_eq!(resolve_open_url(START, Some("   ")), None);
        assert_eq!(resolve_open_url("not a url", Some("/x")), None);
    }

    #[test]
    fn test_locale_segment_is_kept() {
        assert_eq!(
            resolve_open_url(START, Some("/konfigurator.html/modelle")).as_deref(),
            Some("https://shop.example/de1/konfigurator.html/modelle")
        );
        assert_eq!(
            resolve_open_url(START, Some("/de1/checkout.html")).as_deref(),
            Some("https://shop.example/de1/checkout.html")
        );
        assert_eq!(
            resolve_open_url(START, Some("checkout.html")).as_deref(),
            Some("https://shop.example/de1/checkout.html")
        );
        assert_eq!(
            resolve_open_url("https://shop.example:8443", Some("/a")).as_deref(),
            Some("https://shop.example:8443/a")
        );
    }

    #[test]
    fn test_run_paths_layout() {
        let temp = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(temp.path(), "2024-05-01_09-30-00");
        paths.create().unwrap();
        assert!(paths.screenshots_dir.is_dir());
        assert!(paths.inputs_dir.is_dir());
        assert_eq!(
            paths.screenshot("a.png"),
            temp.path().join("2024-05-01_09-30-00/screenshots/a.png")
        );
        assert_eq!(default_run_id().len(), "2024-05-01_09-30-00".len());
    }
}
