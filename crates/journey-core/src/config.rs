//! Run configuration
//!
//! Loaded from `journey.toml` next to the charter (or an explicit path),
//! then overridden field by field from CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{JourneyError, Result};

/// Configuration for one acceptance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory that receives `<run_id>/`
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,

    /// Run headless (false opens a visible window)
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Abort remaining steps after a blocking failure
    #[serde(default = "default_true")]
    pub stop_on_blocker: bool,

    /// Maximum number of counted steps (open_url not counted)
    #[serde(default)]
    pub max_steps: Option<usize>,

    /// Maximum UI inventory exports per run
    #[serde(default = "default_inventory_max")]
    pub inventory_max: usize,

    /// Try a target-text click when a locator misses
    #[serde(default = "default_true")]
    pub auto_repair_click: bool,

    /// Try a keyword discovery click when a locator misses
    #[serde(default = "default_true")]
    pub discovery_click: bool,

    /// Click through "next step" after journey-driving test cases
    #[serde(default = "default_true")]
    pub auto_advance: bool,

    /// Fill required fields with dummy data while auto-advancing
    #[serde(default = "default_true")]
    pub auto_fill: bool,

    /// Pause after setup so a human can log in
    #[serde(default)]
    pub pause_for_login: bool,

    /// Non-interactive fallback wait when stdin is not a terminal
    #[serde(default = "default_login_pause_seconds")]
    pub pause_for_login_seconds: u64,

    /// Require a successful `/user` call after login
    #[serde(default = "default_true")]
    pub verify_login: bool,

    /// Browser window size
    #[serde(default)]
    pub viewport: Viewport,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Capture queue capacity
    #[serde(default = "default_capture_capacity")]
    pub capture_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

/// Bounded waits, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
    /// Waiting for an element to become visible/enabled
    #[serde(default = "default_element_ms")]
    pub element_ms: u64,
    /// Single click or fill
    #[serde(default = "default_action_ms")]
    pub action_ms: u64,
    /// Settle time after clicks and scrolls
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Polling interval for bounded waits
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_verify_login_ms")]
    pub verify_login_ms: u64,
}

impl Timeouts {
    /// All waits disabled (used by tests against in-memory pages)
    pub fn immediate() -> Self {
        Self {
            navigation_ms: 0,
            element_ms: 0,
            action_ms: 0,
            settle_ms: 0,
            poll_ms: 0,
            verify_login_ms: 0,
        }
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn verify_login(&self) -> Duration {
        Duration::from_millis(self.verify_login_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            element_ms: default_element_ms(),
            action_ms: default_action_ms(),
            settle_ms: default_settle_ms(),
            poll_ms: default_poll_ms(),
            verify_login_ms: default_verify_login_ms(),
        }
    }
}

// Default value providers
fn default_true() -> bool {
    true
}

fn default_results_root() -> PathBuf {
    PathBuf::from("results")
}

fn default_inventory_max() -> usize {
    3
}

fn default_login_pause_seconds() -> u64 {
    120
}

fn default_capture_capacity() -> usize {
    1024
}

fn default_navigation_ms() -> u64 {
    60_000
}

fn default_element_ms() -> u64 {
    10_000
}

fn default_action_ms() -> u64 {
    10_000
}

fn default_settle_ms() -> u64 {
    400
}

fn default_poll_ms() -> u64 {
    250
}

fn default_verify_login_ms() -> u64 {
    20_000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            results_root: default_results_root(),
            headless: true,
            stop_on_blocker: true,
            max_steps: None,
            inventory_max: default_inventory_max(),
            auto_repair_click: true,
            discovery_click: true,
            auto_advance: true,
            auto_fill: true,
            pause_for_login: false,
            pause_for_login_seconds: default_login_pause_seconds(),
            verify_login: true,
            viewport: Viewport::default(),
            timeouts: Timeouts::default(),
            capture_capacity: default_capture_capacity(),
        }
    }
}

impl RunConfig {
    /// Default config file name looked up in the working directory
    pub const FILE_NAME: &'static str = "journey.toml";

    /// Load configuration from `path` (or `./journey.toml`) or use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(Self::FILE_NAME),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                JourneyError::Config(format!(
                    "Failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })
        } else if path.is_some() {
            Err(JourneyError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )))
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_default_file_yields_defaults() {
        let config = RunConfig::load_or_default(None).unwrap();
        assert!(config.stop_on_blocker);
        assert_eq!(config.inventory_max, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journey.toml");
        std::fs::write(
            &path,
            "stop_on_blocker = false\nmax_steps = 7\n[timeouts]\nelement_ms = 500\n",
        )
        .unwrap();

        let config = RunConfig::load_or_default(Some(&path)).unwrap();
        assert!(!config.stop_on_blocker);
        assert_eq!(config.max_steps, Some(7));
        assert_eq!(config.timeouts.element_ms, 500);
        assert_eq!(config.timeouts.poll_ms, 250);
        assert!(config.auto_advance);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = RunConfig::load_or_default(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(JourneyError::Config(_))));
    }
}
