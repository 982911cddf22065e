//! Unified error types for the journey runner

use thiserror::Error;

/// Unified error type for all journey operations
#[derive(Error, Debug)]
pub enum JourneyError {
    // Charter errors
    #[error("Charter error: {0}")]
    Charter(String),

    #[error("Invalid step {case_id} #{step_num}: {reason}")]
    InvalidStep {
        case_id: String,
        step_num: usize,
        reason: String,
    },

    #[error("Unknown intent: {0}")]
    UnknownIntent(String),

    // Browser errors
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Could not find element using provided locators ({0})")]
    ElementNotFound(String),

    #[error("Critical Error: Detected '{0}' page")]
    ErrorPage(String),

    // Capture errors
    #[error("Capture error: {0}")]
    Capture(String),

    // Evidence errors
    #[error("Evidence write failed: {0}")]
    Evidence(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl JourneyError {
    /// Whether this error stems from a bounded wait running out
    pub fn is_timeout(&self) -> bool {
        match self {
            JourneyError::Timeout(_) => true,
            JourneyError::Browser(msg) => msg.to_lowercase().contains("timeout"),
            _ => false,
        }
    }

    /// Whether the application under test rendered a known error page
    pub fn is_error_page(&self) -> bool {
        matches!(self, JourneyError::ErrorPage(_))
    }
}

/// Result type alias using JourneyError
pub type Result<T> = std::result::Result<T, JourneyError>;
