//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Backend is not reachable at {url}. Please start it with: {hint}")]
    BackendUnreachable { url: String, hint: String },

    #[error("Failed to seed database: {0}")]
    SeedFailed(String),

    #[error("Backend failed to start after {0} attempts")]
    BackendStartup(u32),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Page failed to load: {0}")]
    PageLoad(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// How far a failure reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The environment is unusable; the whole run is invalid
    Environment,
    /// A test could not establish its preconditions
    Setup,
    /// The app did not show what the test expected
    Assertion,
    /// A wait or poll exhausted its budget
    Timing,
}

impl E2eError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            E2eError::BackendUnreachable { .. }
            | E2eError::SeedFailed(_)
            | E2eError::BackendStartup(_)
            | E2eError::PlaywrightNotFound
            | E2eError::Config(_) => ErrorCategory::Environment,
            E2eError::AssertionFailed(_) | E2eError::Validation(_) => ErrorCategory::Assertion,
            E2eError::Timeout(_) => ErrorCategory::Timing,
            _ => ErrorCategory::Setup,
        }
    }

    /// Whether this error invalidates the whole run
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Environment
    }
}
