//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge failed to start: {0}")]
    BridgeStartup(String),

    #[error("Playwright bridge exited unexpectedly")]
    BridgeClosed,

    #[error("Playwright error in {command}: {message}")]
    Playwright { command: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error(
        "Coupon {coupon} discount check failed: got {actual}, expected {} ± 2 points; card was not submitted",
        expected.map(|e| format!("{:.0}%", e)).unwrap_or_else(|| "an explicit percentage".to_string())
    )]
    CouponMismatch {
        coupon: String,
        expected: Option<f64>,
        actual: String,
    },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] lumimeds_common::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

impl E2eError {
    pub fn assertion(message: impl Into<String>) -> Self {
        E2eError::AssertionFailed(message.into())
    }

    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        E2eError::StepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }
}
