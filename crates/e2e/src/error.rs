//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("WebDriver failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver health check failed after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Browser session not started")]
    SessionNotStarted,

    #[error("Feature parse error: {file}:{line} - {reason}")]
    FeatureParse {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Undefined step: {0}")]
    UnknownStep(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Assertion failed: {message} (expected {expected}, observed {observed})")]
    AssertionFailed {
        message: String,
        expected: String,
        observed: String,
    },

    #[error("Missing scenario context: {0}")]
    MissingContext(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Script returned unexpected value: {0}")]
    ScriptResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl E2eError {
    /// Build an assertion failure carrying the expected and observed values.
    pub fn assertion(
        message: impl Into<String>,
        expected: impl ToString,
        observed: impl ToString,
    ) -> Self {
        E2eError::AssertionFailed {
            message: message.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
