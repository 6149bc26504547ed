//! Error types for ovex operations.
//!
//! This module defines the main error type [`OvexError`] which represents
//! every failure that can occur while detecting, expanding, extracting or
//! delivering an AI overview panel.
//!
//! Webhook delivery is the exception: it always resolves to a
//! [`WebhookResult`](crate::webhook::WebhookResult) and never returns `Err`.
//!
//! # Example
//!
//! ```rust
//! use ovex_core::{OvexError, Result};
//!
//! fn require_container(html: Option<String>) -> Result<String> {
//!     html.ok_or(OvexError::ContainerNotFound)
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ovex operations.
#[derive(Error, Debug)]
pub enum OvexError {
    /// HTTP request errors from reqwest.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    ///
    /// Returned when fetching a page snapshot exceeds the configured timeout.
    #[error("Request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A webhook URL failed validation (must be https, or http on a local host).
    #[error("Invalid webhook URL: {0}. Expected format: https://...")]
    InvalidWebhookUrl(String),

    /// No webhook URL has been saved.
    #[error("Webhook is not configured. Set the webhook URL in the settings.")]
    WebhookNotConfigured,

    /// HTML parsing errors.
    ///
    /// Returned when HTML cannot be parsed or a CSS selector is invalid.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// Key-value storage errors.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// JSON (de)serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The circuit breaker guarding `module` is open and its cooldown has not expired.
    #[error("Circuit breaker OPEN for {module}")]
    CircuitOpen { module: String },

    /// A readiness signal did not arrive in time.
    #[error("{stage} was not signalled ready within {waited_ms} ms")]
    ReadinessTimeout { stage: String, waited_ms: u64 },

    /// A pipeline stage exceeded its time budget.
    #[error("Stage {stage} timed out after {timeout_ms} ms")]
    StageTimeout { stage: String, timeout_ms: u64 },

    /// An element locator no longer resolves in the current document.
    #[error("Element #{ordinal} is no longer in the document")]
    StaleElement { ordinal: usize },

    /// The host page refused a synthetic event.
    #[error("Dispatching {method} failed: {reason}")]
    DispatchFailed { method: String, reason: String },

    /// The AI overview container is absent from the page.
    #[error("AI overview container not found")]
    ContainerNotFound,

    /// A container hand-off callback failed.
    #[error("Container processing failed: {0}")]
    Callback(String),
}

/// Result type alias for OvexError.
pub type Result<T> = std::result::Result<T, OvexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OvexError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_circuit_open_names_module() {
        let err = OvexError::CircuitOpen { module: "sources".to_string() };
        assert_eq!(err.to_string(), "Circuit breaker OPEN for sources");
    }

    #[test]
    fn test_readiness_timeout_error() {
        let err = OvexError::ReadinessTimeout { stage: "webhook".to_string(), waited_ms: 1500 };
        assert!(err.to_string().contains("webhook"));
        assert!(err.to_string().contains("1500"));
    }

    #[test]
    fn test_webhook_url_error_mentions_format() {
        let err = OvexError::InvalidWebhookUrl("ftp://x".to_string());
        assert!(err.to_string().contains("https://"));
    }
}
