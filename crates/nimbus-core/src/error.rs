//! Centralized error types for the Nimbus application.
//!
//! Crate-local errors (location, weather, geocoding) are mapped into
//! [`AppError`] at the screen layer. Its `Display` text is what the error
//! screen shows.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unable to get current location")]
    LocationUnavailable,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Stream(String),

    #[error("{0}")]
    Unknown(String),
}

impl AppError {
    /// Text for the error screen: the display text, or "Unknown error" when
    /// that comes out empty.
    pub fn screen_message(&self) -> String {
        let text = self.to_string();
        if text.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            text
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,
}
