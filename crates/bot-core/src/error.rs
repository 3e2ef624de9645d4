//! Error types for intent recognition.

use thiserror::Error;

/// Errors that can occur while recognizing an intent.
#[derive(Debug, Error)]
pub enum RecognizerError {
    /// The recognizer service could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The recognizer answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The recognizer is not configured correctly.
    #[error("configuration error: {0}")]
    Configuration(String),
}
