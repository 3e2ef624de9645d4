//! Error types for orchestrator operations.

use bot_core::RecognizerError;
use spotify_client::SpotifyError;
use thiserror::Error;

/// Errors raised while running dialog steps.
///
/// These are recoverable per turn: the orchestrator converts them into a
/// user-visible message and discards the turn's state changes.
#[derive(Debug, Error)]
pub enum DialogError {
    /// A music-service call failed.
    #[error("spotify error: {0}")]
    Spotify(#[from] SpotifyError),

    /// Intent recognition failed.
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),

    /// A step asked for a dialog that is not registered.
    #[error("unknown dialog: {0}")]
    UnknownDialog(String),

    /// Pushing another frame would exceed the configured depth.
    #[error("dialog stack exceeded {0} frames")]
    StackOverflow(usize),

    /// A turn kept transitioning without suspending or ending.
    #[error("dialog did not settle after {0} steps")]
    Runaway(usize),

    /// Dialog arguments were missing or malformed.
    #[error("invalid dialog arguments: {0}")]
    InvalidArgs(String),

    /// A reply could not be delivered.
    #[error("send failed: {0}")]
    Send(String),
}

impl DialogError {
    /// Whether the user has to link their account again.
    pub fn requires_authorization(&self) -> bool {
        matches!(self, Self::Spotify(e) if e.requires_authorization())
    }
}

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Conversation or user state could not be read or written.
    #[error("state store error: {0}")]
    Store(String),

    /// Message sending failed.
    #[error("send failed: {0}")]
    Send(String),

    /// A dialog failed and the failure could not be reported to the user.
    #[error("dialog error: {0}")]
    Dialog(#[from] DialogError),

    /// Invalid static configuration (routing patterns, environment).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<database::DatabaseError> for OrchestratorError {
    fn from(err: database::DatabaseError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<regex::Error> for OrchestratorError {
    fn from(err: regex::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Errors decoding the OAuth `state` parameter.
#[derive(Debug, Error)]
pub enum AuthStateError {
    #[error("state is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
