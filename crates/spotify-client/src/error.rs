//! Error types for Spotify operations.

use thiserror::Error;

/// Errors that can occur when talking to Spotify.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// No token is stored for the user; the authorization flow must run.
    #[error("no linked Spotify account")]
    AuthExpired,

    /// The authorization server rejected the refresh exchange.
    #[error("token refresh failed: {0}")]
    AuthRefreshFailed(String),

    /// The Web API answered with a non-2xx status.
    #[error("Spotify API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// A player command was issued but no device is active.
    #[error("no active playback device")]
    NoActiveDevice,

    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SpotifyError {
    /// Whether the user has to (re-)authorize before retrying.
    pub fn requires_authorization(&self) -> bool {
        matches!(self, Self::AuthExpired | Self::AuthRefreshFailed(_))
    }

    /// HTTP status of an upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}
