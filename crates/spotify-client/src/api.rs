//! The raw Web API surface.
//!
//! Every call takes an already-valid access token. Token lifecycle lives in
//! [`TokenManager`](crate::TokenManager); the dialogs go through
//! [`PlaybackClient`](crate::PlaybackClient), which combines the two.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SpotifyError;
use crate::models::{Device, PlaybackState, Playlist, SpotifyUser, Track};
use crate::transport::RepeatState;

/// Body of `PUT /me/player/play`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
}

/// Start position inside a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayOffset {
    pub uri: String,
}

impl PlayRequest {
    /// Resume whatever was playing.
    pub fn resume() -> Self {
        Self::default()
    }

    /// Play a track, optionally inside a context (playlist) so playback
    /// continues through it afterwards.
    pub fn track(track_uri: &str, context_uri: Option<&str>) -> Self {
        match context_uri {
            Some(context) => Self {
                context_uri: Some(context.to_string()),
                uris: None,
                offset: Some(PlayOffset {
                    uri: track_uri.to_string(),
                }),
            },
            None => Self {
                context_uri: None,
                uris: Some(vec![track_uri.to_string()]),
                offset: None,
            },
        }
    }
}

/// Direction for track skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDirection {
    Next,
    Previous,
}

/// Spotify Web API operations.
#[async_trait]
pub trait MusicApi: Send + Sync {
    /// `GET /me`.
    async fn current_user(&self, token: &str) -> Result<SpotifyUser, SpotifyError>;

    /// `GET /search?type=track`.
    async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>, SpotifyError>;

    /// `PUT /me/player/play`.
    async fn start_playback(
        &self,
        token: &str,
        request: &PlayRequest,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError>;

    /// `PUT /me/player/pause`.
    async fn pause_playback(&self, token: &str, device_id: Option<&str>)
        -> Result<(), SpotifyError>;

    /// `POST /me/player/next` or `/me/player/previous`.
    async fn skip(
        &self,
        token: &str,
        direction: SkipDirection,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError>;

    /// `PUT /me/player/seek`.
    async fn seek(
        &self,
        token: &str,
        position_ms: u64,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError>;

    /// `PUT /me/player/volume`.
    async fn set_volume(
        &self,
        token: &str,
        percent: u8,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError>;

    /// `PUT /me/player/repeat`.
    async fn set_repeat(
        &self,
        token: &str,
        state: RepeatState,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError>;

    /// `PUT /me/player/shuffle`.
    async fn set_shuffle(
        &self,
        token: &str,
        on: bool,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError>;

    /// `GET /me/player/devices`.
    async fn devices(&self, token: &str) -> Result<Vec<Device>, SpotifyError>;

    /// `PUT /me/player`.
    async fn transfer_playback(
        &self,
        token: &str,
        device_id: &str,
        play: bool,
    ) -> Result<(), SpotifyError>;

    /// `GET /me/player/currently-playing`; `None` when nothing is playing.
    async fn currently_playing(&self, token: &str) -> Result<Option<Track>, SpotifyError>;

    /// `GET /me/player`; `None` when there is no playback session.
    async fn playback_state(&self, token: &str) -> Result<Option<PlaybackState>, SpotifyError>;

    /// `GET /me/playlists`.
    async fn playlists(&self, token: &str) -> Result<Vec<Playlist>, SpotifyError>;

    /// `POST /users/{user_id}/playlists`.
    async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Playlist, SpotifyError>;

    /// `GET /playlists/{id}/tracks`.
    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<Track>, SpotifyError>;

    /// `POST /playlists/{id}/tracks`.
    async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError>;

    /// `DELETE /playlists/{id}/tracks`.
    async fn remove_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_request_track_only() {
        let body = serde_json::to_value(PlayRequest::track("spotify:track:1", None)).unwrap();
        assert_eq!(body, serde_json::json!({ "uris": ["spotify:track:1"] }));
    }

    #[test]
    fn test_play_request_in_context() {
        let body = serde_json::to_value(PlayRequest::track(
            "spotify:track:1",
            Some("spotify:playlist:p"),
        ))
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "context_uri": "spotify:playlist:p",
                "offset": { "uri": "spotify:track:1" }
            })
        );
    }

    #[test]
    fn test_play_request_resume_is_empty() {
        let body = serde_json::to_value(PlayRequest::resume()).unwrap();
        assert_eq!(body, serde_json::json!({}));
    }
}
