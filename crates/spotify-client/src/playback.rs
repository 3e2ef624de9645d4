//! The operations dialogs call, with credentials from a [`TokenManager`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::{MusicApi, PlayRequest, SkipDirection};
use crate::error::SpotifyError;
use crate::models::{Device, Playlist, SpotifyUser, Track};
use crate::token::TokenManager;
use crate::transport::{format_position, RepeatState, TransportCommand};

const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Result of [`PlaybackClient::add_track_to_playlist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The track was already in the playlist; nothing was changed.
    AlreadyPresent,
}

/// Result of a transport command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOutcome {
    /// Confirmation text for the user.
    pub message: String,
}

impl TransportOutcome {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Authenticated music-service operations for one user.
#[derive(Clone)]
pub struct PlaybackClient {
    api: Arc<dyn MusicApi>,
    tokens: Arc<TokenManager>,
    search_limit: u32,
    skip_settle: Duration,
}

impl PlaybackClient {
    /// Create a client over `api` using `tokens` for credentials.
    pub fn new(api: Arc<dyn MusicApi>, tokens: Arc<TokenManager>) -> Self {
        Self {
            api,
            tokens,
            search_limit: DEFAULT_SEARCH_LIMIT,
            skip_settle: Duration::ZERO,
        }
    }

    /// Set the number of tracks requested per search.
    pub fn with_search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Set how long to wait after a skip before reading the new track.
    pub fn with_skip_settle(mut self, settle: Duration) -> Self {
        self.skip_settle = settle;
        self
    }

    /// The token manager backing this client.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    async fn token(&self) -> Result<String, SpotifyError> {
        self.tokens.valid_token().await
    }

    /// Search tracks.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>, SpotifyError> {
        let token = self.token().await?;
        let tracks = self
            .api
            .search_tracks(&token, query, self.search_limit)
            .await?;
        debug!("Search '{}' returned {} tracks", query, tracks.len());
        Ok(tracks)
    }

    /// Start playback.
    ///
    /// With a track and a context the track plays inside the context. With
    /// no track, playback resumes.
    pub async fn play(
        &self,
        track_uri: Option<&str>,
        device_id: Option<&str>,
        context_uri: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let token = self.token().await?;
        let request = match (track_uri, context_uri) {
            (Some(track), context) => PlayRequest::track(track, context),
            (None, Some(context)) => PlayRequest {
                context_uri: Some(context.to_string()),
                ..PlayRequest::default()
            },
            (None, None) => PlayRequest::resume(),
        };
        self.api.start_playback(&token, &request, device_id).await
    }

    /// Pause playback.
    pub async fn pause(&self, device_id: Option<&str>) -> Result<(), SpotifyError> {
        let token = self.token().await?;
        self.api.pause_playback(&token, device_id).await
    }

    /// Devices available to the account.
    pub async fn list_devices(&self) -> Result<Vec<Device>, SpotifyError> {
        let token = self.token().await?;
        self.api.devices(&token).await
    }

    /// Transfer playback to a device without starting it.
    pub async fn set_active_device(&self, device_id: &str) -> Result<(), SpotifyError> {
        let token = self.token().await?;
        self.api.transfer_playback(&token, device_id, false).await
    }

    /// The track currently playing, if any.
    pub async fn current_track(&self) -> Result<Option<Track>, SpotifyError> {
        let token = self.token().await?;
        self.api.currently_playing(&token).await
    }

    /// The linked account's profile.
    pub async fn current_user(&self) -> Result<SpotifyUser, SpotifyError> {
        let token = self.token().await?;
        self.api.current_user(&token).await
    }

    /// Playlists the account follows or owns.
    pub async fn playlists(&self) -> Result<Vec<Playlist>, SpotifyError> {
        let token = self.token().await?;
        self.api.playlists(&token).await
    }

    /// Create a playlist owned by `owner_id`.
    pub async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Playlist, SpotifyError> {
        let token = self.token().await?;
        let playlist = self.api.create_playlist(&token, owner_id, name).await?;
        info!("Created playlist {} ({})", playlist.name, playlist.id);
        Ok(playlist)
    }

    /// Tracks in a playlist.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, SpotifyError> {
        let token = self.token().await?;
        self.api.playlist_tracks(&token, playlist_id).await
    }

    /// Add a track unless the playlist already contains it.
    pub async fn add_track_to_playlist(
        &self,
        track_uri: &str,
        playlist_id: &str,
    ) -> Result<AddOutcome, SpotifyError> {
        let token = self.token().await?;
        let existing = self.api.playlist_tracks(&token, playlist_id).await?;
        if existing.iter().any(|t| t.uri == track_uri) {
            debug!("{} already in playlist {}", track_uri, playlist_id);
            return Ok(AddOutcome::AlreadyPresent);
        }

        self.api
            .add_tracks(&token, playlist_id, &[track_uri.to_string()])
            .await?;
        Ok(AddOutcome::Added)
    }

    /// Remove every track from a playlist. Returns how many were removed.
    pub async fn clear_playlist(&self, playlist_id: &str) -> Result<usize, SpotifyError> {
        let token = self.token().await?;
        let tracks = self.api.playlist_tracks(&token, playlist_id).await?;
        if tracks.is_empty() {
            return Ok(0);
        }

        let count = tracks.len();
        let mut uris: Vec<String> = tracks.into_iter().map(|t| t.uri).collect();
        uris.sort();
        uris.dedup();
        // The remove endpoint accepts at most 100 uris per call.
        for chunk in uris.chunks(100) {
            self.api.remove_tracks(&token, playlist_id, chunk).await?;
        }
        Ok(count)
    }

    /// Skip, make sure playback continues, and report the new track.
    async fn skip_and_resume(
        &self,
        token: &str,
        direction: SkipDirection,
        device_id: Option<&str>,
    ) -> Result<TransportOutcome, SpotifyError> {
        self.api.skip(token, direction, device_id).await?;
        self.api
            .start_playback(token, &PlayRequest::resume(), device_id)
            .await?;
        if !self.skip_settle.is_zero() {
            tokio::time::sleep(self.skip_settle).await;
        }

        Ok(match self.api.currently_playing(token).await? {
            Some(track) => {
                TransportOutcome::new(format!("now playing **{}**", track.display_name()))
            }
            None => TransportOutcome::new("okay"),
        })
    }

    /// Apply a transport command and describe the result.
    pub async fn apply_transport_command(
        &self,
        command: &TransportCommand,
        device_id: Option<&str>,
    ) -> Result<TransportOutcome, SpotifyError> {
        let token = self.token().await?;
        let api = &self.api;

        match *command {
            TransportCommand::Play => {
                api.start_playback(&token, &PlayRequest::resume(), device_id)
                    .await?;
                Ok(TransportOutcome::new("okay"))
            }
            TransportCommand::Pause => {
                api.pause_playback(&token, device_id).await?;
                Ok(TransportOutcome::new("okay"))
            }
            TransportCommand::Next => {
                self.skip_and_resume(&token, SkipDirection::Next, device_id)
                    .await
            }
            TransportCommand::Previous => {
                self.skip_and_resume(&token, SkipDirection::Previous, device_id)
                    .await
            }
            TransportCommand::Seek(target) => {
                let Some(track) = api.currently_playing(&token).await? else {
                    return Ok(TransportOutcome::new("nothing is playing"));
                };
                let position = target.resolve(track.duration_ms);
                api.seek(&token, position, device_id).await?;
                Ok(TransportOutcome::new(format!(
                    "seeked to {}",
                    format_position(position)
                )))
            }
            TransportCommand::Volume(percent) => {
                let percent = percent.min(100);
                api.set_volume(&token, percent, device_id).await?;
                Ok(TransportOutcome::new(format!(
                    "volume set to **{}%**",
                    percent
                )))
            }
            TransportCommand::Shuffle(toggle) => {
                let current = api
                    .playback_state(&token)
                    .await?
                    .map(|s| s.shuffle_state)
                    .unwrap_or(false);
                let next = toggle.apply(current);
                api.set_shuffle(&token, next, device_id).await?;
                Ok(TransportOutcome::new(format!(
                    "shuffle is now {}",
                    if next { "on" } else { "off" }
                )))
            }
            TransportCommand::Repeat(mode) => {
                let current = api
                    .playback_state(&token)
                    .await?
                    .map(|s| s.repeat_state)
                    .unwrap_or(RepeatState::Off);
                let next = mode.apply(current);
                api.set_repeat(&token, next, device_id).await?;
                Ok(TransportOutcome::new(format!("repeat is now **{}**", next)))
            }
        }
    }
}
