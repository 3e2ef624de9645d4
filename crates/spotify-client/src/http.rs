//! HTTP implementations of [`MusicApi`] and [`TokenExchange`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::api::{MusicApi, PlayRequest, SkipDirection};
use crate::config::SpotifyConfig;
use crate::error::SpotifyError;
use crate::models::{Device, PlaybackState, Playlist, SpotifyUser, Track};
use crate::token::{TokenExchange, TokenGrant};
use crate::transport::RepeatState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

fn http_client() -> Result<Client, SpotifyError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SpotifyError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Page<Track>,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    item: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    track: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Api { message: String },
    OAuth(String),
}

/// Spotify Web API over HTTP.
#[derive(Clone)]
pub struct SpotifyApi {
    http: Client,
    base_url: String,
}

impl SpotifyApi {
    /// Create a client for the configured API base URL.
    pub fn new(config: &SpotifyConfig) -> Result<Self, SpotifyError> {
        Ok(Self {
            http: http_client()?,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        self.http.request(method, url).bearer_auth(token)
    }

    fn player(
        &self,
        method: Method,
        path: &str,
        token: &str,
        device_id: Option<&str>,
    ) -> RequestBuilder {
        let builder = self.request(method, path, token);
        match device_id {
            Some(id) => builder.query(&[("device_id", id)]),
            None => builder,
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, SpotifyError> {
        debug!("Spotify request: {}", path);
        let response = builder
            .send()
            .await
            .map_err(|e| SpotifyError::Network(e.to_string()))?;
        check_status(path, response).await
    }

    async fn json<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, SpotifyError> {
        let response = self.send(path, builder).await?;
        response
            .json()
            .await
            .map_err(|e| SpotifyError::InvalidResponse(e.to_string()))
    }

    /// Decode the body, treating 204 No Content as `None`.
    async fn optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<Option<T>, SpotifyError> {
        let response = self.send(path, builder).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| SpotifyError::Network(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| SpotifyError::InvalidResponse(e.to_string()))
    }

    async fn empty(&self, path: &str, builder: RequestBuilder) -> Result<(), SpotifyError> {
        self.send(path, builder).await.map(|_| ())
    }

    /// Fetch every page starting at `path`.
    async fn paged<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
    ) -> Result<Vec<T>, SpotifyError> {
        let mut items = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(url) = next {
            let page: Page<T> = self.json(path, self.request(Method::GET, &url, token)).await?;
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }
}

async fn check_status(path: &str, response: Response) -> Result<Response, SpotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            error: ErrorDetail::Api { message },
        }) => message,
        Ok(ErrorBody {
            error: ErrorDetail::OAuth(message),
        }) => message,
        Err(_) => body,
    };

    if status == StatusCode::NOT_FOUND && path.starts_with("/me/player") {
        debug!("No active device for {}: {}", path, message);
        return Err(SpotifyError::NoActiveDevice);
    }

    warn!("Spotify API error on {} ({}): {}", path, status, message);
    Err(SpotifyError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl MusicApi for SpotifyApi {
    async fn current_user(&self, token: &str) -> Result<SpotifyUser, SpotifyError> {
        self.json("/me", self.request(Method::GET, "/me", token))
            .await
    }

    async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>, SpotifyError> {
        let limit = limit.to_string();
        let builder = self
            .request(Method::GET, "/search", token)
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())]);
        let response: SearchResponse = self.json("/search", builder).await?;
        Ok(response.tracks.items)
    }

    async fn start_playback(
        &self,
        token: &str,
        request: &PlayRequest,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player/play";
        let builder = self.player(Method::PUT, path, token, device_id).json(request);
        self.empty(path, builder).await
    }

    async fn pause_playback(
        &self,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player/pause";
        let builder = self.player(Method::PUT, path, token, device_id);
        self.empty(path, builder).await
    }

    async fn skip(
        &self,
        token: &str,
        direction: SkipDirection,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = match direction {
            SkipDirection::Next => "/me/player/next",
            SkipDirection::Previous => "/me/player/previous",
        };
        let builder = self.player(Method::POST, path, token, device_id);
        self.empty(path, builder).await
    }

    async fn seek(
        &self,
        token: &str,
        position_ms: u64,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player/seek";
        let builder = self
            .player(Method::PUT, path, token, device_id)
            .query(&[("position_ms", position_ms)]);
        self.empty(path, builder).await
    }

    async fn set_volume(
        &self,
        token: &str,
        percent: u8,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player/volume";
        let builder = self
            .player(Method::PUT, path, token, device_id)
            .query(&[("volume_percent", percent)]);
        self.empty(path, builder).await
    }

    async fn set_repeat(
        &self,
        token: &str,
        state: RepeatState,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player/repeat";
        let builder = self
            .player(Method::PUT, path, token, device_id)
            .query(&[("state", state.as_str())]);
        self.empty(path, builder).await
    }

    async fn set_shuffle(
        &self,
        token: &str,
        on: bool,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player/shuffle";
        let builder = self
            .player(Method::PUT, path, token, device_id)
            .query(&[("state", on)]);
        self.empty(path, builder).await
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, SpotifyError> {
        let path = "/me/player/devices";
        let response: DevicesResponse =
            self.json(path, self.request(Method::GET, path, token)).await?;
        Ok(response.devices)
    }

    async fn transfer_playback(
        &self,
        token: &str,
        device_id: &str,
        play: bool,
    ) -> Result<(), SpotifyError> {
        let path = "/me/player";
        let builder = self
            .request(Method::PUT, path, token)
            .json(&json!({ "device_ids": [device_id], "play": play }));
        self.empty(path, builder).await
    }

    async fn currently_playing(&self, token: &str) -> Result<Option<Track>, SpotifyError> {
        let path = "/me/player/currently-playing";
        let playing: Option<CurrentlyPlaying> = self
            .optional_json(path, self.request(Method::GET, path, token))
            .await?;
        Ok(playing.and_then(|p| p.item))
    }

    async fn playback_state(&self, token: &str) -> Result<Option<PlaybackState>, SpotifyError> {
        let path = "/me/player";
        self.optional_json(path, self.request(Method::GET, path, token))
            .await
    }

    async fn playlists(&self, token: &str) -> Result<Vec<Playlist>, SpotifyError> {
        self.paged(token, "/me/playlists?limit=50").await
    }

    async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Playlist, SpotifyError> {
        let path = format!("/users/{}/playlists", urlencoding::encode(user_id));
        let builder = self
            .request(Method::POST, &path, token)
            .json(&json!({ "name": name, "public": false }));
        self.json(&path, builder).await
    }

    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<Track>, SpotifyError> {
        let path = format!(
            "/playlists/{}/tracks?limit=100",
            urlencoding::encode(playlist_id)
        );
        let items: Vec<PlaylistItem> = self.paged(token, &path).await?;
        Ok(items.into_iter().filter_map(|i| i.track).collect())
    }

    async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let builder = self
            .request(Method::POST, &path, token)
            .json(&json!({ "uris": uris }));
        self.empty(&path, builder).await
    }

    async fn remove_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let tracks: Vec<_> = uris.iter().map(|uri| json!({ "uri": uri })).collect();
        let builder = self
            .request(Method::DELETE, &path, token)
            .json(&json!({ "tracks": tracks }));
        self.empty(&path, builder).await
    }
}

/// Spotify accounts service (token endpoint) over HTTP.
#[derive(Clone)]
pub struct SpotifyAccounts {
    http: Client,
    config: SpotifyConfig,
}

impl SpotifyAccounts {
    /// Create a client for the configured accounts service.
    pub fn new(config: SpotifyConfig) -> Result<Self, SpotifyError> {
        Ok(Self {
            http: http_client()?,
            config,
        })
    }

    async fn grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant, SpotifyError> {
        let url = self.config.token_url();
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| SpotifyError::Network(e.to_string()))?;

        let response = check_status("/api/token", response).await?;
        response
            .json()
            .await
            .map_err(|e| SpotifyError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenExchange for SpotifyAccounts {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, SpotifyError> {
        debug!("Exchanging authorization code");
        self.grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SpotifyError> {
        debug!("Refreshing access token");
        self.grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(|e| SpotifyError::AuthRefreshFailed(e.to_string()))
    }
}
