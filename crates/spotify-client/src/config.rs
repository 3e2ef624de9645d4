//! Configuration for the Spotify client.

use std::env;
use std::time::Duration;

use crate::error::SpotifyError;

/// Default Web API base URL.
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Default accounts (authorization server) base URL.
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Wait after a skip before asking what is playing, in milliseconds.
pub const DEFAULT_SKIP_SETTLE_MS: u64 = 2000;

/// Scopes requested when linking an account.
pub const DEFAULT_SCOPES: &str = "user-read-playback-state user-modify-playback-state \
user-read-currently-playing playlist-read-private playlist-read-collaborative \
playlist-modify-public playlist-modify-private user-library-read user-library-modify \
user-read-private user-read-email user-follow-read user-follow-modify user-top-read";

/// Spotify application configuration.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered for the application.
    pub redirect_uri: String,
    /// Web API base URL.
    pub api_url: String,
    /// Accounts base URL.
    pub accounts_url: String,
    /// Space-separated scope list.
    pub scopes: String,
    /// Name of the playlist the bot adopts as the queue after linking.
    pub queue_playlist_name: Option<String>,
    /// Number of tracks requested per search.
    pub search_limit: u32,
    /// How long the player gets to switch tracks after a skip.
    pub skip_settle: Duration,
}

impl SpotifyConfig {
    /// Create a configuration with default endpoints and no wait after
    /// skipping.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            api_url: DEFAULT_API_URL.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
            queue_playlist_name: None,
            search_limit: 10,
            skip_settle: Duration::ZERO,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SPOTIFY_CLIENT_ID` | OAuth client id | (required) |
    /// | `SPOTIFY_CLIENT_SECRET` | OAuth client secret | (required) |
    /// | `SPOTIFY_REDIRECT_URI` | Registered redirect URI | (required) |
    /// | `SPOTIFY_API_URL` | Web API base URL | `https://api.spotify.com/v1` |
    /// | `SPOTIFY_ACCOUNTS_URL` | Accounts base URL | `https://accounts.spotify.com` |
    /// | `SPOTIFY_SCOPES` | Requested scopes | see [`DEFAULT_SCOPES`] |
    /// | `SPOTIFY_QUEUE_PLAYLIST_NAME` | Playlist adopted as queue | (none) |
    /// | `SPOTIFY_SEARCH_LIMIT` | Tracks per search | `10` |
    /// | `SPOTIFY_SKIP_SETTLE_MS` | Wait after next/previous before reporting the track | `2000` |
    pub fn from_env() -> Result<Self, SpotifyError> {
        let client_id = required("SPOTIFY_CLIENT_ID")?;
        let client_secret = required("SPOTIFY_CLIENT_SECRET")?;
        let redirect_uri = required("SPOTIFY_REDIRECT_URI")?;

        let api_url = env::var("SPOTIFY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let accounts_url =
            env::var("SPOTIFY_ACCOUNTS_URL").unwrap_or_else(|_| DEFAULT_ACCOUNTS_URL.to_string());
        let scopes = env::var("SPOTIFY_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_string());

        let queue_playlist_name = env::var("SPOTIFY_QUEUE_PLAYLIST_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let search_limit = env::var("SPOTIFY_SEARCH_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let skip_settle = env::var("SPOTIFY_SKIP_SETTLE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_SKIP_SETTLE_MS));

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            api_url: api_url.trim_end_matches('/').to_string(),
            accounts_url: accounts_url.trim_end_matches('/').to_string(),
            scopes,
            queue_playlist_name,
            search_limit,
            skip_settle,
        })
    }

    /// Build the URL the user opens to link their account.
    ///
    /// `state` is passed through untouched and comes back on the redirect.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(state),
        )
    }

    /// Token endpoint URL.
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url)
    }
}

fn required(name: &str) -> Result<String, SpotifyError> {
    env::var(name).map_err(|_| SpotifyError::Configuration(format!("{} not set", name)))
}
