//! Spotify Web API client for the chat bot.
//!
//! This crate provides:
//!
//! - [`TokenManager`] - Owns the OAuth access/refresh token lifecycle
//! - [`MusicApi`] - Raw, bearer-token Web API operations ([`SpotifyApi`] over HTTP)
//! - [`TokenExchange`] - Authorization-server grants ([`SpotifyAccounts`] over HTTP)
//! - [`PlaybackClient`] - The operations the dialogs call, with credentials
//!   taken from a [`TokenManager`]
//! - [`TransportCommand`] - Parsing and next-state rules for playback controls
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use spotify_client::{PlaybackClient, SpotifyAccounts, SpotifyApi, SpotifyConfig, TokenManager};
//!
//! # async fn example(token: spotify_client::TokenData) -> Result<(), spotify_client::SpotifyError> {
//! let config = SpotifyConfig::from_env()?;
//! let accounts = Arc::new(SpotifyAccounts::new(config.clone())?);
//! let api = Arc::new(SpotifyApi::new(&config)?);
//!
//! let tokens = Arc::new(TokenManager::new(accounts, Some(token)));
//! let spotify = PlaybackClient::new(api, tokens);
//!
//! let tracks = spotify.search("shape of you").await?;
//! if let Some(track) = tracks.first() {
//!     spotify.play(Some(&track.uri), None, None).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod config;
mod error;
mod http;
mod models;
mod playback;
mod token;
mod transport;

pub use api::{MusicApi, PlayRequest, PlayOffset, SkipDirection};
pub use config::{SpotifyConfig, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, DEFAULT_SCOPES};
pub use error::SpotifyError;
pub use http::{SpotifyAccounts, SpotifyApi};
pub use models::{
    Album, Artist, Device, ExternalUrls, Image, PlaybackState, Playlist, PlaylistOwner,
    SpotifyUser, Track, TrackCount,
};
pub use playback::{AddOutcome, PlaybackClient, TransportOutcome};
pub use token::{TokenData, TokenExchange, TokenGrant, TokenManager};
pub use transport::{
    format_position, parse_percent, parse_timestamp, RepeatMode, RepeatState, SeekTarget, Toggle,
    TransportArgs, TransportCommand, TransportParseError,
};
