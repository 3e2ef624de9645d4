//! In-memory Spotify fakes for tests.
//!
//! This crate provides:
//! - `FakeSpotify` - A [`MusicApi`] backed by an in-memory catalog, device
//!   list, and playlists, recording every call
//! - `FakeAccounts` - A [`TokenExchange`] that mints predictable tokens and
//!   can be told to reject grants
//! - Fixture helpers (`track`, `device`, `user`)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mock_spotify::{track, FakeAccounts, FakeSpotify};
//! use spotify_client::{PlaybackClient, TokenManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), spotify_client::SpotifyError> {
//!     let api = Arc::new(FakeSpotify::new().with_track(track("1", "Yellow", "Coldplay")));
//!     let accounts = Arc::new(FakeAccounts::new());
//!
//!     let tokens = Arc::new(TokenManager::authorize(accounts, "code").await?);
//!     let spotify = PlaybackClient::new(api.clone(), tokens);
//!
//!     let found = spotify.search("yellow").await?;
//!     assert_eq!(found.len(), 1);
//!     Ok(())
//! }
//! ```

mod accounts;
mod fixtures;
mod player;

pub use accounts::FakeAccounts;
pub use fixtures::{device, playlist, track, user};
pub use player::{FakeSpotify, PlayedRequest};

pub use spotify_client::{MusicApi, TokenExchange};
