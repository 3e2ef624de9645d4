//! Web API objects mirrored from Spotify.
//!
//! These are transient DTOs: fetched, shown, and referenced by id in
//! follow-up calls. Only the fields the bot reads are modeled.

use serde::{Deserialize, Serialize};

use crate::transport::RepeatState;

/// Links to the Spotify web player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify: Option<String>,
}

/// Cover art.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A track artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// A track's album.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// A track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    /// Track title.
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub duration_ms: u64,
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Track {
    /// Name of the first credited artist.
    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(|a| a.name.as_str())
            .unwrap_or("not sure who")
    }

    /// "artist - title".
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.primary_artist(), self.name)
    }
}

/// Owner of a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Track count reference embedded in playlist objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCount {
    #[serde(default)]
    pub total: u32,
}

/// A playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: PlaylistOwner,
    #[serde(default)]
    pub tracks: TrackCount,
    pub uri: String,
}

/// A playback device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device id. Spotify may omit it for restricted devices.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

impl Device {
    /// "type - name", as shown in the device picker.
    pub fn label(&self) -> String {
        format!("{} - {}", self.kind, self.name)
    }
}

/// The linked account's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Current playback state from `/me/player`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub repeat_state: RepeatState,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_from_api_json() {
        let track: Track = serde_json::from_str(
            r#"{
                "id": "7qiZfU4dY1lWllzX7mPBI3",
                "name": "Shape of You",
                "artists": [{ "id": "6eUKZXaKkcviH0Ku9w2n3V", "name": "Ed Sheeran" }],
                "album": { "id": "3T4tUhGYeRNVUGevb0wThu", "name": "÷", "images": [{ "url": "https://i.scdn.co/a.jpg", "width": 640, "height": 640 }] },
                "duration_ms": 233712,
                "uri": "spotify:track:7qiZfU4dY1lWllzX7mPBI3",
                "external_urls": { "spotify": "https://open.spotify.com/track/7qiZfU4dY1lWllzX7mPBI3" },
                "popularity": 90
            }"#,
        )
        .unwrap();

        assert_eq!(track.display_name(), "Ed Sheeran - Shape of You");
        assert_eq!(track.album.images.len(), 1);
    }

    #[test]
    fn test_track_without_artists() {
        let track: Track =
            serde_json::from_str(r#"{ "name": "Untitled", "uri": "spotify:track:x" }"#).unwrap();
        assert_eq!(track.primary_artist(), "not sure who");
    }

    #[test]
    fn test_device_label() {
        let device: Device = serde_json::from_str(
            r#"{ "id": "abc", "type": "Computer", "name": "Laptop", "is_active": true, "volume_percent": 40 }"#,
        )
        .unwrap();
        assert_eq!(device.label(), "Computer - Laptop");
    }

    #[test]
    fn test_playback_state_repeat_mode() {
        let state: PlaybackState = serde_json::from_str(
            r#"{ "shuffle_state": true, "repeat_state": "context", "is_playing": true }"#,
        )
        .unwrap();
        assert_eq!(state.repeat_state, RepeatState::Context);
        assert!(state.shuffle_state);
    }
}
