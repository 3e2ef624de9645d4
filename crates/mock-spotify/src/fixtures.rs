//! Builders for test objects.

use spotify_client::{
    Album, Artist, Device, ExternalUrls, Image, Playlist, PlaylistOwner, SpotifyUser, Track,
    TrackCount,
};

/// A three-minute track with uri `spotify:track:{id}`.
pub fn track(id: &str, title: &str, artist: &str) -> Track {
    Track {
        id: Some(id.to_string()),
        name: title.to_string(),
        artists: vec![Artist {
            id: None,
            name: artist.to_string(),
        }],
        album: Album {
            id: None,
            name: format!("{} album", title),
            images: vec![Image {
                url: format!("https://i.scdn.co/image/{}", id),
                width: Some(640),
                height: Some(640),
            }],
        },
        duration_ms: 180_000,
        uri: format!("spotify:track:{}", id),
        external_urls: ExternalUrls {
            spotify: Some(format!("https://open.spotify.com/track/{}", id)),
        },
    }
}

/// An inactive device.
pub fn device(id: &str, kind: &str, name: &str) -> Device {
    Device {
        id: Some(id.to_string()),
        kind: kind.to_string(),
        name: name.to_string(),
        is_active: false,
    }
}

/// An empty playlist owned by `owner_id`.
pub fn playlist(id: &str, name: &str, owner_id: &str) -> Playlist {
    Playlist {
        id: id.to_string(),
        name: name.to_string(),
        owner: PlaylistOwner {
            id: owner_id.to_string(),
            display_name: None,
        },
        tracks: TrackCount::default(),
        uri: format!("spotify:playlist:{}", id),
    }
}

/// An account profile.
pub fn user(id: &str, display_name: &str) -> SpotifyUser {
    SpotifyUser {
        id: id.to_string(),
        display_name: Some(display_name.to_string()),
        country: Some("US".to_string()),
        email: None,
    }
}
