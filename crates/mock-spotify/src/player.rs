//! Fake Web API.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use spotify_client::{
    Device, MusicApi, PlayRequest, PlaybackState, Playlist, RepeatState, SkipDirection,
    SpotifyError, SpotifyUser, Track, TrackCount,
};

use crate::fixtures::user;

/// A recorded `start_playback` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedRequest {
    pub request: PlayRequest,
    pub device_id: Option<String>,
}

impl PlayedRequest {
    /// The track the request starts with, if any.
    pub fn track_uri(&self) -> Option<&str> {
        self.request
            .uris
            .as_ref()
            .and_then(|uris| uris.first())
            .or_else(|| self.request.offset.as_ref().map(|o| &o.uri))
            .map(String::as_str)
    }
}

#[derive(Default)]
struct State {
    user: Option<SpotifyUser>,
    catalog: Vec<Track>,
    devices: Vec<Device>,
    playlists: Vec<Playlist>,
    playlist_tracks: HashMap<String, Vec<Track>>,
    current: Option<Track>,
    progress_ms: u64,
    is_playing: bool,
    repeat: RepeatState,
    shuffle: bool,
    volume: u8,
    no_active_device: bool,
    failure: Option<(u16, bool)>,
    calls: Vec<String>,
    tokens: Vec<String>,
    played: Vec<PlayedRequest>,
    next_playlist_id: usize,
}

/// An in-memory [`MusicApi`].
///
/// Search matches the catalog by title substring; a query of the form
/// `"title artist:name"` also filters by artist. Player commands fail with
/// [`SpotifyError::NoActiveDevice`] while [`FakeSpotify::set_no_active_device`]
/// is on and no device id is given.
pub struct FakeSpotify {
    state: Mutex<State>,
}

impl Default for FakeSpotify {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpotify {
    /// An empty service with a default account profile.
    pub fn new() -> Self {
        let state = State {
            user: Some(user("user-1", "Test User")),
            volume: 50,
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a catalog track.
    pub fn with_track(self, track: Track) -> Self {
        self.lock().catalog.push(track);
        self
    }

    /// Add several catalog tracks.
    pub fn with_tracks(self, tracks: impl IntoIterator<Item = Track>) -> Self {
        self.lock().catalog.extend(tracks);
        self
    }

    /// Add a device.
    pub fn with_device(self, device: Device) -> Self {
        self.lock().devices.push(device);
        self
    }

    /// Add a playlist with its tracks.
    pub fn with_playlist(self, mut playlist: Playlist, tracks: Vec<Track>) -> Self {
        {
            let mut state = self.lock();
            playlist.tracks = TrackCount {
                total: tracks.len() as u32,
            };
            state.playlist_tracks.insert(playlist.id.clone(), tracks);
            state.playlists.push(playlist);
        }
        self
    }

    /// Replace the account profile.
    pub fn with_user(self, profile: SpotifyUser) -> Self {
        self.lock().user = Some(profile);
        self
    }

    /// Make player commands without a device id fail with no active device.
    pub fn set_no_active_device(&self, on: bool) {
        self.lock().no_active_device = on;
    }

    /// Fail the next call with `status`.
    pub fn fail_next(&self, status: u16) {
        self.lock().failure = Some((status, false));
    }

    /// Fail every call with `status` until [`FakeSpotify::clear_failure`].
    pub fn fail_always(&self, status: u16) {
        self.lock().failure = Some((status, true));
    }

    /// Stop injecting failures.
    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// Names of the calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls named `name`.
    pub fn call_count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == name).count()
    }

    /// Access tokens presented so far, in order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }

    /// Every `start_playback` request.
    pub fn played(&self) -> Vec<PlayedRequest> {
        self.lock().played.clone()
    }

    /// The most recent `start_playback` request.
    pub fn last_played(&self) -> Option<PlayedRequest> {
        self.lock().played.last().cloned()
    }

    /// The track currently loaded.
    pub fn current(&self) -> Option<Track> {
        self.lock().current.clone()
    }

    /// Whether the player is playing.
    pub fn is_playing(&self) -> bool {
        self.lock().is_playing
    }

    /// Current playback position.
    pub fn progress_ms(&self) -> u64 {
        self.lock().progress_ms
    }

    /// Current repeat mode.
    pub fn repeat(&self) -> RepeatState {
        self.lock().repeat
    }

    /// Current shuffle mode.
    pub fn shuffle(&self) -> bool {
        self.lock().shuffle
    }

    /// Current volume.
    pub fn volume(&self) -> u8 {
        self.lock().volume
    }

    /// Id of the active device.
    pub fn active_device(&self) -> Option<String> {
        self.lock()
            .devices
            .iter()
            .find(|d| d.is_active)
            .and_then(|d| d.id.clone())
    }

    /// All playlists.
    pub fn playlists_snapshot(&self) -> Vec<Playlist> {
        self.lock().playlists.clone()
    }

    /// Track uris in a playlist.
    pub fn playlist_uris(&self, playlist_id: &str) -> Vec<String> {
        self.lock()
            .playlist_tracks
            .get(playlist_id)
            .map(|tracks| tracks.iter().map(|t| t.uri.clone()).collect())
            .unwrap_or_default()
    }

    /// Record a call and apply failure injection.
    fn enter(&self, name: &str, token: &str) -> Result<MutexGuard<'_, State>, SpotifyError> {
        let mut state = self.lock();
        state.calls.push(name.to_string());
        state.tokens.push(token.to_string());

        if let Some((status, persistent)) = state.failure {
            if !persistent {
                state.failure = None;
            }
            return Err(SpotifyError::Upstream {
                status,
                message: format!("injected failure on {}", name),
            });
        }
        Ok(state)
    }

    /// `enter` for player commands.
    fn enter_player(
        &self,
        name: &str,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<MutexGuard<'_, State>, SpotifyError> {
        let mut state = self.enter(name, token)?;
        match device_id {
            Some(id) => {
                activate(&mut state, id)?;
            }
            None if state.no_active_device => return Err(SpotifyError::NoActiveDevice),
            None => {}
        }
        Ok(state)
    }
}

fn activate(state: &mut State, device_id: &str) -> Result<(), SpotifyError> {
    if !state
        .devices
        .iter()
        .any(|d| d.id.as_deref() == Some(device_id))
    {
        return Err(SpotifyError::Upstream {
            status: 404,
            message: format!("device {} not found", device_id),
        });
    }
    for device in &mut state.devices {
        device.is_active = device.id.as_deref() == Some(device_id);
    }
    state.no_active_device = false;
    Ok(())
}

fn not_found(what: &str) -> SpotifyError {
    SpotifyError::Upstream {
        status: 404,
        message: format!("{} not found", what),
    }
}

fn matches_query(track: &Track, query: &str) -> bool {
    let query = query.to_lowercase();
    let (title, artist) = match query.split_once("artist:") {
        Some((title, artist)) => (title, Some(artist.trim())),
        None => (query.as_str(), None),
    };
    let title = title.trim().trim_start_matches("track:").trim();

    let title_ok = title.is_empty() || track.name.to_lowercase().contains(title);
    let artist_ok = artist.map_or(true, |a| {
        track
            .artists
            .iter()
            .any(|x| x.name.to_lowercase().contains(a))
    });
    title_ok && artist_ok
}

#[async_trait]
impl MusicApi for FakeSpotify {
    async fn current_user(&self, token: &str) -> Result<SpotifyUser, SpotifyError> {
        let state = self.enter("current_user", token)?;
        state.user.clone().ok_or_else(|| not_found("user"))
    }

    async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Track>, SpotifyError> {
        let state = self.enter("search_tracks", token)?;
        Ok(state
            .catalog
            .iter()
            .filter(|t| matches_query(t, query))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn start_playback(
        &self,
        token: &str,
        request: &PlayRequest,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter_player("start_playback", token, device_id)?;
        let played = PlayedRequest {
            request: request.clone(),
            device_id: device_id.map(str::to_string),
        };

        if let Some(uri) = played.track_uri() {
            let track = state
                .catalog
                .iter()
                .chain(state.playlist_tracks.values().flatten())
                .find(|t| t.uri == uri)
                .cloned();
            state.current = track;
            state.progress_ms = 0;
        }
        state.is_playing = true;
        state.played.push(played);
        Ok(())
    }

    async fn pause_playback(
        &self,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter_player("pause_playback", token, device_id)?;
        state.is_playing = false;
        Ok(())
    }

    async fn skip(
        &self,
        token: &str,
        direction: SkipDirection,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let name = match direction {
            SkipDirection::Next => "skip_next",
            SkipDirection::Previous => "skip_previous",
        };
        let mut state = self.enter_player(name, token, device_id)?;
        // Step through the catalog; the ends stay put.
        let position = state
            .current
            .as_ref()
            .and_then(|current| state.catalog.iter().position(|t| t.uri == current.uri));
        if let Some(index) = position {
            let target = match direction {
                SkipDirection::Next => (index + 1).min(state.catalog.len() - 1),
                SkipDirection::Previous => index.saturating_sub(1),
            };
            state.current = state.catalog.get(target).cloned();
        }
        state.progress_ms = 0;
        Ok(())
    }

    async fn seek(
        &self,
        token: &str,
        position_ms: u64,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter_player("seek", token, device_id)?;
        state.progress_ms = position_ms;
        Ok(())
    }

    async fn set_volume(
        &self,
        token: &str,
        percent: u8,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter_player("set_volume", token, device_id)?;
        state.volume = percent;
        Ok(())
    }

    async fn set_repeat(
        &self,
        token: &str,
        repeat: RepeatState,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter_player("set_repeat", token, device_id)?;
        state.repeat = repeat;
        Ok(())
    }

    async fn set_shuffle(
        &self,
        token: &str,
        on: bool,
        device_id: Option<&str>,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter_player("set_shuffle", token, device_id)?;
        state.shuffle = on;
        Ok(())
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, SpotifyError> {
        let state = self.enter("devices", token)?;
        Ok(state.devices.clone())
    }

    async fn transfer_playback(
        &self,
        token: &str,
        device_id: &str,
        play: bool,
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter("transfer_playback", token)?;
        activate(&mut state, device_id)?;
        if play {
            state.is_playing = true;
        }
        Ok(())
    }

    async fn currently_playing(&self, token: &str) -> Result<Option<Track>, SpotifyError> {
        let state = self.enter("currently_playing", token)?;
        Ok(state.current.clone())
    }

    async fn playback_state(&self, token: &str) -> Result<Option<PlaybackState>, SpotifyError> {
        let state = self.enter("playback_state", token)?;
        let device = state.devices.iter().find(|d| d.is_active).cloned();
        if device.is_none() && state.current.is_none() {
            return Ok(None);
        }

        Ok(Some(PlaybackState {
            device,
            shuffle_state: state.shuffle,
            repeat_state: state.repeat,
            is_playing: state.is_playing,
            progress_ms: Some(state.progress_ms),
            item: state.current.clone(),
        }))
    }

    async fn playlists(&self, token: &str) -> Result<Vec<Playlist>, SpotifyError> {
        let state = self.enter("playlists", token)?;
        Ok(state.playlists.clone())
    }

    async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Playlist, SpotifyError> {
        let mut state = self.enter("create_playlist", token)?;
        state.next_playlist_id += 1;
        let id = format!("created-{}", state.next_playlist_id);
        let playlist = crate::fixtures::playlist(&id, name, user_id);

        state.playlist_tracks.insert(id, Vec::new());
        state.playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<Track>, SpotifyError> {
        let state = self.enter("playlist_tracks", token)?;
        state
            .playlist_tracks
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| not_found("playlist"))
    }

    async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter("add_tracks", token)?;
        let additions: Vec<Track> = uris
            .iter()
            .map(|uri| {
                state
                    .catalog
                    .iter()
                    .find(|t| &t.uri == uri)
                    .cloned()
                    .ok_or_else(|| not_found("track"))
            })
            .collect::<Result<_, _>>()?;

        let tracks = state
            .playlist_tracks
            .get_mut(playlist_id)
            .ok_or_else(|| not_found("playlist"))?;
        tracks.extend(additions);
        let total = tracks.len() as u32;
        set_total(&mut state, playlist_id, total);
        Ok(())
    }

    async fn remove_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let mut state = self.enter("remove_tracks", token)?;
        let tracks = state
            .playlist_tracks
            .get_mut(playlist_id)
            .ok_or_else(|| not_found("playlist"))?;
        tracks.retain(|t| !uris.contains(&t.uri));
        let total = tracks.len() as u32;
        set_total(&mut state, playlist_id, total);
        Ok(())
    }
}

fn set_total(state: &mut State, playlist_id: &str, total: u32) {
    if let Some(p) = state.playlists.iter_mut().find(|p| p.id == playlist_id) {
        p.tracks.total = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{device, track};

    #[test]
    fn test_query_matching() {
        let t = track("1", "Shape of You", "Ed Sheeran");
        assert!(matches_query(&t, "shape of you"));
        assert!(matches_query(&t, "shape of you artist:ed sheeran"));
        assert!(!matches_query(&t, "shape of you artist:someone else"));
        assert!(!matches_query(&t, "yellow"));
    }

    #[tokio::test]
    async fn test_no_active_device() {
        let fake = FakeSpotify::new().with_device(device("d1", "Computer", "Laptop"));
        fake.set_no_active_device(true);

        let err = fake.pause_playback("t", None).await.unwrap_err();
        assert!(matches!(err, SpotifyError::NoActiveDevice));

        fake.pause_playback("t", Some("d1")).await.unwrap();
        assert_eq!(fake.active_device().as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let fake = FakeSpotify::new();
        fake.fail_next(500);

        assert!(fake.devices("t").await.is_err());
        assert!(fake.devices("t").await.is_ok());
        assert_eq!(fake.call_count("devices"), 2);
    }
}
