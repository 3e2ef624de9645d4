//! The active playlist: choosing, creating, and adding to it.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use spotify_client::{AddOutcome, PlaybackClient};
use tracing::{debug, info};

use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::prompt::{Answer, Prompt};
use crate::router::TriggerArgs;
use crate::state::PlaylistRef;

use super::{cancel_pattern, CREATE_PLAYLIST, PLAYLIST_CONTROL, SETUP_PLAYLIST};

const CREATE_LABEL: &str = "create new playlist";

/// Id of the linked account, fetching and caching the profile if needed.
pub(super) async fn account_id(
    ctx: &mut StepContext<'_>,
    spotify: &PlaybackClient,
) -> Result<String, DialogError> {
    if let Some(profile) = &ctx.user_data.spotify_user {
        return Ok(profile.id.clone());
    }
    let profile = spotify.current_user().await?;
    let id = profile.id.clone();
    ctx.user_data.spotify_user = Some(profile);
    Ok(id)
}

fn playlist_result(playlist: &PlaylistRef) -> Value {
    json!({ "playlist": playlist })
}

fn playlist_from_result(result: Option<&Value>) -> Option<PlaylistRef> {
    result
        .and_then(|r| r.get("playlist"))
        .and_then(|p| serde_json::from_value(p.clone()).ok())
}

/// Commands that act on the active playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaylistAction {
    Add,
    Clear,
    Play,
}

impl PlaylistAction {
    fn parse(command: &str) -> Option<Self> {
        match command {
            "add" => Some(Self::Add),
            "clear" => Some(Self::Clear),
            "play" => Some(Self::Play),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Clear => "clear",
            Self::Play => "play",
        }
    }

    async fn perform(
        self,
        ctx: &mut StepContext<'_>,
        spotify: &PlaybackClient,
        playlist: &PlaylistRef,
    ) -> Result<(), DialogError> {
        debug!("Playlist {} on {}", self.as_str(), playlist.id);
        match self {
            Self::Add => {
                let Some(track) = spotify.current_track().await? else {
                    return ctx.say("nothing is playing").await;
                };
                let reply = match spotify
                    .add_track_to_playlist(&track.uri, &playlist.id)
                    .await?
                {
                    AddOutcome::Added => format!(
                        "added **{}** to **{}**",
                        track.display_name(),
                        playlist.name
                    ),
                    AddOutcome::AlreadyPresent => format!(
                        "**{}** is already in **{}**",
                        track.display_name(),
                        playlist.name
                    ),
                };
                ctx.say(reply).await
            }
            Self::Clear => {
                let removed = spotify.clear_playlist(&playlist.id).await?;
                ctx.say(format!("removed {} tracks from **{}**", removed, playlist.name))
                    .await
            }
            Self::Play => {
                spotify
                    .play(None, ctx.conversation.device_id(), Some(&playlist.uri))
                    .await?;
                ctx.say(format!("playing **{}**", playlist.name)).await
            }
        }
    }
}

/// Entry point for playlist commands.
///
/// `create` and `show` hand off to [`CreatePlaylist`] and [`SetupPlaylist`].
/// `add`, `clear` and `play` need an active playlist; when there is none,
/// `SetupPlaylist` runs first and the command is performed on its result.
pub struct PlaylistControl;

#[async_trait]
impl Dialog for PlaylistControl {
    fn name(&self) -> &'static str {
        PLAYLIST_CONTROL
    }

    fn step_count(&self) -> usize {
        2
    }

    async fn run_step(
        &self,
        step: usize,
        ctx: &mut StepContext<'_>,
        input: StepInput,
    ) -> Result<StepOutcome, DialogError> {
        let spotify = spotify_or_authorize!(ctx);

        if step == 0 {
            let args: TriggerArgs = ctx.args_as();
            let command = args.command("playlist_command::").unwrap_or_default();

            match command {
                "create" => {
                    return Ok(StepOutcome::begin(
                        CREATE_PLAYLIST,
                        json!({ "name": args.entity("playlist_name") }),
                    ));
                }
                "show" => {
                    return Ok(StepOutcome::begin(SETUP_PLAYLIST, json!({ "choose": true })));
                }
                _ => {}
            }

            let Some(action) = PlaylistAction::parse(command) else {
                ctx.say("not sure what to do with your playlist :/").await?;
                return Ok(StepOutcome::done());
            };
            return match ctx.conversation.playlist.clone() {
                Some(playlist) => {
                    action.perform(ctx, &spotify, &playlist).await?;
                    Ok(StepOutcome::done())
                }
                None => {
                    ctx.set_local("pending", &action.as_str())?;
                    Ok(StepOutcome::begin(SETUP_PLAYLIST, json!({})))
                }
            };
        }

        let pending = ctx
            .get_local::<String>("pending")
            .and_then(|p| PlaylistAction::parse(&p));
        let playlist = playlist_from_result(input.result());

        match (pending, playlist) {
            (Some(action), Some(playlist)) => {
                action.perform(ctx, &spotify, &playlist).await?;
                Ok(StepOutcome::done())
            }
            (_, playlist) => Ok(StepOutcome::End(playlist.as_ref().map(playlist_result))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CreatePlaylistArgs {
    #[serde(default)]
    name: Option<String>,
}

/// Creates a playlist and makes it the active one.
///
/// Ends with `{ "playlist": ... }`.
pub struct CreatePlaylist;

#[async_trait]
impl Dialog for CreatePlaylist {
    fn name(&self) -> &'static str {
        CREATE_PLAYLIST
    }

    fn step_count(&self) -> usize {
        2
    }

    async fn run_step(
        &self,
        step: usize,
        ctx: &mut StepContext<'_>,
        input: StepInput,
    ) -> Result<StepOutcome, DialogError> {
        if step == 0 {
            let args: CreatePlaylistArgs = ctx.args_as();
            return Ok(match args.name.filter(|n| !n.trim().is_empty()) {
                Some(name) => StepOutcome::Next(Some(Answer::Text {
                    value: name.trim().to_string(),
                })),
                None => StepOutcome::Prompt(Prompt::text("what's the name of your playlist?")),
            });
        }

        let Some(name) = input.answer().and_then(|a| a.as_text()).map(str::to_string) else {
            return Ok(StepOutcome::done());
        };
        let spotify = spotify_or_authorize!(ctx);
        let owner = account_id(ctx, &spotify).await?;

        let playlist = PlaylistRef::from(&spotify.create_playlist(&owner, &name).await?);
        info!(address = %ctx.address, "Active playlist is now {}", playlist.name);
        ctx.conversation.playlist = Some(playlist.clone());
        ctx.say("playlist created (y)").await?;
        Ok(StepOutcome::End(Some(playlist_result(&playlist))))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SetupPlaylistArgs {
    /// Offer the choice even when a playlist is already active.
    #[serde(default)]
    choose: bool,
}

/// Picks the active playlist from the user's own playlists.
///
/// Keeps an already active playlist unless asked to choose. With no
/// playlists to choose from, or when the user picks "create new
/// playlist", it runs [`CreatePlaylist`] underneath itself, so cancelling
/// covers the name prompt too. Ends with `{ "playlist": ... }`.
pub struct SetupPlaylist {
    cancel: Regex,
}

impl SetupPlaylist {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            cancel: cancel_pattern()?,
        })
    }
}

#[async_trait]
impl Dialog for SetupPlaylist {
    fn name(&self) -> &'static str {
        SETUP_PLAYLIST
    }

    fn step_count(&self) -> usize {
        3
    }

    fn cancel_pattern(&self) -> Option<&Regex> {
        Some(&self.cancel)
    }

    async fn run_step(
        &self,
        step: usize,
        ctx: &mut StepContext<'_>,
        input: StepInput,
    ) -> Result<StepOutcome, DialogError> {
        let spotify = spotify_or_authorize!(ctx);

        if step == 0 {
            let args: SetupPlaylistArgs = ctx.args_as();
            if let (false, Some(playlist)) = (args.choose, &ctx.conversation.playlist) {
                return Ok(StepOutcome::End(Some(playlist_result(playlist))));
            }

            let owner = account_id(ctx, &spotify).await?;
            let playlists: Vec<PlaylistRef> = spotify
                .playlists()
                .await?
                .iter()
                .filter(|p| p.owner.id == owner)
                .map(PlaylistRef::from)
                .collect();
            if playlists.is_empty() {
                debug!("No playlists owned by {}, creating one", owner);
                return Ok(StepOutcome::begin(CREATE_PLAYLIST, json!({})));
            }

            let mut labels: Vec<String> = playlists.iter().map(|p| p.name.clone()).collect();
            labels.push(CREATE_LABEL.to_string());
            ctx.set_local("playlists", &playlists)?;
            return Ok(StepOutcome::Prompt(Prompt::choice(
                "choose a playlist or create one :)",
                labels,
            )));
        }

        // The created playlist, when CreatePlaylist ran as a child.
        if let StepInput::Resumed(result) = &input {
            return Ok(StepOutcome::End(result.clone()));
        }
        if step == 2 {
            return Ok(StepOutcome::done());
        }

        let Some((index, _)) = input.answer().and_then(|a| a.choice()) else {
            return Ok(StepOutcome::done());
        };
        let playlists: Vec<PlaylistRef> = ctx.get_local("playlists").unwrap_or_default();
        let Some(playlist) = playlists.get(index) else {
            return Ok(StepOutcome::begin(CREATE_PLAYLIST, json!({})));
        };

        info!(address = %ctx.address, "Active playlist is now {}", playlist.name);
        ctx.conversation.playlist = Some(playlist.clone());
        ctx.say("playlist set (y)").await?;
        Ok(StepOutcome::End(Some(playlist_result(playlist))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_result_roundtrip() {
        let playlist = PlaylistRef {
            id: "p1".to_string(),
            name: "road trip".to_string(),
            uri: "spotify:playlist:p1".to_string(),
            owner_id: "user-1".to_string(),
        };
        let result = playlist_result(&playlist);
        assert_eq!(playlist_from_result(Some(&result)), Some(playlist));
        assert_eq!(playlist_from_result(None), None);
        assert_eq!(playlist_from_result(Some(&json!({ "other": 1 }))), None);
    }

    #[test]
    fn test_playlist_action_parse() {
        assert_eq!(PlaylistAction::parse("add"), Some(PlaylistAction::Add));
        assert_eq!(PlaylistAction::parse("clear"), Some(PlaylistAction::Clear));
        assert_eq!(PlaylistAction::parse("create"), None);
    }
}
