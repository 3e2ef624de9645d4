//! Searching, playing and showing tracks.

use std::collections::HashSet;

use async_trait::async_trait;
use bot_core::Reply;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spotify_client::{SpotifyError, Track};
use tracing::{debug, info};

use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::formatting::track_card;
use crate::prompt::Prompt;
use crate::router::TriggerArgs;

use super::{PLAY_MUSIC, SELECT_DEVICE, SONG_QUERY};

const LINK_QUESTION: &str = "okay before I do that, do you have a spotify account?";

/// An alternative offered after the first match started playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Alternative {
    label: String,
    uri: String,
}

/// Search for a song and play the best match.
///
/// Step 0 collects the title (asking for one if the message had none),
/// step 1 searches and plays, offering other artists' versions when the
/// user did not name an artist, and step 2 plays the chosen version.
pub struct PlayMusic;

/// Tracks with distinct (artist, title), in search order.
fn distinct_versions(tracks: &[Track]) -> Vec<&Track> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter(|t| {
            seen.insert((
                t.primary_artist().to_lowercase(),
                t.name.to_lowercase(),
            ))
        })
        .collect()
}

fn search_query(title: &str, artist: Option<&str>) -> String {
    let title = title.trim().replace(" ' ", "'");
    match artist {
        Some(artist) => format!("{} artist:{}", title, artist.trim()),
        None => title,
    }
}

#[async_trait]
impl Dialog for PlayMusic {
    fn name(&self) -> &'static str {
        PLAY_MUSIC
    }

    fn step_count(&self) -> usize {
        3
    }

    async fn run_step(
        &self,
        step: usize,
        ctx: &mut StepContext<'_>,
        input: StepInput,
    ) -> Result<StepOutcome, DialogError> {
        match step {
            0 => {
                spotify_or_authorize!(ctx, Some(LINK_QUESTION));
                let args: TriggerArgs = ctx.args_as();

                if let Some(artist) = args.entity("songartist") {
                    ctx.set_local("artist", &artist)?;
                }
                match args.entity("songtitle") {
                    Some(title) => {
                        ctx.set_local("title", &title)?;
                        Ok(StepOutcome::Next(None))
                    }
                    None => Ok(StepOutcome::Prompt(Prompt::text("what should I play?"))),
                }
            }
            1 => {
                let title = ctx
                    .get_local::<String>("title")
                    .or_else(|| input.answer().and_then(|a| a.as_text()).map(str::to_string));
                let Some(title) = title else {
                    return Ok(StepOutcome::done());
                };
                let artist: Option<String> = ctx.get_local("artist");
                let spotify = spotify_or_authorize!(ctx, Some(LINK_QUESTION));

                ctx.say("looking for your music...").await?;
                ctx.typing().await;
                let tracks = spotify
                    .search(&search_query(&title, artist.as_deref()))
                    .await?;
                let Some(first) = tracks.first() else {
                    ctx.say("no music found, sorry.").await?;
                    return Ok(StepOutcome::done());
                };

                match spotify
                    .play(Some(&first.uri), ctx.conversation.device_id(), None)
                    .await
                {
                    Ok(()) => {}
                    Err(SpotifyError::NoActiveDevice) => {
                        info!(address = %ctx.address, "No active device, asking for one");
                        return Ok(StepOutcome::replace(
                            SELECT_DEVICE,
                            json!({ "play_track": first.uri }),
                        ));
                    }
                    Err(err) => return Err(err.into()),
                }
                ctx.send(Reply::card(track_card(first))).await?;

                let versions = distinct_versions(&tracks);
                if artist.is_some() || versions.len() < 2 {
                    return Ok(StepOutcome::done());
                }

                let alternatives: Vec<Alternative> = versions[1..]
                    .iter()
                    .map(|t| Alternative {
                        label: t.display_name(),
                        uri: t.uri.clone(),
                    })
                    .collect();
                debug!("Offering {} other versions", alternatives.len());
                let labels = alternatives.iter().map(|a| a.label.clone()).collect();
                ctx.set_local("alternatives", &alternatives)?;
                Ok(StepOutcome::Prompt(Prompt::choice(
                    "found other versions too...",
                    labels,
                )))
            }
            _ => {
                let Some((index, _)) = input.answer().and_then(|a| a.choice()) else {
                    return Ok(StepOutcome::done());
                };
                let alternatives: Vec<Alternative> =
                    ctx.get_local("alternatives").unwrap_or_default();
                let Some(chosen) = alternatives.get(index) else {
                    return Ok(StepOutcome::done());
                };

                let spotify = spotify_or_authorize!(ctx);
                spotify
                    .play(Some(&chosen.uri), ctx.conversation.device_id(), None)
                    .await?;
                ctx.say("(y)").await?;
                Ok(StepOutcome::done())
            }
        }
    }
}

/// Shows what is playing right now.
pub struct SongQuery;

#[async_trait]
impl Dialog for SongQuery {
    fn name(&self) -> &'static str {
        SONG_QUERY
    }

    fn step_count(&self) -> usize {
        1
    }

    async fn run_step(
        &self,
        _step: usize,
        ctx: &mut StepContext<'_>,
        _input: StepInput,
    ) -> Result<StepOutcome, DialogError> {
        let spotify = spotify_or_authorize!(ctx);

        match spotify.current_track().await? {
            Some(track) => {
                ctx.say("here you go").await?;
                ctx.send(Reply::card(track_card(&track))).await?;
            }
            None => ctx.say("nothing is playing").await?,
        }
        Ok(StepOutcome::done())
    }
}
