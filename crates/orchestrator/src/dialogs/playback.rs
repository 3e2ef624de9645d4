//! Transport controls: play, pause, skip, seek, volume, shuffle, repeat.

use async_trait::async_trait;
use spotify_client::{TransportArgs, TransportCommand, TransportParseError};
use tracing::debug;

use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::router::TriggerArgs;

use super::PLAYBACK;

/// Applies one transport command to the linked account's player.
///
/// The command comes from a `player_command::*` entity when the message
/// was recognized, or from the matched word for bare commands like `pause`.
pub struct Playback;

fn parse_error_reply(err: &TransportParseError) -> &'static str {
    match err {
        TransportParseError::UnknownCommand(_) => "not sure what to do with the player :/",
        TransportParseError::InvalidSeek => "where to? try **seek 1:30** or **seek 50%**",
        TransportParseError::InvalidVolume => "how loud? try **volume 40**",
    }
}

#[async_trait]
impl Dialog for Playback {
    fn name(&self) -> &'static str {
        PLAYBACK
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
        let args: TriggerArgs = ctx.args_as();

        let name = args
            .command("player_command::")
            .or_else(|| args.capture(1))
            .unwrap_or_default();
        let raw = TransportArgs {
            time: args.entity("time").map(str::to_string),
            number: args.entity("number").map(str::to_string),
            switch: args.entity("switch").map(str::to_string),
        };

        let command = match TransportCommand::parse(name, &raw) {
            Ok(command) => command,
            Err(err) => {
                debug!("Unusable transport command {:?}: {}", name, err);
                ctx.say(parse_error_reply(&err)).await?;
                return Ok(StepOutcome::done());
            }
        };

        let outcome = spotify
            .apply_transport_command(&command, ctx.conversation.device_id())
            .await?;
        ctx.say(outcome.message).await?;
        Ok(StepOutcome::done())
    }
}
