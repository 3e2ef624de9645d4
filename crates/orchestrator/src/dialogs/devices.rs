use async_trait::async_trait;
use serde::Deserialize;
use spotify_client::Device;
use tracing::info;

use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::prompt::Prompt;

use super::SELECT_DEVICE;

#[derive(Debug, Default, Deserialize)]
struct SelectDeviceArgs {
    /// Track to start on the chosen device.
    #[serde(default)]
    play_track: Option<String>,
}

/// Lets the user pick the device the bot plays on.
///
/// The choice is remembered for the conversation and playback is moved
/// there. When started on behalf of `PlayMusic`, the pending track then
/// plays on the new device.
pub struct SelectDevice;

#[async_trait]
impl Dialog for SelectDevice {
    fn name(&self) -> &'static str {
        SELECT_DEVICE
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
            // Restricted devices have no id and cannot be targeted.
            let devices: Vec<Device> = spotify
                .list_devices()
                .await?
                .into_iter()
                .filter(|d| d.id.is_some())
                .collect();
            if devices.is_empty() {
                ctx.say("no devices found. open spotify and try again :)")
                    .await?;
                return Ok(StepOutcome::done());
            }

            let labels = devices.iter().map(Device::label).collect();
            ctx.set_local("devices", &devices)?;
            return Ok(StepOutcome::Prompt(Prompt::choice(
                "which of these devices you want me use?",
                labels,
            )));
        }

        let devices: Vec<Device> = ctx.get_local("devices").unwrap_or_default();
        let chosen = input
            .answer()
            .and_then(|a| a.choice())
            .and_then(|(index, _)| devices.get(index));
        let Some(device) = chosen else {
            ctx.say("no problem - going to use active device then ;)")
                .await?;
            return Ok(StepOutcome::done());
        };
        let Some(device_id) = device.id.clone() else {
            return Ok(StepOutcome::done());
        };

        info!(address = %ctx.address, "Selected device {}", device.label());
        ctx.conversation.device = Some(device.clone());
        ctx.say("got it (y)").await?;

        spotify.set_active_device(&device_id).await?;
        let args: SelectDeviceArgs = ctx.args_as();
        if let Some(track) = args.play_track {
            spotify.play(Some(&track), Some(&device_id), None).await?;
        }
        Ok(StepOutcome::done())
    }
}
