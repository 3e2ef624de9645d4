use async_trait::async_trait;
use serde::Deserialize;

use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::state::ConversationData;

use super::DELETE_USER_DATA;

#[derive(Debug, Default, Deserialize)]
struct ResetArgs {
    #[serde(default)]
    message: Option<String>,
}

/// Forgets the selected device, the active playlist and the linked account.
///
/// Started by `reset`, which also clears any suspended dialogs.
pub struct DeleteUserData;

#[async_trait]
impl Dialog for DeleteUserData {
    fn name(&self) -> &'static str {
        DELETE_USER_DATA
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
        let args: ResetArgs = ctx.args_as();

        *ctx.conversation = ConversationData::default();
        ctx.unlink_account();
        tracing::info!(address = %ctx.address, "Deleted user data");

        ctx.say(args.message.as_deref().unwrap_or("all clear! ;)"))
            .await?;
        Ok(StepOutcome::done())
    }
}
