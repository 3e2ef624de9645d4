//! Small talk.

use async_trait::async_trait;

use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::formatting::greeting;
use crate::router::TriggerArgs;

use super::{COMPLIMENT, GREETING};

/// Replies to "hi" with the user's name.
pub struct Greeting;

#[async_trait]
impl Dialog for Greeting {
    fn name(&self) -> &'static str {
        GREETING
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
        let args: TriggerArgs = ctx.args_as();
        let word = args.entity("greeting").map(str::to_lowercase);
        ctx.say(greeting(word.as_deref(), ctx.user)).await?;
        Ok(StepOutcome::done())
    }
}

/// Acknowledges "thanks" and "ok".
pub struct Compliment;

#[async_trait]
impl Dialog for Compliment {
    fn name(&self) -> &'static str {
        COMPLIMENT
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
        let args: TriggerArgs = ctx.args_as();
        let reply = match args.capture(1).map(str::to_lowercase).as_deref() {
            Some("thanks") => "no problem!",
            _ => "(y)",
        };
        ctx.say(reply).await?;
        Ok(StepOutcome::done())
    }
}
