//! Linking a music account.
//!
//! `Authorize` asks for consent and sends the authorization link.
//! The OAuth callback later starts `AuthorizationCompleted` in the same
//! conversation, which stores the token and restarts the dialog that
//! needed it.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use spotify_client::TokenManager;
use tracing::{info, warn};

use crate::auth::AuthState;
use crate::dialog::{Dialog, StepContext, StepInput, StepOutcome, AUTHORIZE};
use crate::error::DialogError;
use crate::prompt::Prompt;
use crate::state::PlaylistRef;

use super::playlist::account_id;
use super::{cancel_pattern, ResumeTarget, AUTHORIZATION_COMPLETED, SELECT_DEVICE};

const DEFAULT_QUESTION: &str = "do you want me to use your spotify account to play music?";

#[derive(Debug, Default, Deserialize)]
struct AuthorizeArgs {
    /// Question to ask instead of the default one.
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    resume: Option<ResumeTarget>,
}

/// Asks the user to link their account and sends the authorization link.
///
/// The link's `state` carries this conversation and the dialog to resume,
/// `SelectDevice` when none was given.
pub struct Authorize {
    cancel: Regex,
}

impl Authorize {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            cancel: cancel_pattern()?,
        })
    }
}

#[async_trait]
impl Dialog for Authorize {
    fn name(&self) -> &'static str {
        AUTHORIZE
    }

    fn step_count(&self) -> usize {
        2
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
        let args: AuthorizeArgs = ctx.args_as();

        if step == 0 {
            let question = args.message.as_deref().unwrap_or(DEFAULT_QUESTION);
            return Ok(StepOutcome::Prompt(Prompt::confirm(question)));
        }

        if !input.answer().is_some_and(|a| a.is_yes()) {
            ctx.say("k nvm").await?;
            return Ok(StepOutcome::done());
        }

        let resume = args.resume.unwrap_or_else(|| ResumeTarget {
            dialog: SELECT_DEVICE.to_string(),
            args: Value::Null,
        });
        let state = AuthState {
            address: ctx.address.clone(),
            user: ctx.user.clone(),
            resume_dialog: Some(resume.dialog),
            resume_args: resume.args,
        }
        .encode()
        .map_err(|e| DialogError::InvalidArgs(e.to_string()))?;

        info!(address = %ctx.address, "Sending authorization link");
        let url = ctx.services.spotify.authorize_url(&state);
        ctx.say(format!("good, [click here]({}) to authorize me", url))
            .await?;
        Ok(StepOutcome::done())
    }
}

#[derive(Debug, Default, Deserialize)]
struct CompletionArgs {
    #[serde(default)]
    code: String,
    #[serde(default)]
    resume_dialog: Option<String>,
    #[serde(default)]
    resume_args: Value,
}

/// Exchanges the authorization code, links the account and resumes the
/// interrupted dialog.
pub struct AuthorizationCompleted;

#[async_trait]
impl Dialog for AuthorizationCompleted {
    fn name(&self) -> &'static str {
        AUTHORIZATION_COMPLETED
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
        let args: CompletionArgs = ctx.args_as();

        let tokens = match TokenManager::authorize(ctx.services.accounts.clone(), &args.code).await
        {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(address = %ctx.address, "Authorization code exchange failed: {}", err);
                ctx.say("cannot authorize bot :(").await?;
                return Ok(StepOutcome::done());
            }
        };
        ctx.link_account(tokens).await;
        ctx.user_data.spotify_user = None;

        let spotify = ctx.spotify()?;
        let owner = account_id(ctx, &spotify).await?;
        info!(address = %ctx.address, "Linked account {}", owner);

        if let Some(name) = ctx.services.spotify.queue_playlist_name.clone() {
            let queue = spotify
                .playlists()
                .await?
                .iter()
                .find(|p| p.owner.id == owner && p.name.eq_ignore_ascii_case(&name))
                .map(PlaylistRef::from);
            if let Some(playlist) = queue {
                info!(address = %ctx.address, "Using queue playlist {}", playlist.id);
                ctx.conversation.playlist = Some(playlist);
            }
        }

        ctx.say("thanks!").await?;
        match args.resume_dialog {
            Some(dialog) => Ok(StepOutcome::replace(dialog, args.resume_args)),
            None => {
                ctx.say("all set!").await?;
                Ok(StepOutcome::done())
            }
        }
    }
}
