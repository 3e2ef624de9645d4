//! Dialogs: named, resumable multi-step flows.
//!
//! A dialog is a fixed number of steps. Each step receives a [`StepInput`]
//! and a [`StepContext`] (the frame's arguments and local state plus the
//! conversation and user data) and returns a [`StepOutcome`] telling the
//! engine what to do next. Steps never touch the dialog stack directly.

use std::sync::Arc;

use async_trait::async_trait;
use bot_core::{Address, ChatUser, Reply};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use spotify_client::{
    MusicApi, PlaybackClient, SpotifyConfig, SpotifyError, TokenExchange, TokenManager,
};

use crate::error::DialogError;
use crate::prompt::{Answer, Prompt};
use crate::sender::MessageSender;
use crate::state::{ConversationData, UserData};

/// Name of the dialog that links a music account.
pub const AUTHORIZE: &str = "Authorize";

/// External collaborators shared by every dialog.
pub struct Services {
    /// Music-service Web API.
    pub api: Arc<dyn MusicApi>,
    /// Authorization server.
    pub accounts: Arc<dyn TokenExchange>,
    /// Client configuration (authorize URL, queue playlist, search limit).
    pub spotify: SpotifyConfig,
}

/// What a step is being run with.
#[derive(Debug, Clone, PartialEq)]
pub enum StepInput {
    /// Step 0 of a freshly started dialog.
    Args(Value),
    /// The answer to the previous step's prompt; `None` when declined or
    /// not understood.
    Answer(Option<Answer>),
    /// The result of a child dialog that just ended.
    Resumed(Option<Value>),
}

impl StepInput {
    /// The prompt answer, if this input carries one.
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answer(answer) => answer.as_ref(),
            _ => None,
        }
    }

    /// The child result, if this input carries one.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Resumed(result) => result.as_ref(),
            _ => None,
        }
    }
}

/// What the engine should do after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Send the prompt and suspend until the user answers.
    Prompt(Prompt),
    /// Run the next step immediately with the given answer.
    Next(Option<Answer>),
    /// Pop this frame, handing the result to the parent's next step.
    End(Option<Value>),
    /// Push a child dialog; this frame resumes at its next step when the
    /// child ends.
    Begin { dialog: String, args: Value },
    /// Pop this frame and push another in its place.
    Replace { dialog: String, args: Value },
}

impl StepOutcome {
    /// End with no result.
    pub fn done() -> Self {
        Self::End(None)
    }

    pub fn begin(dialog: impl Into<String>, args: Value) -> Self {
        Self::Begin {
            dialog: dialog.into(),
            args,
        }
    }

    pub fn replace(dialog: impl Into<String>, args: Value) -> Self {
        Self::Replace {
            dialog: dialog.into(),
            args,
        }
    }
}

/// A named, ordered sequence of steps.
#[async_trait]
pub trait Dialog: Send + Sync {
    /// Registered name, used in triggers, frames and resume targets.
    fn name(&self) -> &'static str;

    /// Number of steps. Running past the last step ends the dialog.
    fn step_count(&self) -> usize;

    /// Input matching this pattern cancels the dialog while it is suspended.
    fn cancel_pattern(&self) -> Option<&Regex> {
        None
    }

    /// Run step `step`.
    async fn run_step(
        &self,
        step: usize,
        ctx: &mut StepContext<'_>,
        input: StepInput,
    ) -> Result<StepOutcome, DialogError>;
}

/// Everything a step may read or change.
pub struct StepContext<'a> {
    pub address: &'a Address,
    pub user: &'a ChatUser,
    /// Name of the running dialog.
    pub dialog: &'a str,
    /// Arguments the frame was started with.
    pub args: &'a Value,
    /// The frame's private state.
    pub local: &'a mut Map<String, Value>,
    pub conversation: &'a mut ConversationData,
    pub user_data: &'a mut UserData,
    pub services: &'a Services,
    pub(crate) sender: &'a dyn MessageSender,
    pub(crate) tokens: &'a mut Option<Arc<TokenManager>>,
}

impl<'a> StepContext<'a> {
    /// Send a reply right away.
    pub async fn send(&self, reply: Reply) -> Result<(), DialogError> {
        self.sender
            .send(self.address, &reply)
            .await
            .map_err(|e| DialogError::Send(e.to_string()))
    }

    /// Send a text reply right away.
    pub async fn say(&self, text: impl AsRef<str>) -> Result<(), DialogError> {
        self.send(Reply::text(text.as_ref())).await
    }

    /// Show the typing indicator while a slow call runs.
    pub async fn typing(&self) {
        if let Err(err) = self.sender.set_typing(self.address, true).await {
            tracing::debug!("Failed to send typing indicator: {}", err);
        }
    }

    /// A music-service client for the linked account.
    ///
    /// Fails with [`SpotifyError::AuthExpired`] when no account is linked.
    pub fn spotify(&mut self) -> Result<PlaybackClient, DialogError> {
        let token = self
            .user_data
            .spotify_token
            .clone()
            .ok_or(DialogError::Spotify(SpotifyError::AuthExpired))?;

        let tokens = self
            .tokens
            .get_or_insert_with(|| {
                Arc::new(TokenManager::new(
                    self.services.accounts.clone(),
                    Some(token),
                ))
            })
            .clone();

        Ok(PlaybackClient::new(self.services.api.clone(), tokens)
            .with_search_limit(self.services.spotify.search_limit)
            .with_skip_settle(self.services.spotify.skip_settle))
    }

    /// A music-service client, or the outcome that hands control to
    /// `Authorize` and resumes this dialog with its current arguments once
    /// the account is linked.
    pub fn spotify_or_authorize(
        &mut self,
        message: Option<&str>,
    ) -> Result<PlaybackClient, StepOutcome> {
        if self.user_data.is_linked() {
            if let Ok(client) = self.spotify() {
                return Ok(client);
            }
        }

        tracing::info!(
            address = %self.address,
            "No linked account, authorizing before {}",
            self.dialog
        );
        Err(StepOutcome::replace(
            AUTHORIZE,
            json!({
                "message": message,
                "resume": { "dialog": self.dialog, "args": self.args },
            }),
        ))
    }

    /// Install a freshly authorized token for the rest of the turn.
    pub async fn link_account(&mut self, tokens: TokenManager) {
        self.user_data.spotify_token = tokens.current().await;
        *self.tokens = Some(Arc::new(tokens));
    }

    /// Forget the linked account for the rest of the turn.
    pub fn unlink_account(&mut self) {
        self.user_data.spotify_token = None;
        self.user_data.spotify_user = None;
        *self.tokens = None;
    }

    /// Read a typed value from local state.
    pub fn get_local<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.local
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Write a typed value to local state.
    pub fn set_local<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), DialogError> {
        let value = serde_json::to_value(value).map_err(|e| DialogError::InvalidArgs(e.to_string()))?;
        self.local.insert(key.to_string(), value);
        Ok(())
    }

    /// Deserialize the frame's start arguments.
    pub fn args_as<T: DeserializeOwned + Default>(&self) -> T {
        if self.args.is_null() {
            return T::default();
        }
        serde_json::from_value(self.args.clone()).unwrap_or_else(|err| {
            tracing::debug!("Ignoring unreadable args for {}: {}", self.dialog, err);
            T::default()
        })
    }
}
