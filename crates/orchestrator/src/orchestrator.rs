//! Main orchestrator that coordinates message processing.

use std::collections::HashMap;
use std::sync::Arc;

use bot_core::{Address, ChatUser, InboundKind, InboundMessage, Recognizer, Reply};
use serde_json::{json, Value};
use spotify_client::SpotifyError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dialog::{Services, AUTHORIZE};
use crate::dialogs::{self, ResumeTarget, AUTHORIZATION_COMPLETED, DELETE_USER_DATA};
use crate::engine::{DialogEngine, Turn};
use crate::error::{DialogError, OrchestratorError};
use crate::formatting::{
    contact_greeting, APOLOGY_TEXT, BOT_ADDED_TEXT, BOT_REMOVED_TEXT, HELP_TEXT, NO_DEVICE_TEXT,
    RELINK_TEXT,
};
use crate::router::RoutingTable;
use crate::sender::MessageSender;
use crate::state::{ConversationRecord, UserData};
use crate::store::StateStore;

/// Idle per-conversation locks are dropped once this many accumulate.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// What a turn did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The input went to the suspended dialog.
    Continued,
    /// A trigger (or a proactive start) began this dialog.
    Started(String),
    /// The suspended dialog matched its cancel pattern and was ended.
    Cancelled(String),
    /// Nothing matched; the help text was sent.
    Miss,
    /// A step failed; the user was told and nothing was saved.
    Failed,
    /// The linked account stopped working and `Authorize` was started.
    Reauthorize,
    /// A connector event was answered without touching any dialog.
    Acknowledged,
}

/// Work for one turn.
enum Work<'a> {
    Message(&'a str),
    Begin(&'a str, Value),
}

/// Main orchestrator that coordinates message processing.
///
/// The orchestrator:
/// - Serializes turns per conversation, runs conversations in parallel
/// - Maintains typing indicators throughout processing
/// - Feeds input to the suspended dialog, or routes it to a new one
/// - Commits conversation and user state only when the turn succeeds
/// - Turns step failures into a user-facing message, restarting
///   authorization when the linked account stopped working
pub struct Orchestrator<S: MessageSender> {
    engine: DialogEngine,
    routes: RoutingTable,
    recognizer: Arc<dyn Recognizer>,
    store: StateStore,
    /// Message sender for the bot connector or other transports.
    sender: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: MessageSender> Orchestrator<S> {
    /// Create an orchestrator with the built-in dialogs and routes.
    pub fn new(
        sender: S,
        services: Services,
        recognizer: Arc<dyn Recognizer>,
        store: StateStore,
        config: EngineConfig,
    ) -> Result<Self, OrchestratorError> {
        let engine = DialogEngine::new(dialogs::catalogue()?, services, config);
        let routes = dialogs::routes()?;
        info!(
            "Orchestrator ready: {} triggers, recognizer {}",
            routes.triggers().len(),
            recognizer.name()
        );

        Ok(Self {
            engine,
            routes,
            recognizer,
            store,
            sender,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Process an incoming message.
    ///
    /// This method:
    /// 1. Waits for any turn already running in the conversation
    /// 2. Starts typing indicator
    /// 3. Continues, cancels or interrupts the suspended dialog, or routes
    ///    the text to a new one
    /// 4. Commits state, or reports the failure and discards it
    /// 5. Stops typing indicator
    ///
    /// Connector events are answered directly; a removed contact or a data
    /// deletion request starts `DeleteUserData`.
    pub async fn process(&self, message: InboundMessage) -> Result<TurnOutcome, OrchestratorError> {
        let InboundMessage {
            address,
            user,
            text,
            kind,
            ..
        } = message;

        match kind {
            InboundKind::Message => {
                info!(address = %address, "Processing message from {}", user.id);
                self.locked_turn(&address, &user, Work::Message(text.as_str()))
                    .await
            }
            InboundKind::BotAdded => self.acknowledge(&address, BOT_ADDED_TEXT).await,
            InboundKind::BotRemoved => self.acknowledge(&address, BOT_REMOVED_TEXT).await,
            InboundKind::ContactAdded => self.acknowledge(&address, &contact_greeting(&user)).await,
            InboundKind::ContactRemoved => {
                info!(address = %address, "{} removed the bot", user.id);
                self.begin_dialog(&address, &user, DELETE_USER_DATA, json!({ "message": "k bye" }))
                    .await
            }
            InboundKind::DeleteUserData => {
                info!(address = %address, "{} asked to delete their data", user.id);
                self.begin_dialog(&address, &user, DELETE_USER_DATA, json!({ "message": "got it" }))
                    .await
            }
        }
    }

    async fn acknowledge(
        &self,
        address: &Address,
        text: &str,
    ) -> Result<TurnOutcome, OrchestratorError> {
        debug!(address = %address, "Answering connector event");
        self.sender.send(address, &Reply::text(text)).await?;
        Ok(TurnOutcome::Acknowledged)
    }

    /// Start a dialog in a conversation without a user message.
    ///
    /// Any suspended dialogs are dropped first. Used by the OAuth callback
    /// to start `AuthorizationCompleted`, and for `DeleteUserData` when the
    /// user removes the bot.
    pub async fn begin_dialog(
        &self,
        address: &Address,
        user: &ChatUser,
        name: &str,
        args: Value,
    ) -> Result<TurnOutcome, OrchestratorError> {
        if !self.engine.has_dialog(name) {
            return Err(DialogError::UnknownDialog(name.to_string()).into());
        }
        info!(address = %address, "Proactively starting {}", name);
        self.locked_turn(address, user, Work::Begin(name, args)).await
    }

    /// Get a reference to the message sender.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Get a reference to the state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Get a reference to the dialog engine.
    pub fn engine(&self) -> &DialogEngine {
        &self.engine
    }

    async fn conversation_lock(&self, address: &Address) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() >= LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(address.key()).or_default().clone()
    }

    async fn locked_turn(
        &self,
        address: &Address,
        user: &ChatUser,
        work: Work<'_>,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let lock = self.conversation_lock(address).await;
        let _guard = lock.lock().await;

        if let Err(e) = self.sender.set_typing(address, true).await {
            warn!("Failed to start typing indicator: {}", e);
        }

        let result = self.execute(address, user, work).await;

        // Always, even on error
        if let Err(e) = self.sender.set_typing(address, false).await {
            warn!("Failed to stop typing indicator: {}", e);
        }

        result
    }

    async fn execute(
        &self,
        address: &Address,
        user: &ChatUser,
        work: Work<'_>,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let now = chrono::Utc::now().timestamp();
        let mut record = self.store.load_conversation(address).await?;
        if record.expire_stale(now, self.engine.config().dialog_ttl_secs) {
            info!(address = %address, "Discarded stale dialog stack");
        }
        let user_data = self.store.load_user(&user_key(address, user)).await?;

        let mut turn = Turn::new(
            address.clone(),
            user.clone(),
            record.clone(),
            user_data.clone(),
            &self.sender,
        );

        let result = match work {
            Work::Message(text) => self.dispatch(&mut turn, text).await,
            Work::Begin(name, args) => {
                self.engine.clear(&mut turn);
                self.engine
                    .start(&mut turn, name, args)
                    .await
                    .map(|()| TurnOutcome::Started(name.to_string()))
            }
        };

        match result {
            Ok(outcome) => {
                debug!(address = %address, "Turn finished: {:?}", outcome);
                self.commit(&mut turn, now).await?;
                Ok(outcome)
            }
            Err(err) => self.recover(turn, record, user_data, err, now).await,
        }
    }

    /// Decide where the input goes.
    async fn dispatch(&self, turn: &mut Turn<'_>, text: &str) -> Result<TurnOutcome, DialogError> {
        let Some(top) = turn.record.top() else {
            return self.route(turn, text, true).await;
        };
        let name = top.name.clone();

        if !self.engine.has_dialog(&name) {
            warn!(address = %turn.address, "Dropping stack with unknown dialog {}", name);
            self.engine.clear(turn);
            return self.route(turn, text, true).await;
        }

        if let Some((index, cancelled)) = self.cancelling_frame(turn, text) {
            info!(address = %turn.address, "Cancelled {} from {}", cancelled, name);
            turn.sender
                .send(&turn.address, &Reply::text("k"))
                .await
                .map_err(|e| DialogError::Send(e.to_string()))?;
            self.engine.cancel_from(turn, index).await?;
            if turn.record.is_idle() {
                self.route(turn, text, false).await?;
            }
            return Ok(TurnOutcome::Cancelled(cancelled));
        }

        if let Some(found) = self.routes.interrupting(text) {
            info!(address = %turn.address, "{} interrupts {}", found.dialog, name);
            self.engine.clear(turn);
            self.engine.start(turn, found.dialog, trigger_args(&found.args)?).await?;
            return Ok(TurnOutcome::Started(found.dialog.to_string()));
        }

        debug!(address = %turn.address, "Continuing {}", name);
        self.engine.resume(turn, text).await?;
        Ok(TurnOutcome::Continued)
    }

    /// The frame nearest the top whose dialog's cancel pattern matches
    /// `text`, with its dialog name. A child started by a cancellable
    /// dialog is cancelled along with it.
    fn cancelling_frame(&self, turn: &Turn<'_>, text: &str) -> Option<(usize, String)> {
        let text = text.trim();
        turn.record
            .dialog_stack
            .iter()
            .enumerate()
            .rev()
            .find(|(_, frame)| {
                self.engine.dialog(&frame.name).is_ok_and(|dialog| {
                    dialog
                        .cancel_pattern()
                        .is_some_and(|pattern| pattern.is_match(text))
                })
            })
            .map(|(index, frame)| (index, frame.name.clone()))
    }

    /// Start the dialog whose trigger matches `text`.
    async fn route(
        &self,
        turn: &mut Turn<'_>,
        text: &str,
        help_on_miss: bool,
    ) -> Result<TurnOutcome, DialogError> {
        match self.routes.route(text, self.recognizer.as_ref()).await? {
            Some(found) => {
                info!(address = %turn.address, "Routing to {}", found.dialog);
                self.engine.start(turn, found.dialog, trigger_args(&found.args)?).await?;
                Ok(TurnOutcome::Started(found.dialog.to_string()))
            }
            None => {
                info!(address = %turn.address, "No trigger matched");
                if help_on_miss {
                    turn.sender
                        .send(&turn.address, &Reply::text(HELP_TEXT))
                        .await
                        .map_err(|e| DialogError::Send(e.to_string()))?;
                }
                Ok(TurnOutcome::Miss)
            }
        }
    }

    async fn commit(&self, turn: &mut Turn<'_>, now: i64) -> Result<(), OrchestratorError> {
        turn.sync_tokens().await;
        turn.record.updated_at = now;
        self.store
            .save_conversation(&turn.address, &turn.record)
            .await?;
        self.store
            .save_user(&user_key(&turn.address, &turn.user), &turn.user_data)
            .await
    }

    /// Handle a failed turn. The turn's changes are discarded.
    async fn recover(
        &self,
        turn: Turn<'_>,
        record: ConversationRecord,
        mut user_data: UserData,
        err: DialogError,
        now: i64,
    ) -> Result<TurnOutcome, OrchestratorError> {
        warn!(address = %turn.address, "Turn failed: {}", err);
        let Turn {
            address,
            user,
            record: failed,
            tokens,
            ..
        } = turn;

        if err.requires_authorization() {
            let resume = failed
                .top()
                .filter(|f| f.name != AUTHORIZE && f.name != AUTHORIZATION_COMPLETED)
                .map(|f| ResumeTarget {
                    dialog: f.name.clone(),
                    args: f.args.clone(),
                });
            info!(
                address = %address,
                "Linked account unusable, restarting authorization"
            );

            let unlinked = UserData::default();
            let mut relink = Turn::new(address.clone(), user.clone(), record, unlinked, &self.sender);
            self.engine.clear(&mut relink);
            let args = json!({ "message": RELINK_TEXT, "resume": resume });
            match self.engine.start(&mut relink, AUTHORIZE, args).await {
                Ok(()) => {
                    self.commit(&mut relink, now).await?;
                    return Ok(TurnOutcome::Reauthorize);
                }
                Err(e) => warn!(address = %address, "Could not restart authorization: {}", e),
            }
        }

        let text = match err {
            DialogError::Spotify(SpotifyError::NoActiveDevice) => NO_DEVICE_TEXT,
            _ => APOLOGY_TEXT,
        };
        self.sender.send(&address, &Reply::text(text)).await?;

        // A token refreshed before the failure is still the current one.
        if let Some(tokens) = tokens.filter(|t| t.was_refreshed()) {
            if let Some(token) = tokens.current().await {
                user_data.spotify_token = Some(token);
                self.store
                    .save_user(&user_key(&address, &user), &user_data)
                    .await?;
            }
        }

        Ok(TurnOutcome::Failed)
    }
}

/// Storage key for user-scoped data.
fn user_key(address: &Address, user: &ChatUser) -> String {
    format!("{}:{}", address.channel, user.id)
}

fn trigger_args(args: &crate::router::TriggerArgs) -> Result<Value, DialogError> {
    serde_json::to_value(args).map_err(|e| DialogError::InvalidArgs(e.to_string()))
}
