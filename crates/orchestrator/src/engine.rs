//! The dialog engine: a stack-based, resumable state machine per
//! conversation.
//!
//! The engine runs steps of the top frame until one suspends on a prompt
//! or the stack empties. All mutation happens on a [`Turn`], which the
//! orchestrator commits only when the whole turn succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use bot_core::{Address, ChatUser};
use serde_json::Value;
use spotify_client::TokenManager;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::dialog::{Dialog, Services, StepContext, StepInput, StepOutcome};
use crate::error::DialogError;
use crate::prompt::{Prompt, MAX_PROMPT_RETRIES};
use crate::sender::MessageSender;
use crate::state::{ConversationRecord, DialogFrame, UserData};

/// Upper bound on step transitions within a single turn.
const MAX_STEPS_PER_TURN: usize = 64;

/// Working copy of one conversation's state for the duration of a turn.
pub struct Turn<'a> {
    pub address: Address,
    pub user: ChatUser,
    pub record: ConversationRecord,
    pub user_data: UserData,
    /// Token manager created on first use, shared by every step of the turn.
    pub tokens: Option<Arc<TokenManager>>,
    pub sender: &'a dyn MessageSender,
}

impl<'a> Turn<'a> {
    pub fn new(
        address: Address,
        user: ChatUser,
        record: ConversationRecord,
        user_data: UserData,
        sender: &'a dyn MessageSender,
    ) -> Self {
        Self {
            address,
            user,
            record,
            user_data,
            tokens: None,
            sender,
        }
    }

    /// Stack depth.
    pub fn depth(&self) -> usize {
        self.record.dialog_stack.len()
    }

    /// Write a token refreshed during the turn back into user data.
    pub async fn sync_tokens(&mut self) {
        if let Some(tokens) = &self.tokens {
            if tokens.was_refreshed() {
                self.user_data.spotify_token = tokens.current().await;
            }
        }
    }
}

/// Registry of dialogs plus the step loop.
pub struct DialogEngine {
    dialogs: HashMap<&'static str, Arc<dyn Dialog>>,
    services: Services,
    config: EngineConfig,
}

impl DialogEngine {
    /// Create an engine with the given dialogs.
    pub fn new(
        dialogs: impl IntoIterator<Item = Arc<dyn Dialog>>,
        services: Services,
        config: EngineConfig,
    ) -> Self {
        let dialogs = dialogs
            .into_iter()
            .map(|dialog| (dialog.name(), dialog))
            .collect();
        Self {
            dialogs,
            services,
            config,
        }
    }

    /// Look up a registered dialog.
    pub fn dialog(&self, name: &str) -> Result<Arc<dyn Dialog>, DialogError> {
        self.dialogs
            .get(name)
            .cloned()
            .ok_or_else(|| DialogError::UnknownDialog(name.to_string()))
    }

    /// Whether a dialog is registered.
    pub fn has_dialog(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Push a new frame for `name` and run its first step with `args`.
    pub async fn start(
        &self,
        turn: &mut Turn<'_>,
        name: &str,
        args: Value,
    ) -> Result<(), DialogError> {
        self.push(turn, name, args.clone())?;
        self.run(turn, StepInput::Args(args)).await
    }

    /// Deliver user input to the suspended top frame.
    ///
    /// Returns `false` without doing anything when no frame is active.
    pub async fn resume(&self, turn: &mut Turn<'_>, text: &str) -> Result<bool, DialogError> {
        let Some(frame) = turn.record.dialog_stack.last_mut() else {
            return Ok(false);
        };

        let answer = match frame.prompt.take() {
            Some(prompt) => match prompt.recognize(text) {
                Some(answer) => Some(answer),
                None if frame.retries < MAX_PROMPT_RETRIES => {
                    frame.retries += 1;
                    debug!(
                        "Unrecognized answer for {} (retry {})",
                        frame.name, frame.retries
                    );
                    let reply = prompt.retry_reply();
                    frame.prompt = Some(prompt);
                    turn.sender
                        .send(&turn.address, &reply)
                        .await
                        .map_err(|e| DialogError::Send(e.to_string()))?;
                    return Ok(true);
                }
                None => None,
            },
            // A frame without a prompt takes the raw text.
            None => Prompt::text("").recognize(text),
        };

        frame.retries = 0;
        frame.step_index += 1;
        self.run(turn, StepInput::Answer(answer)).await?;
        Ok(true)
    }

    /// End the top frame without a result (cancel).
    pub async fn cancel(&self, turn: &mut Turn<'_>) -> Result<(), DialogError> {
        self.end(turn, None).await
    }

    /// Cancel the frame at `index` together with every frame above it.
    ///
    /// The frame below `index`, if any, resumes with no result.
    pub async fn cancel_from(&self, turn: &mut Turn<'_>, index: usize) -> Result<(), DialogError> {
        if index >= turn.depth() {
            return Ok(());
        }
        for frame in turn.record.dialog_stack.drain(index + 1..) {
            info!(address = %turn.address, "Dialog {} cancelled with its parent", frame.name);
        }
        self.end(turn, None).await
    }

    /// End the top frame, resuming its parent with `result`.
    pub async fn end(&self, turn: &mut Turn<'_>, result: Option<Value>) -> Result<(), DialogError> {
        if self.pop(turn, &result) {
            self.run(turn, StepInput::Resumed(result)).await?;
        }
        Ok(())
    }

    /// Replace the top frame with a new dialog.
    pub async fn replace(
        &self,
        turn: &mut Turn<'_>,
        name: &str,
        args: Value,
    ) -> Result<(), DialogError> {
        self.dialog(name)?;
        if let Some(frame) = turn.record.dialog_stack.pop() {
            info!(address = %turn.address, "Replacing {} with {}", frame.name, name);
        }
        self.start(turn, name, args).await
    }

    /// Drop every frame.
    pub fn clear(&self, turn: &mut Turn<'_>) {
        if !turn.record.dialog_stack.is_empty() {
            info!(
                address = %turn.address,
                "Clearing {} suspended dialogs",
                turn.record.dialog_stack.len()
            );
        }
        turn.record.dialog_stack.clear();
    }

    fn push(&self, turn: &mut Turn<'_>, name: &str, args: Value) -> Result<(), DialogError> {
        let dialog = self.dialog(name)?;
        if turn.depth() >= self.config.max_dialog_depth {
            return Err(DialogError::StackOverflow(self.config.max_dialog_depth));
        }
        info!(address = %turn.address, depth = turn.depth() + 1, "Starting dialog {}", dialog.name());
        turn.record
            .dialog_stack
            .push(DialogFrame::new(dialog.name(), args));
        Ok(())
    }

    /// Pop the top frame. Returns whether a parent is now on top, in which
    /// case it has been advanced to its next step.
    fn pop(&self, turn: &mut Turn<'_>, result: &Option<Value>) -> bool {
        let Some(frame) = turn.record.dialog_stack.pop() else {
            return false;
        };
        info!(
            address = %turn.address,
            with_result = result.is_some(),
            "Dialog {} ended",
            frame.name
        );

        match turn.record.dialog_stack.last_mut() {
            Some(parent) => {
                parent.step_index += 1;
                true
            }
            None => false,
        }
    }

    /// Run steps of the top frame until it suspends or the stack empties.
    async fn run(&self, turn: &mut Turn<'_>, mut input: StepInput) -> Result<(), DialogError> {
        for _ in 0..MAX_STEPS_PER_TURN {
            let outcome = {
                let Turn {
                    address,
                    user,
                    record,
                    user_data,
                    tokens,
                    sender,
                } = turn;
                let Some(frame) = record.dialog_stack.last_mut() else {
                    return Ok(());
                };
                let dialog = self.dialog(&frame.name)?;
                let step = frame.step_index;

                if step >= dialog.step_count() {
                    StepOutcome::End(None)
                } else {
                    debug!("Running {} step {}", frame.name, step);
                    let mut ctx = StepContext {
                        address,
                        user,
                        dialog: dialog.name(),
                        args: &frame.args,
                        local: &mut frame.local_state,
                        conversation: &mut record.conversation_state,
                        user_data,
                        services: &self.services,
                        sender: *sender,
                        tokens,
                    };
                    dialog.run_step(step, &mut ctx, input).await?
                }
            };

            input = match outcome {
                StepOutcome::Prompt(prompt) => {
                    let reply = prompt.to_reply();
                    if let Some(frame) = turn.record.dialog_stack.last_mut() {
                        frame.prompt = Some(prompt);
                        frame.retries = 0;
                    }
                    turn.sender
                        .send(&turn.address, &reply)
                        .await
                        .map_err(|e| DialogError::Send(e.to_string()))?;
                    return Ok(());
                }
                StepOutcome::Next(answer) => {
                    if let Some(frame) = turn.record.dialog_stack.last_mut() {
                        frame.step_index += 1;
                    }
                    StepInput::Answer(answer)
                }
                StepOutcome::End(result) => {
                    if !self.pop(turn, &result) {
                        return Ok(());
                    }
                    StepInput::Resumed(result)
                }
                StepOutcome::Begin { dialog, args } => {
                    self.push(turn, &dialog, args.clone())?;
                    StepInput::Args(args)
                }
                StepOutcome::Replace { dialog, args } => {
                    // Validate before popping so a bad name leaves the stack intact.
                    self.dialog(&dialog)?;
                    if let Some(frame) = turn.record.dialog_stack.pop() {
                        info!(address = %turn.address, "Replacing {} with {}", frame.name, dialog);
                    }
                    self.push(turn, &dialog, args.clone())?;
                    StepInput::Args(args)
                }
            };
        }

        Err(DialogError::Runaway(MAX_STEPS_PER_TURN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::prompt::Answer;
    use async_trait::async_trait;
    use bot_core::Reply;
    use mock_spotify::{FakeAccounts, FakeSpotify};
    use serde_json::json;
    use spotify_client::SpotifyConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingSender {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, _address: &Address, reply: &Reply) -> Result<(), OrchestratorError> {
            self.sent.lock().unwrap().push(reply.text.clone());
            Ok(())
        }

        async fn set_typing(&self, _address: &Address, _started: bool) -> Result<(), OrchestratorError> {
            Ok(())
        }
    }

    /// Asks for a name and returns it.
    struct Ask;

    #[async_trait]
    impl Dialog for Ask {
        fn name(&self) -> &'static str {
            "Ask"
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
                return Ok(StepOutcome::Prompt(Prompt::text("name?")));
            }
            let name = input.answer().and_then(Answer::as_text).unwrap_or_default().to_string();
            ctx.say(format!("hi {}", name)).await?;
            Ok(StepOutcome::End(Some(json!({ "name": name }))))
        }
    }

    /// Starts `Ask` and reports its result.
    struct Parent;

    #[async_trait]
    impl Dialog for Parent {
        fn name(&self) -> &'static str {
            "Parent"
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
                return Ok(StepOutcome::begin("Ask", json!({})));
            }
            let name = input
                .result()
                .and_then(|r| r["name"].as_str())
                .unwrap_or("nothing")
                .to_string();
            ctx.say(format!("got {}", name)).await?;
            Ok(StepOutcome::done())
        }
    }

    /// Asks a yes/no question.
    struct Sure;

    #[async_trait]
    impl Dialog for Sure {
        fn name(&self) -> &'static str {
            "Sure"
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
                return Ok(StepOutcome::Prompt(Prompt::confirm("sure?")));
            }
            match input.answer() {
                Some(answer) if answer.is_yes() => ctx.say("yes").await?,
                Some(_) => ctx.say("no").await?,
                None => ctx.say("declined").await?,
            }
            Ok(StepOutcome::done())
        }
    }

    /// Replaces itself forever.
    struct Spin;

    #[async_trait]
    impl Dialog for Spin {
        fn name(&self) -> &'static str {
            "Spin"
        }

        fn step_count(&self) -> usize {
            1
        }

        async fn run_step(
            &self,
            _step: usize,
            _ctx: &mut StepContext<'_>,
            _input: StepInput,
        ) -> Result<StepOutcome, DialogError> {
            Ok(StepOutcome::replace("Spin", Value::Null))
        }
    }

    /// Begins itself forever.
    struct Deep;

    #[async_trait]
    impl Dialog for Deep {
        fn name(&self) -> &'static str {
            "Deep"
        }

        fn step_count(&self) -> usize {
            1
        }

        async fn run_step(
            &self,
            _step: usize,
            _ctx: &mut StepContext<'_>,
            _input: StepInput,
        ) -> Result<StepOutcome, DialogError> {
            Ok(StepOutcome::begin("Deep", Value::Null))
        }
    }

    fn engine(max_dialog_depth: usize) -> DialogEngine {
        let dialogs: Vec<Arc<dyn Dialog>> = vec![
            Arc::new(Ask),
            Arc::new(Parent),
            Arc::new(Sure),
            Arc::new(Spin),
            Arc::new(Deep),
        ];
        let services = Services {
            api: Arc::new(FakeSpotify::new()),
            accounts: Arc::new(FakeAccounts::new()),
            spotify: SpotifyConfig::new("client", "secret", "http://localhost/callback"),
        };
        let config = EngineConfig {
            max_dialog_depth,
            ..EngineConfig::default()
        };
        DialogEngine::new(dialogs, services, config)
    }

    fn turn(sender: &RecordingSender) -> Turn<'_> {
        Turn::new(
            Address::new("direct", "alice"),
            ChatUser::named("alice", "Alice"),
            ConversationRecord::default(),
            UserData::default(),
            sender,
        )
    }

    #[tokio::test]
    async fn test_child_result_resumes_parent_next_step() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Parent", Value::Null).await.unwrap();
        assert_eq!(turn.depth(), 2);
        assert_eq!(sender.texts(), vec!["name?"]);

        assert!(engine.resume(&mut turn, "bob").await.unwrap());
        assert_eq!(sender.texts(), vec!["name?", "hi bob", "got bob"]);
        assert!(turn.record.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_resumes_parent_without_result() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Parent", Value::Null).await.unwrap();
        engine.cancel(&mut turn).await.unwrap();

        assert_eq!(sender.texts(), vec!["name?", "got nothing"]);
        assert_eq!(turn.depth(), 0);
    }

    #[tokio::test]
    async fn test_cancel_from_drops_frames_above() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Parent", Value::Null).await.unwrap();
        engine.start(&mut turn, "Sure", Value::Null).await.unwrap();
        assert_eq!(turn.depth(), 3);

        // Cancelling "Ask" also drops "Sure"; "Parent" resumes with nothing.
        engine.cancel_from(&mut turn, 1).await.unwrap();
        assert_eq!(sender.texts(), vec!["name?", "sure?", "got nothing"]);
        assert!(turn.record.is_idle());

        engine.cancel_from(&mut turn, 5).await.unwrap();
        assert_eq!(sender.texts().len(), 3);
    }

    #[tokio::test]
    async fn test_resume_without_frame_is_noop() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        assert!(!engine.resume(&mut turn, "hello").await.unwrap());
        engine.cancel(&mut turn).await.unwrap();
        engine.end(&mut turn, Some(json!(1))).await.unwrap();

        assert_eq!(turn.depth(), 0);
        assert!(sender.texts().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_answers_are_reprompted_then_declined() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Sure", Value::Null).await.unwrap();
        engine.resume(&mut turn, "banana").await.unwrap();
        engine.resume(&mut turn, "banana").await.unwrap();
        assert_eq!(turn.depth(), 1);
        assert_eq!(turn.record.top().unwrap().retries, 2);

        engine.resume(&mut turn, "banana").await.unwrap();
        assert_eq!(
            sender.texts(),
            vec!["sure?", "yes or no?", "yes or no?", "declined"]
        );
        assert!(turn.record.is_idle());
    }

    #[tokio::test]
    async fn test_prompt_survives_serialization() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Sure", Value::Null).await.unwrap();
        let raw = serde_json::to_string(&turn.record).unwrap();
        turn.record = serde_json::from_str(&raw).unwrap();

        engine.resume(&mut turn, "yep").await.unwrap();
        assert_eq!(sender.texts().last().unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_runaway_dialog_is_stopped() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        let err = engine.start(&mut turn, "Spin", Value::Null).await.unwrap_err();
        assert!(matches!(err, DialogError::Runaway(MAX_STEPS_PER_TURN)));
        assert_eq!(turn.depth(), 1);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let engine = engine(3);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        let err = engine.start(&mut turn, "Deep", Value::Null).await.unwrap_err();
        assert!(matches!(err, DialogError::StackOverflow(3)));
        assert_eq!(turn.depth(), 3);
    }

    #[tokio::test]
    async fn test_unknown_dialog() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Parent", Value::Null).await.unwrap();
        let err = engine.replace(&mut turn, "Nope", Value::Null).await;
        assert!(matches!(err, Err(DialogError::UnknownDialog(name)) if name == "Nope"));
        assert!(!engine.has_dialog("Nope"));
        assert_eq!(turn.record.top().unwrap().name, "Ask");
    }

    #[tokio::test]
    async fn test_replace_keeps_depth() {
        let engine = engine(8);
        let sender = RecordingSender::default();
        let mut turn = turn(&sender);

        engine.start(&mut turn, "Sure", Value::Null).await.unwrap();
        engine.replace(&mut turn, "Ask", Value::Null).await.unwrap();

        assert_eq!(turn.depth(), 1);
        assert_eq!(turn.record.top().unwrap().name, "Ask");
    }
}
