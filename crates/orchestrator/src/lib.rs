//! Conversation core for the Spotify chat bot.
//!
//! This crate provides the [`Orchestrator`] type, which turns inbound chat
//! messages into dialog steps, and the pieces it is built from:
//!
//! - [`DialogEngine`] - Stack-based, resumable multi-step dialogs
//! - [`RoutingTable`] - Immutable intent and pattern triggers
//! - [`StateStore`] - Conversation and user state, optionally in SQLite
//! - [`MessageSender`] - Outbound replies and typing indicators
//! - [`AuthState`] - The OAuth `state` token that resumes a dialog after linking
//!
//! # Features
//!
//! - Multi-turn flows: prompts suspend a dialog until the user answers
//! - Sub-dialogs return results to the dialog that started them
//! - Dialogs that need a linked account hand off to `Authorize` and resume
//!   with their original arguments once the account is linked
//! - State is committed only when a turn succeeds
//! - Maintains typing indicators throughout processing
//!
//! # Architecture
//!
//! ```text
//! Chat message (from bot-server)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Lock conversation, start typing indicator               │
//! │         ↓                                                   │
//! │  2. Load dialog stack + conversation data + user data       │
//! │         ↓                                                   │
//! │  3. Dispatch:                                               │
//! │     • cancel pattern  → end the suspended dialog            │
//! │     • interrupting trigger → clear stack, start dialog      │
//! │     • suspended dialog → deliver the answer                 │
//! │     • otherwise → route (patterns, recognizer) and start    │
//! │         ↓                                                   │
//! │  4. Engine runs steps until a prompt or an empty stack      │
//! │     (steps call spotify-client through PlaybackClient)      │
//! │         ↓                                                   │
//! │  5. Commit state, or apologize / re-authorize and discard   │
//! │         ↓                                                   │
//! │  6. Stop typing indicator                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orchestrator::{EngineConfig, LoggingSender, Orchestrator, Services, StateStore};
//! use recognizer::RuleRecognizer;
//! use spotify_client::{SpotifyAccounts, SpotifyApi, SpotifyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spotify = SpotifyConfig::from_env()?;
//!     let services = Services {
//!         api: Arc::new(SpotifyApi::new(&spotify)?),
//!         accounts: Arc::new(SpotifyAccounts::new(spotify.clone())?),
//!         spotify,
//!     };
//!
//!     let orchestrator = Orchestrator::new(
//!         LoggingSender,
//!         services,
//!         Arc::new(RuleRecognizer::spotify_defaults()?),
//!         StateStore::new(),
//!         EngineConfig::from_env(),
//!     )?;
//!
//!     let message = bot_core::InboundMessage::direct("alice", "play shape of you", 0);
//!     let outcome = orchestrator.process(message).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

mod auth;
mod config;
mod dialog;
pub mod dialogs;
mod engine;
mod error;
mod formatting;
mod orchestrator;
mod prompt;
mod router;
mod sender;
mod state;
mod store;

// Public exports
pub use auth::AuthState;
pub use config::{EngineConfig, DEFAULT_DIALOG_TTL_SECS, DEFAULT_MAX_DIALOG_DEPTH};
pub use dialog::{Dialog, Services, StepContext, StepInput, StepOutcome, AUTHORIZE};
pub use engine::{DialogEngine, Turn};
pub use error::{AuthStateError, DialogError, OrchestratorError};
pub use formatting::{track_card, APOLOGY_TEXT, HELP_TEXT, NO_DEVICE_TEXT, RELINK_TEXT};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use prompt::{Answer, Prompt, MAX_PROMPT_RETRIES};
pub use router::{RouteMatch, RoutingTable, RoutingTableBuilder, Trigger, TriggerArgs, TriggerMatcher};
pub use sender::{LoggingSender, MessageSender, NoOpSender};
pub use state::{ConversationData, ConversationRecord, DialogFrame, PlaylistRef, UserData};
pub use store::StateStore;

// Re-export commonly used types from dependencies
pub use bot_core::{Address, ChatUser, InboundKind, InboundMessage, Reply};
