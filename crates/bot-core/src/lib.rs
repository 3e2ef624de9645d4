//! Core types for the Spotify chat bot.
//!
//! This crate provides the shared interface between the chat transport, the
//! intent recognizer and the conversation core. It defines:
//!
//! - [`Address`] / [`ChatUser`] - Who a message belongs to
//! - [`InboundMessage`] / [`Reply`] - Message types for input/output
//! - [`InboundKind`] - Connector events carried by an inbound message
//! - [`IntentResult`] / [`Entity`] - Output of an intent recognizer
//! - [`Recognizer`] - The trait every recognizer implements
//! - [`RecognizerError`] - Error types for recognition
//!
//! # Example
//!
//! ```rust
//! use bot_core::{async_trait, IntentResult, Recognizer, RecognizerError};
//!
//! struct AlwaysGreet;
//!
//! #[async_trait]
//! impl Recognizer for AlwaysGreet {
//!     async fn recognize(&self, _text: &str) -> Result<Option<IntentResult>, RecognizerError> {
//!         Ok(Some(IntentResult::new("Greeting")))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "AlwaysGreet"
//!     }
//! }
//! ```

mod error;
mod intent;
mod message;
mod recognizer;

pub use error::RecognizerError;
pub use intent::{Entity, EntitySpan, IntentResult};
pub use message::{Address, ChatUser, InboundKind, InboundMessage, Reply, TrackCard};
pub use recognizer::{NoIntentRecognizer, Recognizer};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
