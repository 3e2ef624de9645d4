//! Message sender trait and implementations.

use async_trait::async_trait;
use bot_core::{Address, Reply};

use crate::error::OrchestratorError;

/// Trait for sending replies and typing indicators.
///
/// Abstracted to support different transports (bot connector, tests, etc.)
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a reply to a conversation.
    ///
    /// # Arguments
    /// * `address` - Conversation to deliver to
    /// * `reply` - Text, optional card and suggested choices
    async fn send(&self, address: &Address, reply: &Reply) -> Result<(), OrchestratorError>;

    /// Send a plain text reply (convenience wrapper).
    async fn send_text(&self, address: &Address, text: &str) -> Result<(), OrchestratorError> {
        self.send(address, &Reply::text(text)).await
    }

    /// Set typing indicator state.
    ///
    /// # Arguments
    /// * `address` - Conversation to show the indicator in
    /// * `started` - true to start typing, false to stop
    async fn set_typing(&self, address: &Address, started: bool) -> Result<(), OrchestratorError>;
}

/// A no-op message sender for testing that discards all messages.
#[derive(Debug, Clone, Default)]
pub struct NoOpSender;

#[async_trait]
impl MessageSender for NoOpSender {
    async fn send(&self, _address: &Address, _reply: &Reply) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn set_typing(
        &self,
        _address: &Address,
        _started: bool,
    ) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

/// A logging message sender for debugging that logs all operations.
#[derive(Debug, Clone, Default)]
pub struct LoggingSender;

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send(&self, address: &Address, reply: &Reply) -> Result<(), OrchestratorError> {
        tracing::info!("[{}] Sending reply: {}", address, reply.text);
        if let Some(card) = &reply.card {
            tracing::info!("[{}] Card: {} ({})", address, card.title, card.subtitle);
        }
        for (i, choice) in reply.choices.iter().enumerate() {
            tracing::info!("[{}]   {}. {}", address, i + 1, choice);
        }
        Ok(())
    }

    async fn set_typing(&self, address: &Address, started: bool) -> Result<(), OrchestratorError> {
        let state = if started { "started" } else { "stopped" };
        tracing::info!("[{}] Typing {}", address, state);
        Ok(())
    }
}
