//! Application state shared across handlers.

use std::sync::Arc;

use orchestrator::Orchestrator;

use crate::sender::BotSender;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Conversation core.
    pub orchestrator: Arc<Orchestrator<BotSender>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(orchestrator: Orchestrator<BotSender>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}
