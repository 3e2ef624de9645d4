//! Route handlers for the bot server.

pub mod health;
pub mod messages;
pub mod oauth;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        // Bot connector webhook
        .route("/api/messages", post(messages::receive))
        // OAuth redirect target
        .route("/spotify/authorized", get(oauth::authorized))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use mock_spotify::{FakeAccounts, FakeSpotify};
    use orchestrator::{EngineConfig, LoggingSender, Orchestrator, Services, StateStore};
    use recognizer::RuleRecognizer;
    use spotify_client::SpotifyConfig;

    use crate::sender::BotSender;
    use crate::state::AppState;

    /// State backed by the in-memory fakes, logging replies.
    pub fn app_state() -> AppState {
        let services = Services {
            api: Arc::new(FakeSpotify::new()),
            accounts: Arc::new(FakeAccounts::new()),
            spotify: SpotifyConfig::new(
                "client-id",
                "secret",
                "http://127.0.0.1:3978/spotify/authorized",
            ),
        };
        let orchestrator = Orchestrator::new(
            BotSender::Logging(LoggingSender),
            services,
            Arc::new(RuleRecognizer::spotify_defaults().unwrap()),
            StateStore::new(),
            EngineConfig::default(),
        )
        .unwrap();
        AppState::new(orchestrator)
    }
}
