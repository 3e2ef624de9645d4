//! HTTP front end for the Spotify chat bot.
//!
//! Receives chat messages from the bot connector, runs them through the
//! orchestrator, and serves the OAuth redirect that links a Spotify account.

mod config;
mod error;
mod routes;
mod sender;
mod state;

use std::sync::Arc;
use std::time::Duration;

use bot_core::Recognizer;
use database::Database;
use orchestrator::{EngineConfig, Orchestrator, Services, StateStore};
use recognizer::{LuisConfig, LuisRecognizer, RuleRecognizer};
use spotify_client::{SpotifyAccounts, SpotifyApi, SpotifyConfig};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::sender::BotSender;
use crate::state::AppState;

/// How often idle conversation state is swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("orchestrator=info,spotify_client=info,bot_server=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = Config::from_env()?;
    let spotify = SpotifyConfig::from_env()?;
    info!(addr = %config.addr, "Starting bot server");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let recognizer: Arc<dyn Recognizer> = match LuisConfig::from_env() {
        Ok(luis) => Arc::new(LuisRecognizer::new(luis)?),
        Err(_) => {
            info!("LUIS_MODEL not set, using built-in rules");
            Arc::new(RuleRecognizer::spotify_defaults()?)
        }
    };

    let services = Services {
        api: Arc::new(SpotifyApi::new(&spotify)?),
        accounts: Arc::new(SpotifyAccounts::new(spotify.clone())?),
        spotify,
    };
    let sender = BotSender::from_url(config.connector_url.as_deref())?;
    if matches!(sender, BotSender::Logging(_)) {
        warn!("BOT_CONNECTOR_URL not set, replies are only logged");
    }

    let orchestrator = Orchestrator::new(
        sender,
        services,
        recognizer,
        StateStore::with_database(db),
        EngineConfig::from_env(),
    )?;

    let state = AppState::new(orchestrator);
    spawn_pruner(state.clone(), config.state_retention);

    // Build router
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    info!(addr = %config.addr, "Bot server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically delete conversations nobody has touched within `retention`.
fn spawn_pruner(state: AppState, retention: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            match state.orchestrator.store().prune_idle(retention).await {
                Ok(0) => {}
                Ok(n) => info!("Pruned {} idle conversations", n),
                Err(e) => warn!("Failed to prune conversation state: {}", e),
            }
        }
    });
}
