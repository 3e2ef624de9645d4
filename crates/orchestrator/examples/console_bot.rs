//! Chat with the bot in a terminal against an in-memory Spotify.
//!
//! Run with: cargo run -p orchestrator --example console_bot
//!
//! The authorization link is "clicked" automatically: when the bot sends
//! one, the example plays the OAuth callback for it.
//!
//! Try:
//!   - "play yellow"
//!   - "devices"
//!   - "add this to playlist"
//!   - "repeat", "volume 30", "seek 1:00"
//!   - "reset"

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mock_spotify::{device, playlist, track, FakeAccounts, FakeSpotify};
use orchestrator::dialogs::AUTHORIZATION_COMPLETED;
use orchestrator::{
    Address, AuthState, EngineConfig, InboundMessage, MessageSender, Orchestrator,
    OrchestratorError, Reply, Services, StateStore,
};
use recognizer::RuleRecognizer;
use spotify_client::SpotifyConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints replies and remembers the last authorization state it saw.
#[derive(Default)]
struct ConsoleSender {
    pending_state: Mutex<Option<String>>,
}

impl ConsoleSender {
    fn take_state(&self) -> Option<String> {
        self.pending_state.lock().ok()?.take()
    }
}

#[async_trait]
impl MessageSender for ConsoleSender {
    async fn send(&self, _address: &Address, reply: &Reply) -> Result<(), OrchestratorError> {
        if !reply.text.is_empty() {
            println!("bot> {}", reply.text);
        }
        if let Some(card) = &reply.card {
            println!("bot> [{} | {}]", card.title, card.subtitle);
        }
        for (i, choice) in reply.choices.iter().enumerate() {
            println!("       {}. {}", i + 1, choice);
        }

        if let Some(start) = reply.text.find("state=") {
            let raw = reply.text[start + "state=".len()..].trim_end_matches(") to authorize me");
            if let (Ok(decoded), Ok(mut pending)) =
                (urlencoding::decode(raw), self.pending_state.lock())
            {
                *pending = Some(decoded.into_owned());
            }
        }
        Ok(())
    }

    async fn set_typing(&self, _address: &Address, _started: bool) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

fn demo_spotify() -> FakeSpotify {
    FakeSpotify::new()
        .with_tracks([
            track("1", "Yellow", "Coldplay"),
            track("2", "Yellow", "Boyce Avenue"),
            track("3", "Shape of You", "Ed Sheeran"),
            track("4", "Clocks", "Coldplay"),
        ])
        .with_device(device("d1", "Computer", "Laptop"))
        .with_device(device("d2", "Smartphone", "Phone"))
        .with_playlist(playlist("p1", "road trip", "user-1"), Vec::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orchestrator=warn".parse()?),
        )
        .init();

    let services = Services {
        api: Arc::new(demo_spotify()),
        accounts: Arc::new(FakeAccounts::new()),
        spotify: SpotifyConfig::new("demo", "demo", "http://localhost:3978/spotify/authorized"),
    };
    let orchestrator = Orchestrator::new(
        ConsoleSender::default(),
        services,
        Arc::new(RuleRecognizer::spotify_defaults()?),
        StateStore::new(),
        EngineConfig::default(),
    )?;

    println!("Talk to the bot. Ctrl+D to quit.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message = InboundMessage::direct("console", line, 0);
        orchestrator.process(message).await?;

        if let Some(raw) = orchestrator.sender().take_state() {
            let state = AuthState::decode(&raw)?;
            println!("(authorizing...)");
            orchestrator
                .begin_dialog(
                    &state.address,
                    &state.user,
                    AUTHORIZATION_COMPLETED,
                    state.completion_args("demo-code"),
                )
                .await?;
        }
    }

    Ok(())
}
