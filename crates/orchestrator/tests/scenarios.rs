//! End-to-end conversations against the in-memory Spotify fakes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use database::{conversation_state, Database};
use mock_spotify::{device, playlist, track, FakeAccounts, FakeSpotify};
use orchestrator::{
    Address, AuthState, ChatUser, EngineConfig, InboundKind, InboundMessage, MessageSender,
    Orchestrator, OrchestratorError, Reply, Services, StateStore, TurnOutcome, APOLOGY_TEXT,
    HELP_TEXT, NO_DEVICE_TEXT, RELINK_TEXT,
};
use recognizer::RuleRecognizer;
use serde_json::json;
use spotify_client::{RepeatState, SpotifyConfig};

#[derive(Default)]
struct Recorder {
    replies: Mutex<Vec<Reply>>,
}

impl Recorder {
    fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.replies().into_iter().map(|r| r.text).collect()
    }

    fn last(&self) -> Reply {
        self.replies().last().cloned().expect("no replies")
    }

    fn clear(&self) {
        self.replies.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageSender for Recorder {
    async fn send(&self, _address: &Address, reply: &Reply) -> Result<(), OrchestratorError> {
        self.replies.lock().unwrap().push(reply.clone());
        Ok(())
    }

    async fn set_typing(&self, _address: &Address, _started: bool) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

struct Harness {
    bot: Orchestrator<Recorder>,
    spotify: Arc<FakeSpotify>,
    accounts: Arc<FakeAccounts>,
}

impl Harness {
    fn new(spotify: FakeSpotify) -> Self {
        Self::with(spotify, FakeAccounts::new(), StateStore::new())
    }

    fn with(spotify: FakeSpotify, accounts: FakeAccounts, store: StateStore) -> Self {
        let spotify = Arc::new(spotify);
        let accounts = Arc::new(accounts);
        let services = Services {
            api: spotify.clone(),
            accounts: accounts.clone(),
            spotify: SpotifyConfig::new(
                "client-id",
                "secret",
                "https://bot.example/spotify/authorized",
            ),
        };
        let bot = Orchestrator::new(
            Recorder::default(),
            services,
            Arc::new(RuleRecognizer::spotify_defaults().unwrap()),
            store,
            EngineConfig::default(),
        )
        .unwrap();

        Self {
            bot,
            spotify,
            accounts,
        }
    }

    fn address() -> Address {
        Address::new("direct", "alice")
    }

    fn user() -> ChatUser {
        ChatUser::named("alice", "Alice")
    }

    async fn say(&self, text: &str) -> TurnOutcome {
        let message = InboundMessage::new(Self::address(), Self::user(), text, 0);
        self.bot.process(message).await.unwrap()
    }

    async fn event(&self, kind: InboundKind) -> TurnOutcome {
        let message = InboundMessage::event(Self::address(), Self::user(), kind, 0);
        self.bot.process(message).await.unwrap()
    }

    /// Complete the OAuth flow without a dialog to resume.
    async fn link(&self) {
        let outcome = self
            .bot
            .begin_dialog(
                &Self::address(),
                &Self::user(),
                "AuthorizationCompleted",
                json!({ "code": "code-1" }),
            )
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Started("AuthorizationCompleted".to_string()));
        assert_eq!(self.recorder().texts(), vec!["thanks!", "all set!"]);
        self.recorder().clear();
    }

    fn recorder(&self) -> &Recorder {
        self.bot.sender()
    }

    async fn top_dialog(&self) -> Option<String> {
        self.bot
            .store()
            .load_conversation(&Self::address())
            .await
            .unwrap()
            .top()
            .map(|f| f.name.clone())
    }
}

/// The `state` query parameter of the authorization link in `text`.
fn state_from_link(text: &str) -> AuthState {
    let start = text.find("state=").expect("no state in link") + "state=".len();
    let end = text[start..].find(')').map_or(text.len(), |i| start + i);
    let raw = urlencoding::decode(&text[start..end]).unwrap();
    AuthState::decode(&raw).unwrap()
}

#[tokio::test]
async fn test_play_request_resumes_after_authorization() {
    let h = Harness::new(FakeSpotify::new().with_track(track("1", "Shape of You", "Ed Sheeran")));

    let outcome = h.say("play shape of you").await;
    assert_eq!(outcome, TurnOutcome::Started("PlayMusic".to_string()));
    let question = h.recorder().last();
    assert_eq!(question.text, "okay before I do that, do you have a spotify account?");
    assert_eq!(question.choices, vec!["yes", "no"]);
    assert_eq!(h.top_dialog().await.as_deref(), Some("Authorize"));
    assert!(h.spotify.calls().is_empty());

    assert_eq!(h.say("yes").await, TurnOutcome::Continued);
    let link = h.recorder().last().text;
    assert!(link.starts_with(
        "good, [click here](https://accounts.spotify.com/authorize?client_id=client-id"
    ));
    assert!(h.top_dialog().await.is_none());

    let state = state_from_link(&link);
    assert_eq!(state.address, Harness::address());
    assert_eq!(state.resume_dialog.as_deref(), Some("PlayMusic"));
    assert_eq!(state.resume_args["text"], "play shape of you");

    h.recorder().clear();
    h.bot
        .begin_dialog(
            &state.address,
            &state.user,
            "AuthorizationCompleted",
            state.completion_args("code-123"),
        )
        .await
        .unwrap();

    assert_eq!(h.accounts.exchange_count(), 1);
    assert_eq!(
        h.spotify.last_played().unwrap().track_uri(),
        Some("spotify:track:1")
    );
    let texts = h.recorder().texts();
    assert_eq!(texts[0], "thanks!");
    assert!(texts.contains(&"looking for your music...".to_string()));
    let card = h.recorder().last().card.unwrap();
    assert_eq!(card.title, "Ed Sheeran - Shape of You");

    let user = h.bot.store().load_user("direct:alice").await.unwrap();
    assert!(user.is_linked());
    assert_eq!(user.spotify_user.unwrap().id, "user-1");
}

#[tokio::test]
async fn test_declining_authorization() {
    let h = Harness::new(FakeSpotify::new());

    h.say("what's playing").await;
    assert_eq!(
        h.recorder().last().text,
        "do you want me to use your spotify account to play music?"
    );
    h.say("nope").await;
    assert_eq!(h.recorder().last().text, "k nvm");
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_rejected_code() {
    let accounts = FakeAccounts::new();
    accounts.reject_codes();
    let h = Harness::with(FakeSpotify::new(), accounts, StateStore::new());

    h.bot
        .begin_dialog(
            &Harness::address(),
            &Harness::user(),
            "AuthorizationCompleted",
            json!({ "code": "bad", "resume_dialog": "SongQuery" }),
        )
        .await
        .unwrap();

    assert_eq!(h.recorder().texts(), vec!["cannot authorize bot :("]);
    assert!(!h.bot.store().load_user("direct:alice").await.unwrap().is_linked());
}

#[tokio::test]
async fn test_other_versions_are_offered() {
    let h = Harness::new(FakeSpotify::new().with_tracks([
        track("1", "Yellow", "Coldplay"),
        track("2", "Yellow", "Boyce Avenue"),
        track("3", "Yellow", "Jules Larson"),
    ]));
    h.link().await;

    h.say("play yellow").await;
    assert_eq!(
        h.spotify.last_played().unwrap().track_uri(),
        Some("spotify:track:1")
    );
    let offer = h.recorder().last();
    assert_eq!(offer.text, "found other versions too...");
    assert_eq!(offer.choices, vec!["Boyce Avenue - Yellow", "Jules Larson - Yellow"]);

    assert_eq!(h.say("jules larson - yellow").await, TurnOutcome::Continued);
    assert_eq!(
        h.spotify.last_played().unwrap().track_uri(),
        Some("spotify:track:3")
    );
    assert_eq!(h.recorder().last().text, "(y)");
    assert_eq!(h.spotify.call_count("search_tracks"), 1);
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_named_artist_skips_disambiguation() {
    let h = Harness::new(FakeSpotify::new().with_tracks([
        track("1", "Yellow", "Coldplay"),
        track("2", "Yellow", "Boyce Avenue"),
    ]));
    h.link().await;

    h.say("play yellow by boyce avenue").await;
    assert_eq!(
        h.spotify.last_played().unwrap().track_uri(),
        Some("spotify:track:2")
    );
    assert!(h.recorder().last().choices.is_empty());
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_no_music_found() {
    let h = Harness::new(FakeSpotify::new());
    h.link().await;

    h.say("play something obscure").await;
    assert_eq!(h.recorder().last().text, "no music found, sorry.");
    assert!(h.spotify.played().is_empty());
}

#[tokio::test]
async fn test_repeat_cycles_back_to_off() {
    let h = Harness::new(FakeSpotify::new().with_track(track("1", "Yellow", "Coldplay")));
    h.link().await;
    h.say("play yellow").await;

    h.say("repeat").await;
    assert_eq!(h.spotify.repeat(), RepeatState::Track);
    h.say("repeat").await;
    assert_eq!(h.spotify.repeat(), RepeatState::Context);
    h.say("repeat").await;
    assert_eq!(h.spotify.repeat(), RepeatState::Off);
    assert_eq!(h.recorder().last().text, "repeat is now **off**");
}

#[tokio::test]
async fn test_transport_commands() {
    let h = Harness::new(FakeSpotify::new().with_track(track("1", "Yellow", "Coldplay")));
    h.link().await;
    h.say("play yellow").await;

    h.say("pause").await;
    assert!(!h.spotify.is_playing());
    assert_eq!(h.recorder().last().text, "okay");

    h.say("volume 40").await;
    assert_eq!(h.spotify.volume(), 40);
    assert_eq!(h.recorder().last().text, "volume set to **40%**");

    h.say("seek 1:30").await;
    assert_eq!(h.spotify.progress_ms(), 90_000);
    assert_eq!(h.recorder().last().text, "seeked to 1:30");
}

#[tokio::test]
async fn test_device_selection_plays_pending_track() {
    let spotify = FakeSpotify::new()
        .with_track(track("1", "Yellow", "Coldplay"))
        .with_device(device("d1", "Computer", "Laptop"))
        .with_device(device("d2", "Smartphone", "Phone"));
    spotify.set_no_active_device(true);
    let h = Harness::new(spotify);
    h.link().await;

    h.say("play yellow").await;
    let picker = h.recorder().last();
    assert_eq!(picker.text, "which of these devices you want me use?");
    assert_eq!(picker.choices, vec!["Computer - Laptop", "Smartphone - Phone"]);
    assert_eq!(h.top_dialog().await.as_deref(), Some("SelectDevice"));

    h.say("phone").await;
    assert!(h.recorder().texts().contains(&"got it (y)".to_string()));
    assert_eq!(h.spotify.active_device().as_deref(), Some("d2"));
    let played = h.spotify.last_played().unwrap();
    assert_eq!(played.track_uri(), Some("spotify:track:1"));
    assert_eq!(played.device_id.as_deref(), Some("d2"));

    h.say("pause").await;
    assert_eq!(h.recorder().last().text, "okay");
}

#[tokio::test]
async fn test_declined_device_choice() {
    let h = Harness::new(FakeSpotify::new().with_device(device("d1", "Computer", "Laptop")));
    h.link().await;

    h.say("show devices").await;
    h.say("no idea").await;
    h.say("still no idea").await;
    h.say("whatever").await;

    let texts = h.recorder().texts();
    assert_eq!(texts.last().unwrap(), "no problem - going to use active device then ;)");
    assert_eq!(
        texts.iter().filter(|t| *t == "please pick one of these :)").count(),
        2
    );
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_no_devices() {
    let h = Harness::new(FakeSpotify::new());
    h.link().await;

    h.say("devices").await;
    assert_eq!(
        h.recorder().last().text,
        "no devices found. open spotify and try again :)"
    );
}

#[tokio::test]
async fn test_no_active_device_is_explained() {
    let spotify = FakeSpotify::new();
    spotify.set_no_active_device(true);
    let h = Harness::new(spotify);
    h.link().await;

    assert_eq!(h.say("pause").await, TurnOutcome::Failed);
    assert_eq!(h.recorder().last().text, NO_DEVICE_TEXT);
}

#[tokio::test]
async fn test_failed_step_keeps_frame_for_retry() {
    let h = Harness::new(
        FakeSpotify::new()
            .with_device(device("d1", "Computer", "Laptop"))
            .with_device(device("d2", "Speaker", "Kitchen")),
    );
    h.link().await;

    h.say("devices").await;
    h.spotify.fail_next(500);
    assert_eq!(h.say("1").await, TurnOutcome::Failed);
    assert_eq!(h.recorder().last().text, APOLOGY_TEXT);

    let record = h
        .bot
        .store()
        .load_conversation(&Harness::address())
        .await
        .unwrap();
    assert_eq!(record.top().unwrap().name, "SelectDevice");
    assert_eq!(record.top().unwrap().step_index, 0);
    assert!(record.conversation_state.device.is_none());

    assert_eq!(h.say("1").await, TurnOutcome::Continued);
    assert_eq!(h.spotify.active_device().as_deref(), Some("d1"));
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_revoked_refresh_restarts_authorization() {
    let h = Harness::with(
        FakeSpotify::new(),
        FakeAccounts::new().with_expires_in(-10),
        StateStore::new(),
    );
    h.link().await;
    h.accounts.reject_refresh();

    assert_eq!(h.say("pause").await, TurnOutcome::Reauthorize);
    let question = h.recorder().last();
    assert_eq!(question.text, RELINK_TEXT);
    assert_eq!(question.choices, vec!["yes", "no"]);
    assert!(!h.bot.store().load_user("direct:alice").await.unwrap().is_linked());
    assert_eq!(h.top_dialog().await.as_deref(), Some("Authorize"));

    h.say("yes").await;
    let state = state_from_link(&h.recorder().last().text);
    assert_eq!(state.resume_dialog.as_deref(), Some("Playback"));
    assert_eq!(state.resume_args["text"], "pause");
}

#[tokio::test]
async fn test_refreshed_token_is_persisted() {
    let h = Harness::with(
        FakeSpotify::new().with_track(track("1", "Yellow", "Coldplay")),
        FakeAccounts::new().with_expires_in(-10),
        StateStore::new(),
    );
    h.link().await;
    let refreshes = h.accounts.refresh_count();

    h.say("what's playing").await;
    assert_eq!(h.recorder().last().text, "nothing is playing");
    assert_eq!(h.accounts.refresh_count(), refreshes + 1);

    let token = h
        .bot
        .store()
        .load_user("direct:alice")
        .await
        .unwrap()
        .spotify_token
        .unwrap();
    assert!(token.access_token.starts_with("access-refreshed-"));
    assert_eq!(token.refresh_token, "refresh-1");
}

#[tokio::test]
async fn test_cancel_pattern_ends_dialog() {
    let h = Harness::new(
        FakeSpotify::new().with_playlist(playlist("p1", "road trip", "user-1"), Vec::new()),
    );
    h.link().await;

    h.say("show my playlists").await;
    assert_eq!(h.recorder().last().choices, vec!["road trip", "create new playlist"]);
    assert_eq!(h.top_dialog().await.as_deref(), Some("SetupPlaylist"));

    assert_eq!(
        h.say("nvm").await,
        TurnOutcome::Cancelled("SetupPlaylist".to_string())
    );
    assert_eq!(h.recorder().last().text, "k");
    assert!(!h.recorder().texts().contains(&HELP_TEXT.to_string()));
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_cancel_during_playlist_creation() {
    let h = Harness::new(
        FakeSpotify::new().with_playlist(playlist("p1", "road trip", "user-1"), Vec::new()),
    );
    h.link().await;

    h.say("show my playlists").await;
    h.say("create new playlist").await;
    assert_eq!(h.recorder().last().text, "what's the name of your playlist?");
    assert_eq!(h.top_dialog().await.as_deref(), Some("CreatePlaylist"));

    assert_eq!(
        h.say("cancel").await,
        TurnOutcome::Cancelled("SetupPlaylist".to_string())
    );
    assert_eq!(h.recorder().last().text, "k");
    assert!(h.top_dialog().await.is_none());

    let names: Vec<String> = h
        .spotify
        .playlists_snapshot()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["road trip"]);
}

#[tokio::test]
async fn test_playlist_created_from_choice_is_added_to() {
    let h = Harness::new(
        FakeSpotify::new()
            .with_track(track("1", "Yellow", "Coldplay"))
            .with_playlist(playlist("p1", "road trip", "user-1"), Vec::new()),
    );
    h.link().await;
    h.say("play yellow").await;

    h.say("add this to playlist").await;
    h.say("create new playlist").await;
    assert_eq!(h.say("mixtape").await, TurnOutcome::Continued);

    let texts = h.recorder().texts();
    assert!(texts.contains(&"playlist created (y)".to_string()));
    assert_eq!(
        h.recorder().last().text,
        "added **Coldplay - Yellow** to **mixtape**"
    );
    assert!(h.top_dialog().await.is_none());
}

#[tokio::test]
async fn test_add_to_playlist_is_idempotent() {
    let h = Harness::new(
        FakeSpotify::new()
            .with_track(track("1", "Yellow", "Coldplay"))
            .with_playlist(playlist("p1", "road trip", "user-1"), Vec::new())
            .with_playlist(playlist("p2", "someone else's", "user-2"), Vec::new()),
    );
    h.link().await;
    h.say("play yellow").await;

    h.say("add this to playlist").await;
    assert_eq!(h.recorder().last().choices, vec!["road trip", "create new playlist"]);
    h.say("road trip").await;
    let texts = h.recorder().texts();
    assert!(texts.contains(&"playlist set (y)".to_string()));
    assert_eq!(texts.last().unwrap(), "added **Coldplay - Yellow** to **road trip**");

    h.say("add this to playlist").await;
    assert_eq!(
        h.recorder().last().text,
        "**Coldplay - Yellow** is already in **road trip**"
    );
    assert_eq!(h.spotify.playlist_uris("p1"), vec!["spotify:track:1"]);
}

#[tokio::test]
async fn test_create_playlist_prompts_for_name() {
    let h = Harness::new(FakeSpotify::new());
    h.link().await;

    h.say("create a playlist").await;
    assert_eq!(h.recorder().last().text, "what's the name of your playlist?");
    h.say("Sunday Morning").await;

    assert_eq!(h.recorder().last().text, "playlist created (y)");
    let created = h.spotify.playlists_snapshot();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "Sunday Morning");
    assert_eq!(created[0].owner.id, "user-1");

    let record = h
        .bot
        .store()
        .load_conversation(&Harness::address())
        .await
        .unwrap();
    assert_eq!(
        record.conversation_state.playlist.unwrap().name,
        "Sunday Morning"
    );
}

#[tokio::test]
async fn test_reset_interrupts_and_forgets() {
    let h = Harness::new(FakeSpotify::new().with_device(device("d1", "Computer", "Laptop")));
    h.link().await;

    h.say("devices").await;
    h.say("1").await;
    h.say("devices").await;
    assert_eq!(h.top_dialog().await.as_deref(), Some("SelectDevice"));

    assert_eq!(
        h.say("reset").await,
        TurnOutcome::Started("DeleteUserData".to_string())
    );
    assert_eq!(h.recorder().last().text, "all clear! ;)");
    assert!(h.top_dialog().await.is_none());

    let record = h
        .bot
        .store()
        .load_conversation(&Harness::address())
        .await
        .unwrap();
    assert!(record.conversation_state.device.is_none());
    assert!(!h.bot.store().load_user("direct:alice").await.unwrap().is_linked());
}

#[tokio::test]
async fn test_removed_contact_forgets_user() {
    let h = Harness::new(FakeSpotify::new().with_device(device("d1", "Computer", "Laptop")));
    h.link().await;
    h.say("devices").await;
    h.say("1").await;
    h.say("devices").await;

    assert_eq!(
        h.event(InboundKind::ContactRemoved).await,
        TurnOutcome::Started("DeleteUserData".to_string())
    );
    assert_eq!(h.recorder().last().text, "k bye");
    assert!(h.top_dialog().await.is_none());

    let record = h
        .bot
        .store()
        .load_conversation(&Harness::address())
        .await
        .unwrap();
    assert!(record.conversation_state.device.is_none());
    assert!(!h.bot.store().load_user("direct:alice").await.unwrap().is_linked());
}

#[tokio::test]
async fn test_delete_data_request() {
    let h = Harness::new(FakeSpotify::new());
    h.link().await;

    assert_eq!(
        h.event(InboundKind::DeleteUserData).await,
        TurnOutcome::Started("DeleteUserData".to_string())
    );
    assert_eq!(h.recorder().texts(), vec!["got it"]);
    assert!(!h.bot.store().load_user("direct:alice").await.unwrap().is_linked());
}

#[tokio::test]
async fn test_membership_events_are_answered() {
    let h = Harness::new(FakeSpotify::new());
    h.say("show my playlists").await;
    let suspended = h.top_dialog().await;
    assert!(suspended.is_some());
    h.recorder().clear();

    assert_eq!(h.event(InboundKind::BotAdded).await, TurnOutcome::Acknowledged);
    assert_eq!(h.event(InboundKind::ContactAdded).await, TurnOutcome::Acknowledged);
    assert_eq!(h.event(InboundKind::BotRemoved).await, TurnOutcome::Acknowledged);
    assert_eq!(
        h.recorder().texts(),
        vec!["hello everyone!", "hello Alice...", "k bye"]
    );

    // None of these touch the suspended dialog.
    assert_eq!(h.top_dialog().await, suspended);
}

#[tokio::test]
async fn test_small_talk_and_miss() {
    let h = Harness::new(FakeSpotify::new());

    h.say("hello there").await;
    assert_eq!(h.recorder().last().text, "hello, alice :)");

    h.say("thanks").await;
    assert_eq!(h.recorder().last().text, "no problem!");

    h.say("ok").await;
    assert_eq!(h.recorder().last().text, "(y)");

    assert_eq!(h.say("tell me a joke").await, TurnOutcome::Miss);
    assert_eq!(h.recorder().last().text, HELP_TEXT);
    assert!(h.spotify.calls().is_empty());
}

#[tokio::test]
async fn test_dialog_survives_restart() {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();

    let first = Harness::with(
        FakeSpotify::new().with_device(device("d1", "Computer", "Laptop")),
        FakeAccounts::new(),
        StateStore::with_database(db.clone()),
    );
    first.link().await;
    first.say("devices").await;

    let second = Harness::with(
        FakeSpotify::new().with_device(device("d1", "Computer", "Laptop")),
        FakeAccounts::new(),
        StateStore::with_database(db),
    );
    assert_eq!(second.say("laptop").await, TurnOutcome::Continued);
    assert_eq!(second.recorder().texts(), vec!["got it (y)"]);
    assert_eq!(second.spotify.active_device().as_deref(), Some("d1"));
}

#[tokio::test]
async fn test_corrupt_state_starts_fresh() {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    conversation_state::upsert_conversation_state(db.pool(), "direct:alice", "{not json")
        .await
        .unwrap();

    let h = Harness::with(
        FakeSpotify::new(),
        FakeAccounts::new(),
        StateStore::with_database(db),
    );
    h.say("hi").await;
    assert_eq!(h.recorder().last().text, "hi, alice :)");
}

#[tokio::test]
async fn test_unknown_proactive_dialog() {
    let h = Harness::new(FakeSpotify::new());
    let err = h
        .bot
        .begin_dialog(&Harness::address(), &Harness::user(), "Nope", json!({}))
        .await;
    assert!(err.is_err());
    assert!(h.recorder().replies().is_empty());
}
