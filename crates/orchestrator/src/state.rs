//! Persisted conversation and user state.
//!
//! A conversation record is loaded at the start of a turn, mutated in place
//! while steps run, and written back only when the turn succeeds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spotify_client::{Device, Playlist, SpotifyUser, TokenData};
use tracing::warn;

use crate::prompt::Prompt;

/// One active instantiation of a dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogFrame {
    /// Registered dialog name.
    pub name: String,
    /// Index of the step that ran last (or runs next when resumed).
    pub step_index: usize,
    /// Arguments the dialog was started with.
    #[serde(default)]
    pub args: Value,
    /// Private step-local state.
    #[serde(default)]
    pub local_state: Map<String, Value>,
    /// The prompt this frame is suspended on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,
    /// Unrecognized answers to the current prompt so far.
    #[serde(default)]
    pub retries: u8,
}

impl DialogFrame {
    /// A fresh frame at step 0.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            step_index: 0,
            args,
            local_state: Map::new(),
            prompt: None,
            retries: 0,
        }
    }
}

/// The active playlist, cached from the music service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub owner_id: String,
}

impl From<&Playlist> for PlaylistRef {
    fn from(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            uri: playlist.uri.clone(),
            owner_id: playlist.owner.id.clone(),
        }
    }
}

/// Conversation-scoped data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationData {
    /// Device picked with `SelectDevice`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    /// Active (queue) playlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<PlaylistRef>,
}

impl ConversationData {
    /// Id of the selected device, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().and_then(|d| d.id.as_deref())
    }
}

/// User-scoped data: the linked account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_token: Option<TokenData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_user: Option<SpotifyUser>,
}

impl UserData {
    /// Drop a token that is not structurally valid.
    pub fn validated(mut self) -> Self {
        if let Some(token) = &self.spotify_token {
            if !token.is_well_formed() {
                warn!("Discarding malformed stored token");
                self.spotify_token = None;
            }
        }
        self
    }

    /// Whether an account is linked.
    pub fn is_linked(&self) -> bool {
        self.spotify_token.is_some()
    }
}

/// Everything persisted for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Active frames, most recent last.
    #[serde(default)]
    pub dialog_stack: Vec<DialogFrame>,
    /// Conversation-scoped data.
    #[serde(default)]
    pub conversation_state: ConversationData,
    /// Last commit time, epoch seconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl ConversationRecord {
    /// The frame receiving the next input.
    pub fn top(&self) -> Option<&DialogFrame> {
        self.dialog_stack.last()
    }

    /// Whether no dialog is active.
    pub fn is_idle(&self) -> bool {
        self.dialog_stack.is_empty()
    }

    /// Drop a suspended stack untouched for longer than `ttl_secs`.
    ///
    /// Returns whether anything was dropped.
    pub fn expire_stale(&mut self, now: i64, ttl_secs: i64) -> bool {
        if self.dialog_stack.is_empty() || self.updated_at == 0 {
            return false;
        }
        if now - self.updated_at <= ttl_secs {
            return false;
        }
        self.dialog_stack.clear();
        true
    }
}
