//! Inbound and outbound message types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a conversation lives: the channel plus the channel's conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Channel identifier (e.g. "skype", "slack", "webchat").
    pub channel: String,
    /// Conversation id within the channel.
    pub conversation_id: String,
}

impl Address {
    /// Create a new address.
    pub fn new(channel: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Stable storage key for this conversation.
    pub fn key(&self) -> String {
        format!("{}:{}", self.channel, self.conversation_id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.conversation_id)
    }
}

/// The user who sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    /// Channel-scoped user id.
    pub id: String,
    /// Display name, if the channel provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatUser {
    /// Create a user with an id only.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Create a user with an id and display name.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// What the connector is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundKind {
    /// A user wrote something.
    #[default]
    Message,
    /// The bot was added to a group conversation.
    BotAdded,
    /// The bot was removed from a group conversation.
    BotRemoved,
    /// The user added the bot to their contacts.
    ContactAdded,
    /// The user removed the bot from their contacts.
    ContactRemoved,
    /// The user asked the channel to delete their data.
    DeleteUserData,
}

/// An inbound chat message or connector event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Conversation the message belongs to.
    pub address: Address,
    /// Who sent it.
    pub user: ChatUser,
    /// Raw message text. Empty for events.
    #[serde(default)]
    pub text: String,
    /// Event kind; plain messages when absent.
    #[serde(default)]
    pub kind: InboundKind,
    /// Timestamp in milliseconds since epoch.
    #[serde(default)]
    pub timestamp: u64,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(address: Address, user: ChatUser, text: impl Into<String>, timestamp: u64) -> Self {
        Self {
            address,
            user,
            text: text.into(),
            kind: InboundKind::Message,
            timestamp,
        }
    }

    /// Create a connector event without text.
    pub fn event(address: Address, user: ChatUser, kind: InboundKind, timestamp: u64) -> Self {
        Self {
            address,
            user,
            text: String::new(),
            kind,
            timestamp,
        }
    }

    /// Create a one-to-one message where the conversation id is the user id.
    pub fn direct(user_id: impl Into<String>, text: impl Into<String>, timestamp: u64) -> Self {
        let user_id = user_id.into();
        Self {
            address: Address::new("direct", user_id.clone()),
            user: ChatUser::new(user_id),
            text: text.into(),
            kind: InboundKind::Message,
            timestamp,
        }
    }
}

/// A rich card describing a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCard {
    /// Title line, usually "artist - track".
    pub title: String,
    /// Subtitle line, usually the album name.
    pub subtitle: String,
    /// Cover art URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Link that opens the track in the music service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_url: Option<String>,
}

/// An outbound reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    /// Markdown text of the reply. May be empty for card-only replies.
    pub text: String,
    /// Optional structured card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<TrackCard>,
    /// Suggested answers rendered as buttons by channels that support them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl Reply {
    /// A plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A card-only reply.
    pub fn card(card: TrackCard) -> Self {
        Self {
            card: Some(card),
            ..Default::default()
        }
    }

    /// A text reply offering a set of choices.
    pub fn with_choices(text: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            text: text.into(),
            choices,
            ..Default::default()
        }
    }
}
