//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored state for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConversationState {
    /// Conversation address key (e.g., "direct:alice").
    pub address: String,
    /// Serialized conversation record (JSON).
    pub record: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Stored data for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserState {
    /// Chat user id.
    pub user_id: String,
    /// Serialized user data (JSON).
    pub record: String,
    /// Last update timestamp.
    pub updated_at: String,
}
