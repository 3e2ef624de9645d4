//! Conversation and user state storage.

use std::collections::HashMap;
use std::time::Duration;

use bot_core::Address;
use database::{conversation_state, user_state, Database};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::OrchestratorError;
use crate::state::{ConversationRecord, UserData};

enum Backend {
    /// Process-local maps of JSON records.
    Memory {
        conversations: RwLock<HashMap<String, String>>,
        users: RwLock<HashMap<String, String>>,
    },
    /// SQLite holds the only copy.
    Database(Database),
}

/// State storage for conversations and users.
///
/// Records are JSON, kept either in process memory or in SQLite. With a
/// database nothing is cached, so pruning and other writers are seen by
/// the next load. A record that fails to deserialize is treated as absent
/// so the conversation restarts with no active dialog.
pub struct StateStore {
    backend: Backend,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self {
            backend: Backend::Memory {
                conversations: RwLock::new(HashMap::new()),
                users: RwLock::new(HashMap::new()),
            },
        }
    }

    /// Create a store backed by a persistent database.
    pub fn with_database(database: Database) -> Self {
        Self {
            backend: Backend::Database(database),
        }
    }

    /// Load the record for a conversation, or an empty one.
    pub async fn load_conversation(
        &self,
        address: &Address,
    ) -> Result<ConversationRecord, OrchestratorError> {
        let key = address.key();
        let raw = match &self.backend {
            Backend::Memory { conversations, .. } => conversations.read().await.get(&key).cloned(),
            Backend::Database(database) => {
                conversation_state::get_conversation_state(database.pool(), &key)
                    .await?
                    .map(|row| row.record)
            }
        };

        Ok(raw
            .and_then(|raw| decode(&key, &raw))
            .unwrap_or_default())
    }

    /// Persist the record for a conversation.
    pub async fn save_conversation(
        &self,
        address: &Address,
        record: &ConversationRecord,
    ) -> Result<(), OrchestratorError> {
        let key = address.key();
        let raw = encode(record)?;

        match &self.backend {
            Backend::Memory { conversations, .. } => {
                conversations.write().await.insert(key, raw);
            }
            Backend::Database(database) => {
                conversation_state::upsert_conversation_state(database.pool(), &key, &raw).await?;
            }
        }
        Ok(())
    }

    /// Load a user's data, or an empty record.
    pub async fn load_user(&self, user_id: &str) -> Result<UserData, OrchestratorError> {
        let raw = match &self.backend {
            Backend::Memory { users, .. } => users.read().await.get(user_id).cloned(),
            Backend::Database(database) => user_state::get_user_state(database.pool(), user_id)
                .await?
                .map(|row| row.record),
        };

        Ok(raw
            .and_then(|raw| decode::<UserData>(user_id, &raw))
            .map(UserData::validated)
            .unwrap_or_default())
    }

    /// Persist a user's data.
    pub async fn save_user(&self, user_id: &str, data: &UserData) -> Result<(), OrchestratorError> {
        let raw = encode(data)?;

        match &self.backend {
            Backend::Memory { users, .. } => {
                users.write().await.insert(user_id.to_string(), raw);
            }
            Backend::Database(database) => {
                user_state::upsert_user_state(database.pool(), user_id, &raw).await?;
            }
        }
        Ok(())
    }

    /// Forget a conversation entirely.
    pub async fn clear_conversation(&self, address: &Address) -> Result<(), OrchestratorError> {
        let key = address.key();
        match &self.backend {
            Backend::Memory { conversations, .. } => {
                conversations.write().await.remove(&key);
            }
            Backend::Database(database) => {
                conversation_state::delete_conversation_state(database.pool(), &key).await?;
            }
        }
        Ok(())
    }

    /// Forget a user's data entirely.
    pub async fn clear_user(&self, user_id: &str) -> Result<(), OrchestratorError> {
        match &self.backend {
            Backend::Memory { users, .. } => {
                users.write().await.remove(user_id);
            }
            Backend::Database(database) => {
                user_state::delete_user_state(database.pool(), user_id).await?;
            }
        }
        Ok(())
    }

    /// Delete conversations not saved within `retention`. Returns how many
    /// were removed.
    ///
    /// In memory, a record's own `updated_at` decides; unreadable records
    /// are removed too.
    pub async fn prune_idle(&self, retention: Duration) -> Result<u64, OrchestratorError> {
        match &self.backend {
            Backend::Memory { conversations, .. } => {
                let retention = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
                let cutoff = chrono::Utc::now().timestamp().saturating_sub(retention);

                let mut conversations = conversations.write().await;
                let before = conversations.len();
                conversations.retain(|key, raw| {
                    decode::<ConversationRecord>(key, raw)
                        .is_some_and(|record| record.updated_at >= cutoff)
                });
                let pruned = (before - conversations.len()) as u64;
                debug!("Pruned {} in-memory conversations", pruned);
                Ok(pruned)
            }
            Backend::Database(database) => {
                Ok(conversation_state::prune_older_than(database.pool(), retention).await?)
            }
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, OrchestratorError> {
    serde_json::to_string(value).map_err(|e| OrchestratorError::Store(e.to_string()))
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Resetting unreadable state for {}: {}", key, err);
            None
        }
    }
}

/// Store that lets tests plant raw records.
#[cfg(test)]
impl StateStore {
    pub(crate) async fn put_raw_conversation(&self, address: &Address, raw: &str) {
        match &self.backend {
            Backend::Memory { conversations, .. } => {
                conversations
                    .write()
                    .await
                    .insert(address.key(), raw.to_string());
            }
            Backend::Database(database) => {
                conversation_state::upsert_conversation_state(database.pool(), &address.key(), raw)
                    .await
                    .unwrap();
            }
        }
    }
}
