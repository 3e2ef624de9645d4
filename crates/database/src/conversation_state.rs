//! Conversation state storage.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::models::ConversationState;
use crate::Result;

/// Create or replace the stored record for a conversation.
pub async fn upsert_conversation_state(
    pool: &SqlitePool,
    address: &str,
    record: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_state (address, record)
        VALUES (?, ?)
        ON CONFLICT(address) DO UPDATE SET
            record = excluded.record,
            updated_at = datetime('now')
        "#,
    )
    .bind(address)
    .bind(record)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the stored record for a conversation.
pub async fn get_conversation_state(
    pool: &SqlitePool,
    address: &str,
) -> Result<Option<ConversationState>> {
    let state = sqlx::query_as::<_, ConversationState>(
        r#"
        SELECT address, record, updated_at
        FROM conversation_state
        WHERE address = ?
        "#,
    )
    .bind(address)
    .fetch_optional(pool)
    .await?;

    Ok(state)
}

/// Delete the stored record for a conversation.
pub async fn delete_conversation_state(pool: &SqlitePool, address: &str) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM conversation_state
        WHERE address = ?
        "#,
    )
    .bind(address)
    .execute(pool)
    .await?;

    Ok(())
}

/// Prune conversation records not touched within `ttl`.
pub async fn prune_older_than(pool: &SqlitePool, ttl: Duration) -> Result<u64> {
    let modifier = format!("-{} seconds", ttl.as_secs());
    let result = sqlx::query(
        r#"
        DELETE FROM conversation_state
        WHERE updated_at < datetime('now', ?)
        "#,
    )
    .bind(modifier)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
