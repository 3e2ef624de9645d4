//! User data storage.

use sqlx::SqlitePool;

use crate::models::UserState;
use crate::Result;

/// Create or replace the stored data for a user.
pub async fn upsert_user_state(pool: &SqlitePool, user_id: &str, record: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_state (user_id, record)
        VALUES (?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            record = excluded.record,
            updated_at = datetime('now')
        "#,
    )
    .bind(user_id)
    .bind(record)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the stored data for a user.
pub async fn get_user_state(pool: &SqlitePool, user_id: &str) -> Result<Option<UserState>> {
    let state = sqlx::query_as::<_, UserState>(
        r#"
        SELECT user_id, record, updated_at
        FROM user_state
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(state)
}

/// Delete the stored data for a user.
pub async fn delete_user_state(pool: &SqlitePool, user_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM user_state
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}
