use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: OffsetDateTime,
}

/// Newest first.
pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, message, is_read, created_at
          FROM notifications
         WHERE user_id = $1
         ORDER BY created_at DESC, id
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Marks one of the user's notifications read. Someone else's notification
/// is reported as missing.
pub async fn mark_read(
    db: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<Notification>> {
    sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications
           SET is_read = TRUE
         WHERE id = $1 AND user_id = $2
        RETURNING id, message, is_read, created_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Returns how many rows changed.
pub async fn mark_all_read(db: &PgPool, user_id: Uuid) -> sqlx::Result<u64> {
    let done = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(done.rows_affected())
}
