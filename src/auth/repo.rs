use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::{ProfileChanges, User};

const USER_COLUMNS: &str =
    "id, email, username, name, password_hash, avatar_key, phone, bio, is_agent, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, username, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        changes: ProfileChanges,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name     = COALESCE($2, name),
                   phone    = COALESCE($3, phone),
                   bio      = COALESCE($4, bio),
                   is_agent = COALESCE($5, is_agent)
             WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.phone)
        .bind(changes.bio)
        .bind(changes.is_agent)
        .fetch_optional(db)
        .await
    }

    /// Point the avatar at a new object. Returns the updated user and the
    /// previous key so the caller can drop the old object.
    pub async fn set_avatar(
        db: &PgPool,
        id: Uuid,
        avatar_key: &str,
    ) -> sqlx::Result<Option<(User, Option<String>)>> {
        let mut tx = db.begin().await?;
        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar_key FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(previous) = previous else {
            return Ok(None);
        };
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar_key = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(avatar_key)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some((user, previous)))
    }
}

/// Rows are kept a while past `exp` so tokens inside the validation leeway
/// still read as revoked.
const PRUNE_EXPIRED: &str =
    "DELETE FROM revoked_tokens WHERE expires_at < now() - interval '5 minutes'";

/// Records `jti` as revoked and drops rows whose tokens can no longer verify.
pub async fn revoke_token(db: &PgPool, jti: Uuid, expires_at: OffsetDateTime) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO revoked_tokens (jti, expires_at)
        VALUES ($1, $2)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    let pruned = sqlx::query(PRUNE_EXPIRED).execute(&mut *tx).await?;
    tx.commit().await?;
    if pruned.rows_affected() > 0 {
        debug!(pruned = pruned.rows_affected(), "expired revocations pruned");
    }
    Ok(())
}

pub async fn is_revoked(db: &PgPool, jti: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
        .bind(jti)
        .fetch_one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pruning_only_touches_expired_revocations() {
        assert!(PRUNE_EXPIRED.starts_with("DELETE FROM revoked_tokens WHERE expires_at < now()"));
        assert!(!PRUNE_EXPIRED.contains("jti"));
    }
}
