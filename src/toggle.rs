//! Favorites, likes and saves: a (user, target) row whose existence is the
//! state. Toggling inserts the row if absent and deletes it otherwise.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Inserts lost to a concurrent delete are retried this many times.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// user -> property
    Favorite,
    /// user -> post
    Like,
    /// user -> post (bookmark)
    Save,
}

impl Relation {
    pub fn table(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::Like => "post_likes",
            Relation::Save => "post_saves",
        }
    }

    pub fn target_table(self) -> &'static str {
        match self {
            Relation::Favorite => "properties",
            Relation::Like | Relation::Save => "posts",
        }
    }

    pub fn target_column(self) -> &'static str {
        match self {
            Relation::Favorite => "property_id",
            Relation::Like | Relation::Save => "post_id",
        }
    }

    pub fn target_label(self) -> &'static str {
        match self {
            Relation::Favorite => "Property",
            Relation::Like | Relation::Save => "Post",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub active: bool,
    /// Rows on the target after the toggle.
    pub count: i64,
}

#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn target_exists(&self, rel: Relation, target_id: Uuid) -> AppResult<bool>;
    /// `true` if a row was created, `false` if one already existed.
    async fn insert(&self, rel: Relation, user_id: Uuid, target_id: Uuid) -> AppResult<bool>;
    /// `true` if a row was removed.
    async fn remove(&self, rel: Relation, user_id: Uuid, target_id: Uuid) -> AppResult<bool>;
    async fn count(&self, rel: Relation, target_id: Uuid) -> AppResult<i64>;
}

pub async fn toggle(
    store: &dyn RelationStore,
    rel: Relation,
    user_id: Uuid,
    target_id: Uuid,
) -> AppResult<ToggleOutcome> {
    if !store.target_exists(rel, target_id).await? {
        return Err(AppError::not_found(rel.target_label()));
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let active = if store.insert(rel, user_id, target_id).await? {
            true
        } else if store.remove(rel, user_id, target_id).await? {
            false
        } else {
            // Someone removed the row between our insert and delete.
            debug!(?rel, %user_id, %target_id, attempt, "toggle lost a race, retrying");
            continue;
        };
        let count = store.count(rel, target_id).await?;
        return Ok(ToggleOutcome { active, count });
    }

    warn!(?rel, %user_id, %target_id, "toggle retries exhausted");
    Err(AppError::Conflict(
        "The request conflicted with a concurrent update; try again.".into(),
    ))
}

/// A target deleted after the existence check fails the foreign key (23503).
fn insert_error(rel: Relation, e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            debug!(?rel, "toggle target vanished before insert");
            AppError::not_found(rel.target_label())
        }
        _ => e.into(),
    }
}

/// Relations persisted in Postgres. Uniqueness of (user, target) is the
/// table's primary key, so concurrent inserts resolve in the database.
#[derive(Clone)]
pub struct PgRelationStore {
    db: PgPool,
}

impl PgRelationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationStore for PgRelationStore {
    async fn target_exists(&self, rel: Relation, target_id: Uuid) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            rel.target_table()
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(target_id)
            .fetch_one(&self.db)
            .await?)
    }

    async fn insert(&self, rel: Relation, user_id: Uuid, target_id: Uuid) -> AppResult<bool> {
        let sql = format!(
            "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            rel.table(),
            rel.target_column()
        );
        let done = sqlx::query(&sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&self.db)
            .await
            .map_err(|e| insert_error(rel, e))?;
        Ok(done.rows_affected() == 1)
    }

    async fn remove(&self, rel: Relation, user_id: Uuid, target_id: Uuid) -> AppResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
            rel.table(),
            rel.target_column()
        );
        let done = sqlx::query(&sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn count(&self, rel: Relation, target_id: Uuid) -> AppResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            rel.table(),
            rel.target_column()
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(target_id)
            .fetch_one(&self.db)
            .await?)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Mutex;

    use super::*;

    /// In-process store. `steal_next_rows` simulates a concurrent toggle
    /// deleting the row right before our own delete runs.
    #[derive(Default)]
    pub struct MemoryRelationStore {
        pub targets: Mutex<HashSet<(Relation, Uuid)>>,
        pub rows: Mutex<HashSet<(Relation, Uuid, Uuid)>>,
        pub steal_next_rows: AtomicUsize,
    }

    impl MemoryRelationStore {
        pub async fn with_target(rel: Relation, target_id: Uuid) -> Self {
            let store = Self::default();
            store.targets.lock().await.insert((rel, target_id));
            store
        }
    }

    #[async_trait]
    impl RelationStore for MemoryRelationStore {
        async fn target_exists(&self, rel: Relation, target_id: Uuid) -> AppResult<bool> {
            Ok(self.targets.lock().await.contains(&(rel, target_id)))
        }

        async fn insert(&self, rel: Relation, user_id: Uuid, target_id: Uuid) -> AppResult<bool> {
            if !self.targets.lock().await.contains(&(rel, target_id)) {
                return Err(AppError::not_found(rel.target_label()));
            }
            Ok(self.rows.lock().await.insert((rel, user_id, target_id)))
        }

        async fn remove(&self, rel: Relation, user_id: Uuid, target_id: Uuid) -> AppResult<bool> {
            let mut rows = self.rows.lock().await;
            if self.steal_next_rows.load(Ordering::SeqCst) > 0 {
                self.steal_next_rows.fetch_sub(1, Ordering::SeqCst);
                rows.remove(&(rel, user_id, target_id));
                return Ok(false);
            }
            Ok(rows.remove(&(rel, user_id, target_id)))
        }

        async fn count(&self, rel: Relation, target_id: Uuid) -> AppResult<i64> {
            let rows = self.rows.lock().await;
            Ok(rows
                .iter()
                .filter(|(r, _, t)| *r == rel && *t == target_id)
                .count() as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::memory::MemoryRelationStore;
    use super::*;

    #[tokio::test]
    async fn toggle_twice_restores_state() {
        let post = Uuid::new_v4();
        let user = Uuid::new_v4();
        let store = MemoryRelationStore::with_target(Relation::Like, post).await;

        let on = toggle(&store, Relation::Like, user, post).await.unwrap();
        assert_eq!(on, ToggleOutcome { active: true, count: 1 });
        let off = toggle(&store, Relation::Like, user, post).await.unwrap();
        assert_eq!(off, ToggleOutcome { active: false, count: 0 });
        assert!(store.rows.lock().await.is_empty());
    }

    #[tokio::test]
    async fn counts_move_by_one() {
        let property = Uuid::new_v4();
        let store = MemoryRelationStore::with_target(Relation::Favorite, property).await;
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        toggle(&store, Relation::Favorite, a, property).await.unwrap();
        toggle(&store, Relation::Favorite, b, property).await.unwrap();
        let before = store.count(Relation::Favorite, property).await.unwrap();

        let on = toggle(&store, Relation::Favorite, c, property).await.unwrap();
        assert_eq!(on.count, before + 1);
        let off = toggle(&store, Relation::Favorite, a, property).await.unwrap();
        assert_eq!(off.count, on.count - 1);
        assert!(!off.active);
    }

    #[tokio::test]
    async fn relations_do_not_bleed_into_each_other() {
        let post = Uuid::new_v4();
        let user = Uuid::new_v4();
        let store = MemoryRelationStore::with_target(Relation::Like, post).await;
        store.targets.lock().await.insert((Relation::Save, post));

        toggle(&store, Relation::Like, user, post).await.unwrap();
        let saved = toggle(&store, Relation::Save, user, post).await.unwrap();
        assert_eq!(saved, ToggleOutcome { active: true, count: 1 });
        assert_eq!(store.count(Relation::Like, post).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let store = MemoryRelationStore::default();
        let err = toggle(&store, Relation::Favorite, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Property not found."));
    }

    #[tokio::test]
    async fn lost_race_is_retried_as_insert() {
        let post = Uuid::new_v4();
        let user = Uuid::new_v4();
        let store = MemoryRelationStore::with_target(Relation::Like, post).await;
        store.rows.lock().await.insert((Relation::Like, user, post));
        store.steal_next_rows.store(1, Ordering::SeqCst);

        let outcome = toggle(&store, Relation::Like, user, post).await.unwrap();
        assert_eq!(outcome, ToggleOutcome { active: true, count: 1 });
    }

    #[tokio::test]
    async fn endless_races_surface_conflict() {
        let post = Uuid::new_v4();
        let user = Uuid::new_v4();
        let store = MemoryRelationStore::with_target(Relation::Save, post).await;
        store.steal_next_rows.store(usize::MAX, Ordering::SeqCst);

        // Every insert finds a row that a concurrent toggle then deletes.
        struct AlwaysTaken(MemoryRelationStore);
        #[async_trait]
        impl RelationStore for AlwaysTaken {
            async fn target_exists(&self, rel: Relation, t: Uuid) -> AppResult<bool> {
                self.0.target_exists(rel, t).await
            }
            async fn insert(&self, _r: Relation, _u: Uuid, _t: Uuid) -> AppResult<bool> {
                Ok(false)
            }
            async fn remove(&self, rel: Relation, u: Uuid, t: Uuid) -> AppResult<bool> {
                self.0.remove(rel, u, t).await
            }
            async fn count(&self, rel: Relation, t: Uuid) -> AppResult<i64> {
                self.0.count(rel, t).await
            }
        }

        let err = toggle(&AlwaysTaken(store), Relation::Save, user, post)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_toggles_never_duplicate_rows() {
        let property = Uuid::new_v4();
        let user = Uuid::new_v4();
        let store = Arc::new(MemoryRelationStore::with_target(Relation::Favorite, property).await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    toggle(store.as_ref(), Relation::Favorite, user, property).await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        // Eight toggles from the same user: an even number, so back to absent.
        assert_eq!(store.count(Relation::Favorite, property).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn target_deleted_mid_toggle_is_not_found() {
        // The existence check passes, then the target is gone by the insert.
        struct StaleCheck(MemoryRelationStore);
        #[async_trait]
        impl RelationStore for StaleCheck {
            async fn target_exists(&self, _r: Relation, _t: Uuid) -> AppResult<bool> {
                Ok(true)
            }
            async fn insert(&self, rel: Relation, u: Uuid, t: Uuid) -> AppResult<bool> {
                self.0.insert(rel, u, t).await
            }
            async fn remove(&self, rel: Relation, u: Uuid, t: Uuid) -> AppResult<bool> {
                self.0.remove(rel, u, t).await
            }
            async fn count(&self, rel: Relation, t: Uuid) -> AppResult<i64> {
                self.0.count(rel, t).await
            }
        }

        let store = StaleCheck(MemoryRelationStore::default());
        let err = toggle(&store, Relation::Like, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Post not found."));
    }

    #[derive(Debug)]
    struct PgCode(&'static str);

    impl std::fmt::Display for PgCode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "database error {}", self.0)
        }
    }

    impl std::error::Error for PgCode {}

    impl sqlx::error::DatabaseError for PgCode {
        fn message(&self) -> &str {
            "database error"
        }
        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.0.into())
        }
        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.0 {
                "23503" => sqlx::error::ErrorKind::ForeignKeyViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }
    }

    #[test]
    fn foreign_key_violation_on_insert_is_not_found() {
        let err = insert_error(
            Relation::Favorite,
            sqlx::Error::Database(Box::new(PgCode("23503"))),
        );
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Property not found."));

        let err = insert_error(
            Relation::Favorite,
            sqlx::Error::Database(Box::new(PgCode("40001"))),
        );
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn relation_tables() {
        assert_eq!(Relation::Favorite.table(), "favorites");
        assert_eq!(Relation::Like.target_table(), "posts");
        assert_eq!(Relation::Save.target_column(), "post_id");
    }
}
