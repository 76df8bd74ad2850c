use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::feed::FeedTab;
use super::repo_types::{CommentRow, NewPost, Post, PostChanges, PostSummary};
use crate::properties::filter::Page;

/// Starts a post SELECT; the viewer id is bound twice, for `is_liked` and
/// `is_saved`.
fn post_select(viewer: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT p.id, p.author_id, p.title, p.content, p.created_at, p.updated_at,
               u.name AS author_name, u.email AS author_email,
               u.avatar_key AS author_avatar_key,
               (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes_count,
               (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comments_count,
               EXISTS (SELECT 1 FROM post_likes l
                        WHERE l.post_id = p.id AND l.user_id = "#,
    );
    qb.push_bind(viewer);
    qb.push(
        r#") AS is_liked,
               EXISTS (SELECT 1 FROM post_saves s
                        WHERE s.post_id = p.id AND s.user_id = "#,
    );
    qb.push_bind(viewer);
    qb.push(") AS is_saved FROM posts p JOIN users u ON u.id = p.author_id");
    qb
}

pub fn list_query(tab: FeedTab, viewer: Option<Uuid>, page: Page) -> QueryBuilder<'static, Postgres> {
    let mut qb = post_select(viewer);
    qb.push(tab.order_by());
    page.push_limit(&mut qb);
    qb
}

pub async fn list(
    db: &PgPool,
    tab: FeedTab,
    viewer: Option<Uuid>,
    page: Page,
) -> sqlx::Result<Vec<PostSummary>> {
    list_query(tab, viewer, page)
        .build_query_as::<PostSummary>()
        .fetch_all(db)
        .await
}

pub async fn detail(
    db: &PgPool,
    id: Uuid,
    viewer: Option<Uuid>,
) -> sqlx::Result<Option<PostSummary>> {
    let mut qb = post_select(viewer);
    qb.push(" WHERE p.id = ");
    qb.push_bind(id);
    qb.build_query_as::<PostSummary>().fetch_optional(db).await
}

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Post>> {
    sqlx::query_as::<_, Post>(
        "SELECT id, author_id, title, content, created_at, updated_at FROM posts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn create(db: &PgPool, author_id: Uuid, new: NewPost) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO posts (id, author_id, title, content) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(author_id)
        .bind(&new.title)
        .bind(&new.content)
        .execute(db)
        .await?;
    Ok(id)
}

pub async fn update(db: &PgPool, id: Uuid, changes: PostChanges) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
           SET title      = COALESCE($2, title),
               content    = COALESCE($3, content),
               updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(changes.title)
    .bind(changes.content)
    .execute(db)
    .await?;
    Ok(())
}

/// Comments, likes and saves go with the post.
pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.author_id, c.content, c.created_at,
           u.name AS author_name, u.email AS author_email,
           u.avatar_key AS author_avatar_key
      FROM post_comments c
      JOIN users u ON u.id = c.author_id
"#;

/// Oldest first.
pub async fn comments(db: &PgPool, post_id: Uuid) -> sqlx::Result<Vec<CommentRow>> {
    sqlx::query_as::<_, CommentRow>(&format!(
        "{} WHERE c.post_id = $1 ORDER BY c.created_at, c.id",
        COMMENT_SELECT
    ))
    .bind(post_id)
    .fetch_all(db)
    .await
}

/// Looks a comment up under its post; a comment id paired with another post
/// is not found.
pub async fn find_comment(
    db: &PgPool,
    post_id: Uuid,
    comment_id: Uuid,
) -> sqlx::Result<Option<CommentRow>> {
    sqlx::query_as::<_, CommentRow>(&format!(
        "{} WHERE c.id = $1 AND c.post_id = $2",
        COMMENT_SELECT
    ))
    .bind(comment_id)
    .bind(post_id)
    .fetch_optional(db)
    .await
}

/// Inserts the comment if the post still exists. `None` means it does not.
pub async fn create_comment(
    db: &PgPool,
    post_id: Uuid,
    author_id: Uuid,
    content: &str,
) -> sqlx::Result<Option<Uuid>> {
    sqlx::query_scalar(
        r#"
        INSERT INTO post_comments (id, post_id, author_id, content)
        SELECT $1, p.id, $3, $4 FROM posts p WHERE p.id = $2
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(post_id)
    .bind(author_id)
    .bind(content)
    .fetch_optional(db)
    .await
}

pub async fn delete_comment(db: &PgPool, comment_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM post_comments WHERE id = $1")
        .bind(comment_id)
        .execute(db)
        .await?;
    Ok(())
}
