use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::authz::Owned;

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Owned for Post {
    fn owner_id(&self) -> Uuid {
        self.author_id
    }
}

/// Author columns joined onto posts and comments.
#[derive(Debug, Clone, FromRow)]
pub struct AuthorInfo {
    pub author_name: String,
    pub author_email: String,
    pub author_avatar_key: Option<String>,
}

/// A feed row: the post, its author and the viewer-dependent flags.
#[derive(Debug, Clone, FromRow)]
pub struct PostSummary {
    #[sqlx(flatten)]
    pub post: Post,
    #[sqlx(flatten)]
    pub author: AuthorInfo,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub is_saved: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

impl Owned for Comment {
    fn owner_id(&self) -> Uuid {
        self.author_id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    #[sqlx(flatten)]
    pub comment: Comment,
    #[sqlx(flatten)]
    pub author: AuthorInfo,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}
