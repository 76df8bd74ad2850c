use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,         // login key, stored lower-cased
    pub username: String,
    pub name: String,
    pub password_hash: String, // Argon2 hash, never sent to clients
    pub avatar_key: Option<String>,
    pub phone: String,
    pub bio: String,
    pub is_agent: bool,
    pub created_at: OffsetDateTime,
}

/// Name shown next to listings, posts and comments.
pub fn display_name<'a>(name: &'a str, email: &'a str) -> &'a str {
    if name.trim().is_empty() {
        email
    } else {
        name
    }
}

/// Profile fields a user may change on themself. `None` leaves a field as is.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_agent: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(display_name("", "a@b.io"), "a@b.io");
        assert_eq!(display_name("  ", "a@b.io"), "a@b.io");
        assert_eq!(display_name("Ana", "a@b.io"), "Ana");
    }
}
