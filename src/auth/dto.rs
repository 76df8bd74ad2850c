use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::repo_types::User, media::MediaLinks};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of refresh and logout calls.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_agent: Option<bool>,
}

/// Full profile as returned to the user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub phone: String,
    pub bio: String,
    pub is_agent: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserResponse {
    pub fn from_user(user: User, links: &MediaLinks) -> Self {
        Self {
            avatar_url: links.resolve(user.avatar_key.as_deref()),
            id: user.id,
            name: user.name,
            email: user.email,
            username: user.username,
            phone: user.phone,
            bio: user.bio,
            is_agent: user.is_agent,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            username: "test".into(),
            name: "Test".into(),
            password_hash: "$argon2id$secret".into(),
            avatar_key: Some("avatars/u/a.png".into()),
            phone: String::new(),
            bio: String::new(),
            is_agent: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn user_response_hides_password_hash() {
        let links = MediaLinks::from_parts("https://cdn.test", "http", None);
        let json = serde_json::to_string(&UserResponse::from_user(user(), &links)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("https://cdn.test/avatars/u/a.png"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn avatar_url_is_null_without_request_context() {
        let resp = UserResponse::from_user(user(), &MediaLinks::none());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["avatar_url"].is_null());
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }
}
