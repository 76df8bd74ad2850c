use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::Notification;

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            message: n.message,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_read_flag_and_timestamp() {
        let n = Notification {
            id: Uuid::nil(),
            message: "Your listing got a new favorite.".into(),
            is_read: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(NotificationResponse::from(n)).unwrap();
        assert_eq!(json["id"], Uuid::nil().to_string());
        assert_eq!(json["is_read"], false);
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }
}
