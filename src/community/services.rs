use time::{macros::format_description, Duration, OffsetDateTime, UtcOffset};

use super::dto::{CommentResponse, CreatePostRequest, PostResponse, UpdatePostRequest};
use super::repo_types::{AuthorInfo, CommentRow, NewPost, PostChanges, PostSummary};
use crate::{
    auth::repo_types::display_name,
    error::{AppError, AppResult},
    media::MediaLinks,
};

const MAX_TITLE_LEN: usize = 300;

/// Age of `created_at` as seen at `now`, truncated to the largest whole unit.
/// Anything a week or older is shown as a short date.
pub fn time_ago(created_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let age = now - created_at;
    if age.is_negative() {
        return "0m".to_string();
    }
    if age < Duration::HOUR {
        format!("{}m", age.whole_minutes())
    } else if age < Duration::DAY {
        format!("{}h", age.whole_hours())
    } else if age < Duration::WEEK {
        format!("{}d", age.whole_days())
    } else {
        let utc = created_at.to_offset(UtcOffset::UTC);
        utc.format(format_description!("[month repr:short] [day]"))
            .unwrap_or_else(|_| utc.date().to_string())
    }
}

fn author_fields(author: AuthorInfo, links: &MediaLinks) -> (String, Option<String>) {
    let name = display_name(&author.author_name, &author.author_email).to_string();
    (name, links.resolve(author.author_avatar_key.as_deref()))
}

pub fn post(row: PostSummary, now: OffsetDateTime, links: &MediaLinks) -> PostResponse {
    let (author_name, author_avatar) = author_fields(row.author, links);
    PostResponse {
        time_ago: time_ago(row.post.created_at, now),
        id: row.post.id,
        author_id: row.post.author_id,
        author_name,
        author_avatar,
        title: row.post.title,
        content: row.post.content,
        likes_count: row.likes_count,
        comments_count: row.comments_count,
        is_liked: row.is_liked,
        is_saved: row.is_saved,
        created_at: row.post.created_at,
    }
}

pub fn comment(row: CommentRow, links: &MediaLinks) -> CommentResponse {
    let (author_name, author_avatar) = author_fields(row.author, links);
    CommentResponse {
        id: row.comment.id,
        author_name,
        author_avatar,
        content: row.comment.content,
        created_at: row.comment.created_at,
    }
}

fn title(value: String) -> AppResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::validation("title: This field may not be blank."));
    }
    if value.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!(
            "title: Ensure this field has no more than {} characters.",
            MAX_TITLE_LEN
        )));
    }
    Ok(value)
}

pub fn content(field: &str, value: String) -> AppResult<String> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{}: This field may not be blank.", field)));
    }
    Ok(value)
}

pub fn new_post(req: CreatePostRequest) -> AppResult<NewPost> {
    Ok(NewPost {
        title: title(req.title)?,
        content: content("content", req.content)?,
    })
}

pub fn post_changes(req: UpdatePostRequest) -> AppResult<PostChanges> {
    Ok(PostChanges {
        title: req.title.map(title).transpose()?,
        content: req.content.map(|c| content("content", c)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::community::repo_types::Post;

    const NOW: OffsetDateTime = datetime!(2024-03-10 12:00 UTC);

    fn ago(d: Duration) -> String {
        time_ago(NOW - d, NOW)
    }

    #[test]
    fn minutes_below_an_hour() {
        assert_eq!(ago(Duration::ZERO), "0m");
        assert_eq!(ago(Duration::minutes(59) + Duration::seconds(59)), "59m");
    }

    #[test]
    fn hours_below_a_day() {
        assert_eq!(ago(Duration::HOUR), "1h");
        assert_eq!(ago(Duration::hours(23) + Duration::minutes(59)), "23h");
    }

    #[test]
    fn days_below_a_week() {
        assert_eq!(ago(Duration::DAY), "1d");
        assert_eq!(ago(Duration::days(6)), "6d");
    }

    #[test]
    fn a_week_or_more_is_a_date() {
        assert_eq!(ago(Duration::days(8)), "Mar 02");
        assert_eq!(ago(Duration::WEEK), "Mar 03");
    }

    #[test]
    fn future_timestamps_render_as_now() {
        assert_eq!(time_ago(NOW + Duration::minutes(3), NOW), "0m");
    }

    #[test]
    fn date_uses_utc() {
        let created = datetime!(2024-01-01 23:30 -02:00);
        assert_eq!(time_ago(created, NOW), "Jan 02");
    }

    #[test]
    fn post_view_falls_back_to_email() {
        let row = PostSummary {
            post: Post {
                id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                title: "Best areas for families?".into(),
                content: "Looking at Dubai Hills.".into(),
                created_at: NOW - Duration::hours(2),
                updated_at: NOW,
            },
            author: AuthorInfo {
                author_name: String::new(),
                author_email: "sam@example.com".into(),
                author_avatar_key: Some("avatars/sam/a.png".into()),
            },
            likes_count: 4,
            comments_count: 1,
            is_liked: true,
            is_saved: false,
        };
        let view = post(row, NOW, &MediaLinks::none());
        assert_eq!(view.author_name, "sam@example.com");
        assert_eq!(view.author_avatar, None);
        assert_eq!(view.time_ago, "2h");
        assert!(view.is_liked);
    }

    #[test]
    fn post_validation() {
        assert!(new_post(CreatePostRequest {
            title: "  ".into(),
            content: "x".into(),
        })
        .is_err());
        assert!(new_post(CreatePostRequest {
            title: "t".repeat(301),
            content: "x".into(),
        })
        .is_err());
        let ok = new_post(CreatePostRequest {
            title: " Hello ".into(),
            content: "body".into(),
        })
        .unwrap();
        assert_eq!(ok.title, "Hello");

        let changes = post_changes(UpdatePostRequest {
            content: Some("edited".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(changes.title.is_none());
        assert_eq!(changes.content.as_deref(), Some("edited"));
    }
}
