use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{dto::NotificationResponse, repo};
use crate::{
    auth::{dto::Detail, AuthUser},
    error::{AppError, AppResult},
    extract::AppPath,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let rows = repo::list_for_user(&state.db, user_id).await?;
    Ok(Json(rows.into_iter().map(NotificationResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<NotificationResponse>> {
    let Some(n) = repo::mark_read(&state.db, id, user_id).await? else {
        warn!(notification_id = %id, %user_id, "notification not found for user");
        return Err(AppError::not_found("Notification"));
    };
    info!(notification_id = %id, "notification read");
    Ok(Json(n.into()))
}

#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Detail>> {
    let updated = repo::mark_all_read(&state.db, user_id).await?;
    info!(%user_id, updated, "notifications marked read");
    Ok(Json(Detail {
        detail: "All notifications marked as read.",
    }))
}
