use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CommentResponse, CreateCommentRequest, CreatePostRequest, LikeToggleResponse,
        PostResponse, SaveToggleResponse, UpdatePostRequest,
    },
    feed::FeedTab,
    repo, services,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    authz::ensure_can_write,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    media::MediaLinks,
    properties::filter::Page,
    state::AppState,
    toggle::{toggle, PgRelationStore, Relation, ToggleOutcome},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/community/posts", get(list_posts).post(create_post))
        .route(
            "/community/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/community/posts/:id/like", post(toggle_like))
        .route("/community/posts/:id/save", post(toggle_save))
        .route(
            "/community/posts/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/community/posts/:id/comments/:cid", delete(delete_comment))
}

fn toggle_status(outcome: &ToggleOutcome) -> StatusCode {
    if outcome.active {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

async fn load_post(
    state: &AppState,
    id: Uuid,
    viewer: Option<Uuid>,
    links: &MediaLinks,
) -> AppResult<PostResponse> {
    let row = repo::detail(&state.db, id, viewer)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    Ok(services::post(row, OffsetDateTime::now_utc(), links))
}

#[instrument(skip(state, links, params), fields(tab))]
pub async fn list_posts(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let tab = FeedTab::parse(params.get("tab").map(String::as_str));
    tracing::Span::current().record("tab", tracing::field::display(tab));
    let page = Page::from_params(&params)?;
    let rows = repo::list(&state.db, tab, viewer, page).await?;
    let now = OffsetDateTime::now_utc();
    Ok(Json(
        rows.into_iter()
            .map(|r| services::post(r, now, &links))
            .collect(),
    ))
}

#[instrument(skip(state, links, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
    AppJson(payload): AppJson<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostResponse>)> {
    let new = services::new_post(payload).map_err(|e| {
        warn!(error = %e, "invalid post");
        e
    })?;
    let id = repo::create(&state.db, user_id, new).await?;
    info!(post_id = %id, author_id = %user_id, "post created");
    let view = load_post(&state, id, Some(user_id), &links).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, links))]
pub async fn get_post(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<PostResponse>> {
    Ok(Json(load_post(&state, id, viewer, &links).await?))
}

#[instrument(skip(state, links, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    let post = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    ensure_can_write(viewer, &post).map_err(|e| {
        warn!(post_id = %id, "update rejected: {}", e);
        e
    })?;

    let changes = services::post_changes(payload)?;
    repo::update(&state.db, id, changes).await?;
    info!(post_id = %id, "post updated");
    Ok(Json(load_post(&state, id, viewer, &links).await?))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let post = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    ensure_can_write(viewer, &post).map_err(|e| {
        warn!(post_id = %id, "delete rejected: {}", e);
        e
    })?;

    repo::delete(&state.db, id).await?;
    info!(post_id = %id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<(StatusCode, Json<LikeToggleResponse>)> {
    let store = PgRelationStore::new(state.db.clone());
    let outcome = toggle(&store, Relation::Like, user_id, id).await?;
    info!(post_id = %id, %user_id, liked = outcome.active, "like toggled");
    Ok((
        toggle_status(&outcome),
        Json(LikeToggleResponse {
            liked: outcome.active,
            likes_count: outcome.count,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn toggle_save(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<(StatusCode, Json<SaveToggleResponse>)> {
    let store = PgRelationStore::new(state.db.clone());
    let outcome = toggle(&store, Relation::Save, user_id, id).await?;
    info!(post_id = %id, %user_id, saved = outcome.active, "save toggled");
    Ok((
        toggle_status(&outcome),
        Json(SaveToggleResponse {
            saved: outcome.active,
        }),
    ))
}

#[instrument(skip(state, links))]
pub async fn list_comments(
    State(state): State<AppState>,
    MaybeAuthUser(_viewer): MaybeAuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    if repo::find(&state.db, id).await?.is_none() {
        return Err(AppError::not_found("Post"));
    }
    let rows = repo::comments(&state.db, id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| services::comment(r, &links))
            .collect(),
    ))
}

#[instrument(skip(state, links, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let content = services::content("content", payload.content)?;
    let Some(comment_id) = repo::create_comment(&state.db, id, user_id, &content).await? else {
        warn!(post_id = %id, "comment on missing post");
        return Err(AppError::not_found("Post"));
    };
    let row = repo::find_comment(&state.db, id, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;

    info!(post_id = %id, %comment_id, author_id = %user_id, "comment created");
    Ok((StatusCode::CREATED, Json(services::comment(row, &links))))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath((id, cid)): AppPath<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let row = repo::find_comment(&state.db, id, cid)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;
    ensure_can_write(Some(user_id), &row.comment).map_err(|e| {
        warn!(comment_id = %cid, "comment delete rejected: {}", e);
        e
    })?;

    repo::delete_comment(&state.db, cid).await?;
    info!(post_id = %id, comment_id = %cid, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
