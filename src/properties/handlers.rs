use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CreatePropertyRequest, FavoriteResponse, FavoriteToggleResponse, PropertyDetail,
        PropertyImageResponse, PropertyListItem, UpdatePropertyRequest,
    },
    filter::{Page, PropertyQuery},
    repo, services,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    authz::ensure_can_write,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    media::{read_image_fields, MediaLinks},
    state::AppState,
    storage::{delete_orphans, put_upload},
    toggle::{toggle, PgRelationStore, Relation},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route("/properties/featured", get(featured))
        .route("/properties/favorites", get(my_favorites))
        .route(
            "/properties/:id",
            get(get_property)
                .patch(update_property)
                .delete(delete_property),
        )
        .route(
            "/properties/:id/images",
            post(upload_images).layer(DefaultBodyLimit::max(50 * 1024 * 1024)),
        )
        .route("/properties/:id/favorite", post(toggle_favorite))
}

async fn load_detail(
    state: &AppState,
    id: Uuid,
    viewer: Option<Uuid>,
    links: &MediaLinks,
) -> AppResult<PropertyDetail> {
    let row = repo::detail(&state.db, id, viewer)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    Ok(services::detail(row, viewer, links))
}

#[instrument(skip(state, links, params))]
pub async fn list_properties(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> AppResult<Json<Vec<PropertyListItem>>> {
    let query = PropertyQuery::from_params(&params).map_err(|e| {
        warn!(error = %e, "rejected property query");
        e
    })?;
    let rows = repo::list(&state.db, &query, viewer).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| services::list_item(r, &links))
            .collect(),
    ))
}

#[instrument(skip(state, links, params))]
pub async fn featured(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> AppResult<Json<Vec<PropertyListItem>>> {
    let query = PropertyQuery::featured(&params)?;
    let rows = repo::list(&state.db, &query, viewer).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| services::list_item(r, &links))
            .collect(),
    ))
}

#[instrument(skip(state, links, payload))]
pub async fn create_property(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
    AppJson(payload): AppJson<CreatePropertyRequest>,
) -> AppResult<(StatusCode, Json<PropertyDetail>)> {
    let new = services::new_property(payload).map_err(|e| {
        warn!(error = %e, "invalid property");
        e
    })?;
    let id = repo::create(&state.db, user_id, new).await.map_err(|e| {
        error!(error = %e, "create property failed");
        AppError::Internal(e)
    })?;

    info!(property_id = %id, owner_id = %user_id, "property created");
    let detail = load_detail(&state, id, Some(user_id), &links).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[instrument(skip(state, links))]
pub async fn get_property(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<PropertyDetail>> {
    Ok(Json(load_detail(&state, id, viewer, &links).await?))
}

#[instrument(skip(state, links, payload))]
pub async fn update_property(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdatePropertyRequest>,
) -> AppResult<Json<PropertyDetail>> {
    let property = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    ensure_can_write(viewer, &property).map_err(|e| {
        warn!(property_id = %id, "update rejected: {}", e);
        e
    })?;

    let changes = services::property_changes(payload)?;
    repo::update(&state.db, id, changes).await?;
    info!(property_id = %id, "property updated");
    Ok(Json(load_detail(&state, id, viewer, &links).await?))
}

#[instrument(skip(state))]
pub async fn delete_property(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let property = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    ensure_can_write(viewer, &property).map_err(|e| {
        warn!(property_id = %id, "delete rejected: {}", e);
        e
    })?;

    let keys = repo::delete(&state.db, id).await.map_err(|e| {
        error!(error = %e, property_id = %id, "delete property failed");
        AppError::Internal(e)
    })?;
    delete_orphans(state.storage.as_ref(), &keys).await;

    info!(property_id = %id, images = keys.len(), "property deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, links, mp))]
pub async fn upload_images(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    links: MediaLinks,
    AppPath(id): AppPath<Uuid>,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Vec<PropertyImageResponse>>)> {
    let property = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    ensure_can_write(viewer, &property)?;

    let mut mp = mp?;
    let files = read_image_fields(&mut mp, "images").await?;
    if files.is_empty() {
        return Err(AppError::validation("No images provided."));
    }

    let prefix = format!("properties/{}", id);
    let mut keys = Vec::with_capacity(files.len());
    for file in files {
        match put_upload(state.storage.as_ref(), &prefix, file).await {
            Ok(key) => keys.push(key),
            Err(e) => {
                error!(error = %e, property_id = %id, "image upload failed");
                delete_orphans(state.storage.as_ref(), &keys).await;
                return Err(AppError::Internal(e));
            }
        }
    }

    let stored = async {
        let mut tx = state.db.begin().await?;
        let images = repo::insert_images_tx(&mut tx, id, &keys).await?;
        tx.commit().await?;
        anyhow::Ok(images)
    }
    .await;

    let images = match stored {
        Ok(images) => images,
        Err(e) => {
            error!(error = %e, property_id = %id, "saving image rows failed");
            delete_orphans(state.storage.as_ref(), &keys).await;
            return Err(AppError::Internal(e));
        }
    };

    info!(property_id = %id, count = images.len(), "property images added");
    Ok((
        StatusCode::CREATED,
        Json(
            images
                .into_iter()
                .map(|i| services::image(i, &links))
                .collect(),
        ),
    ))
}

#[instrument(skip(state))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<(StatusCode, Json<FavoriteToggleResponse>)> {
    let store = PgRelationStore::new(state.db.clone());
    let outcome = toggle(&store, Relation::Favorite, user_id, id).await?;
    info!(property_id = %id, %user_id, favorited = outcome.active, "favorite toggled");
    let status = if outcome.active {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(FavoriteToggleResponse {
            favorited: outcome.active,
        }),
    ))
}

#[instrument(skip(state, links, params))]
pub async fn my_favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> AppResult<Json<Vec<FavoriteResponse>>> {
    let page = Page::from_params(&params)?;
    let rows = repo::list_favorites(&state.db, user_id, page).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| services::favorite(r, &links))
            .collect(),
    ))
}
