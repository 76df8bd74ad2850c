use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, FromRef, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, Detail, LoginRequest, ProfileUpdateRequest, RefreshRequest,
            RegisterRequest, TokenPair, UserResponse,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{
            hash_password, is_valid_email, username_from_email, verify_password,
            MIN_PASSWORD_LEN,
        },
        repo::{is_revoked, revoke_token},
        repo_types::{ProfileChanges, User},
    },
    error::{AppError, AppResult},
    extract::AppJson,
    media::{read_image_fields, MediaLinks},
    state::AppState,
    storage::{delete_orphans, put_upload},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/token/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_me).patch(update_profile))
        .route(
            "/profile/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
}

fn issue_pair(keys: &JwtKeys, user: &User) -> AppResult<TokenPair> {
    let access = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;
    Ok(TokenPair { access, refresh })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[instrument(skip(state, links, payload))]
pub async fn register(
    State(state): State<AppState>,
    links: MediaLinks,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("Enter a valid email address."));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation(format!(
            "Password must contain at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    if payload.password != payload.password2 {
        return Err(AppError::validation("Passwords do not match."));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered.".into()));
    }

    let hash = hash_password(&payload.password)?;
    let username = username_from_email(&payload.email);
    let user = User::create(
        &state.db,
        payload.name.trim(),
        &payload.email,
        &username,
        &hash,
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already registered.".into())
        } else {
            AppError::from(e)
        }
    })?;

    let pair = issue_pair(&JwtKeys::from_ref(&state), &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access: pair.access,
            refresh: pair.refresh,
            user: UserResponse::from_user(user, &links),
        }),
    ))
}

#[instrument(skip(state, links, payload))]
pub async fn login(
    State(state): State<AppState>,
    links: MediaLinks,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();
    let invalid = || AppError::Unauthorized("No active account found with the given credentials.".into());

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(invalid());
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let pair = issue_pair(&JwtKeys::from_ref(&state), &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        access: pair.access,
        refresh: pair.refresh,
        user: UserResponse::from_user(user, &links),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh)
        .map_err(|_| AppError::Unauthorized("Token is invalid or expired.".into()))?;

    if is_revoked(&state.db, claims.jti).await? {
        warn!(user_id = %claims.sub, "revoked refresh token presented");
        return Err(AppError::Unauthorized("Token is invalid or expired.".into()));
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;

    Ok(Json(issue_pair(&keys, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<RefreshRequest>,
) -> AppResult<Json<Detail>> {
    let claims = JwtKeys::from_ref(&state)
        .verify_refresh(&payload.refresh)
        .map_err(|_| AppError::validation("Invalid or expired token."))?;
    if claims.sub != user_id {
        return Err(AppError::validation("Invalid or expired token."));
    }

    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .map_err(|e| AppError::Internal(e.into()))?;
    revoke_token(&state.db, claims.jti, expires_at).await?;

    info!(%user_id, "user logged out");
    Ok(Json(Detail {
        detail: "Successfully logged out.",
    }))
}

#[instrument(skip(state, links))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
) -> AppResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, user_id).await?.ok_or_else(|| {
        error!(%user_id, "token subject has no user row");
        AppError::Unauthorized("User not found.".into())
    })?;
    Ok(Json(UserResponse::from_user(user, &links)))
}

#[instrument(skip(state, links, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
    AppJson(payload): AppJson<ProfileUpdateRequest>,
) -> AppResult<Json<UserResponse>> {
    let changes = ProfileChanges {
        name: payload.name.map(|n| n.trim().to_string()),
        phone: payload.phone,
        bio: payload.bio,
        is_agent: payload.is_agent,
    };
    let user = User::update_profile(&state.db, user_id, changes)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;
    info!(%user_id, "profile updated");
    Ok(Json(UserResponse::from_user(user, &links)))
}

#[instrument(skip(state, links, mp))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    links: MediaLinks,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UserResponse>> {
    let mut mp = mp?;
    let Some(file) = read_image_fields(&mut mp, "avatar").await?.into_iter().next() else {
        return Err(AppError::validation("No image provided."));
    };

    let key = put_upload(state.storage.as_ref(), &format!("avatars/{}", user_id), file).await?;
    let Some((user, previous)) = User::set_avatar(&state.db, user_id, &key).await? else {
        delete_orphans(state.storage.as_ref(), &[key]).await;
        return Err(AppError::Unauthorized("User not found.".into()));
    };
    if let Some(previous) = previous {
        delete_orphans(state.storage.as_ref(), &[previous]).await;
    }

    info!(%user_id, avatar = %key, "avatar replaced");
    Ok(Json(UserResponse::from_user(user, &links)))
}
