use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::error::AppError;

/// Authenticated caller. Rejects the request when no valid access token is sent.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Caller identity on public endpoints: `None` for anonymous requests.
///
/// A token that is sent but invalid still rejects the request.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<Uuid>);

fn bearer_user(parts: &Parts, keys: &JwtKeys) -> Result<Option<Uuid>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    if claims.kind != TokenKind::Access {
        return Err(AppError::Unauthorized("Access token required".into()));
    }
    Ok(Some(claims.sub))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        bearer_user(parts, &keys)?
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeAuthUser(bearer_user(parts, &keys)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = auth {
            builder = builder.header("authorization", v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_user_accepts_access_token() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign_access(user_id).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        let AuthUser(got) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authorized");
        assert_eq!(got, user_id);
    }

    #[tokio::test]
    async fn auth_user_requires_header() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn auth_user_rejects_refresh_token() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Access token required");
    }

    #[tokio::test]
    async fn maybe_auth_user_is_anonymous_without_header() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let MaybeAuthUser(got) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn maybe_auth_user_rejects_garbage_token() {
        let state = AppState::fake();
        let mut parts = parts_with(Some("Bearer not-a-jwt"));
        let err = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
