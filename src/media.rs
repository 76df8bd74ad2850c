use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart},
    http::{header, request::Parts},
};

use crate::{
    error::AppError,
    state::AppState,
    storage::{ext_from_mime, UploadItem},
};

/// Turns stored object keys into absolute URLs for the current request.
///
/// Built per request from `MEDIA_PUBLIC_URL`: used as-is when absolute,
/// otherwise joined with the request's `Host`. With no request context (or no
/// host to join with) every link resolves to `None`.
#[derive(Debug, Clone, Default)]
pub struct MediaLinks {
    base: Option<String>,
}

impl MediaLinks {
    pub fn none() -> Self {
        Self { base: None }
    }

    pub fn from_parts(configured: &str, scheme: &str, host: Option<&str>) -> Self {
        let configured = configured.trim_end_matches('/');
        if configured.starts_with("http://") || configured.starts_with("https://") {
            return Self {
                base: Some(configured.to_string()),
            };
        }
        let base = host.map(|h| {
            let path = configured.trim_start_matches('/');
            if path.is_empty() {
                format!("{}://{}", scheme, h)
            } else {
                format!("{}://{}/{}", scheme, h, path)
            }
        });
        Self { base }
    }

    pub fn resolve(&self, key: Option<&str>) -> Option<String> {
        let base = self.base.as_deref()?;
        let key = key.filter(|k| !k.is_empty())?;
        Some(format!("{}/{}", base, key.trim_start_matches('/')))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MediaLinks {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok());
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        Ok(MediaLinks::from_parts(
            &state.config.media_public_url,
            scheme,
            host,
        ))
    }
}

/// Collects every image file sent under `field` (also accepts `field[]`).
pub async fn read_image_fields(
    mp: &mut Multipart,
    field: &str,
) -> Result<Vec<UploadItem>, AppError> {
    let array_field = format!("{}[]", field);
    let mut files = Vec::new();
    while let Some(part) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = part.name().unwrap_or_default().to_string();
        if name != field && name != array_field {
            continue;
        }
        let content_type = part
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        if ext_from_mime(&content_type).is_none() {
            return Err(AppError::validation(format!(
                "Unsupported image type: {}",
                content_type
            )));
        }
        let body = part
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read upload: {}", e)))?;
        files.push(UploadItem { body, content_type });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_base_ignores_host() {
        let links = MediaLinks::from_parts("https://cdn.example.com/media/", "http", None);
        assert_eq!(
            links.resolve(Some("avatars/a.png")).as_deref(),
            Some("https://cdn.example.com/media/avatars/a.png")
        );
    }

    #[test]
    fn relative_base_is_joined_with_host() {
        let links = MediaLinks::from_parts("/media", "https", Some("api.example.com"));
        assert_eq!(
            links.resolve(Some("properties/p/1.jpg")).as_deref(),
            Some("https://api.example.com/media/properties/p/1.jpg")
        );
    }

    #[test]
    fn no_context_means_no_link() {
        assert_eq!(MediaLinks::none().resolve(Some("avatars/a.png")), None);
        assert_eq!(MediaLinks::from_parts("/media", "http", None).resolve(Some("x")), None);
    }

    #[test]
    fn missing_key_means_no_link() {
        let links = MediaLinks::from_parts("https://cdn.example.com", "http", None);
        assert_eq!(links.resolve(None), None);
        assert_eq!(links.resolve(Some("")), None);
    }
}
