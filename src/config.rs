use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub minio_region: String,
    /// Base used to turn stored media keys into links. Either absolute
    /// (`https://cdn.example.com/media`) or a path joined with the request host.
    pub media_public_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "hector".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "hector-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let minio_endpoint =
            std::env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into());
        let minio_bucket = std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "hector".into());
        let media_public_url = std::env::var("MEDIA_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/{}", minio_endpoint.trim_end_matches('/'), minio_bucket)
        });

        Ok(Self {
            database_url,
            jwt,
            minio_access_key: std::env::var("MINIO_ACCESS_KEY")
                .unwrap_or_else(|_| "minioadmin".into()),
            minio_secret_key: std::env::var("MINIO_SECRET_KEY")
                .unwrap_or_else(|_| "minioadmin".into()),
            minio_region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            minio_endpoint,
            minio_bucket,
            media_public_url,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
