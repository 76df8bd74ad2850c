use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::AppConfig;

/// Object store holding listing photos and avatars.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
        })
    }

    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            &cfg.minio_endpoint,
            &cfg.minio_bucket,
            &cfg.minio_access_key,
            &cfg.minio_secret_key,
            &cfg.minio_region,
        )
        .await
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}

/// Removes objects whose rows are already gone. Failures only leave orphans
/// in the bucket, so they are logged and swallowed.
pub async fn delete_orphans(storage: &dyn StorageClient, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete_object(key).await {
            tracing::warn!(error = %e, %key, "failed to delete orphaned object");
        }
    }
}

/// One file received from a client, ready to be stored.
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Stores `item` under `{prefix}/{id}.{ext}` and returns the key.
pub async fn put_upload(
    storage: &dyn StorageClient,
    prefix: &str,
    item: UploadItem,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), ext);
    storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStorage {
        puts: Mutex<Vec<(String, String)>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageClient for RecordingStorage {
        async fn put_object(&self, key: &str, _b: Bytes, ct: &str) -> anyhow::Result<()> {
            self.puts.lock().unwrap().push((key.to_string(), ct.to_string()));
            Ok(())
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            if key.starts_with("broken/") {
                anyhow::bail!("bucket unavailable");
            }
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn put_upload_keys_by_prefix_and_extension() {
        let storage = RecordingStorage::default();
        let item = UploadItem {
            body: Bytes::from_static(b"png"),
            content_type: "image/png".into(),
        };
        let key = put_upload(&storage, "avatars/u1", item).await.unwrap();
        assert!(key.starts_with("avatars/u1/"));
        assert!(key.ends_with(".png"));
        let puts = storage.puts.lock().unwrap();
        assert_eq!(puts.as_slice(), &[(key.clone(), "image/png".to_string())]);
    }

    #[tokio::test]
    async fn delete_orphans_keeps_going_after_failures() {
        let storage = RecordingStorage::default();
        let keys = vec!["broken/a.jpg".to_string(), "properties/p/b.jpg".to_string()];
        delete_orphans(&storage, &keys).await;
        assert_eq!(
            storage.deletes.lock().unwrap().as_slice(),
            &["properties/p/b.jpg".to_string()]
        );
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }
}
