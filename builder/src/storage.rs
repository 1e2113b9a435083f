use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::region::Region;
use std::path::Path;
use timelapse_common::config::StorageConfig;
use tracing::{debug, error, info};

/// S3-compatible object storage that finished timelapses are uploaded to.
pub struct VideoStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl VideoStorage {
    pub async fn new(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let creds = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(creds);
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        // Self-hosted endpoints (MinIO, RustFS, ...) expect path-style URLs.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        let client = aws_sdk_s3::Client::from_conf(s3_config);

        debug!(
            bucket = config.bucket,
            prefix = config.prefix,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "video storage client ready"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Upload a finished MP4 under `object_key`. Returns the uploaded size.
    pub async fn put_video(&self, object_key: &str, path: &Path) -> Result<u64, StorageError> {
        let mp4_data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(path = %path.display(), "file not found, skipping upload");
                return Err(StorageError::MissingFile(path.display().to_string()));
            }
            Err(e) => return Err(StorageError::ReadFile(path.display().to_string(), e)),
        };
        let size = mp4_data.len() as u64;

        let resp = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .content_type("video/mp4")
            .body(ByteStream::from(mp4_data))
            .send()
            .await
            .map_err(|e| StorageError::PutObject(e.to_string()))?;

        info!(
            bucket = self.bucket,
            key = object_key,
            size,
            etag = resp.e_tag().unwrap_or("-"),
            "uploaded timelapse"
        );
        Ok(size)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    MissingFile(String),
    #[error("failed to read {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to put object: {0}")]
    PutObject(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StorageConfig {
        StorageConfig {
            endpoint: Some("http://127.0.0.1:9".into()),
            bucket: "timelapses".into(),
            prefix: "timelapse/".into(),
            region: "us-east-1".into(),
            access_key: Some("key".into()),
            secret_key: Some("secret".into()),
        }
    }

    #[tokio::test]
    async fn missing_file_is_reported_without_contacting_storage() {
        let storage = VideoStorage::new(&config()).await;
        let dir = tempfile::tempdir().unwrap();
        let err = storage
            .put_video("timelapse/cam/x.mp4", &dir.path().join("absent.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingFile(_)));
        assert_eq!(storage.prefix(), "timelapse/");
    }
}
