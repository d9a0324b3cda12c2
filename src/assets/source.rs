//! Where model archives come from.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::assets::ProvisioningError;
use crate::config::{ArchiveLocation, AssetConfig};

/// Fetches an archive to a local file.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Write the object at `location` to `destination`, returning bytes written.
    async fn fetch(
        &self,
        location: &ArchiveLocation,
        destination: &Path,
    ) -> Result<u64, ProvisioningError>;
}

/// S3 (or S3-compatible) object storage.
#[derive(Debug, Clone)]
pub struct S3ArchiveSource {
    client: Client,
}

impl S3ArchiveSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS credential chain plus any
    /// region / endpoint overrides.
    pub async fn from_config(config: &AssetConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ArchiveSource for S3ArchiveSource {
    async fn fetch(
        &self,
        location: &ArchiveLocation,
        destination: &Path,
    ) -> Result<u64, ProvisioningError> {
        let download_error = |reason: String| ProvisioningError::Download {
            location: location.to_string(),
            reason,
        };

        tracing::info!(
            location = %location,
            destination = %destination.display(),
            "Downloading model archive"
        );
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| download_error(DisplayErrorContext(&e).to_string()))?;

        let mut body = output.body;
        let mut file = File::create(destination)
            .await
            .map_err(ProvisioningError::io(destination))?;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| download_error(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(ProvisioningError::io(destination))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(ProvisioningError::io(destination))?;

        Ok(written)
    }
}
