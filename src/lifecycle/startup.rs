//! Cold-start orchestration.
//!
//! # Responsibilities
//! - Build the object-storage client only when an archive is configured
//! - Resolve the backend and assemble the shared `Adapter`
//!
//! # Design Decisions
//! - Nothing here touches the network or the backend; the first
//!   invocation pays for provisioning and launch
//! - Building the adapter never fails; misconfiguration is caught by
//!   config validation before this point

use std::sync::Arc;

use crate::adapter::Adapter;
use crate::assets::{ArchiveSource, S3ArchiveSource};
use crate::backend::AppRegistry;
use crate::config::{AdapterConfig, AssetConfig};

/// Object-storage source for the configured archive, if there is one.
pub async fn archive_source(config: &AssetConfig) -> Option<Arc<dyn ArchiveSource>> {
    let location = config.archive_location()?;
    tracing::info!(
        location = %location,
        endpoint = ?config.endpoint_url,
        "Model archive configured"
    );
    Some(Arc::new(S3ArchiveSource::from_config(config).await))
}

/// Assemble the adapter for this instance.
pub async fn build_adapter(config: &AdapterConfig, registry: &AppRegistry) -> Adapter {
    let source = archive_source(&config.assets).await;
    Adapter::from_config(config, registry, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_archive_means_no_client() {
        assert!(archive_source(&AssetConfig::default()).await.is_none());
    }
}
