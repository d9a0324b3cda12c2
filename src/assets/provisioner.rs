//! Idempotent model bundle provisioning.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::assets::archive::{extract_tar_gz, ExtractReport};
use crate::assets::source::ArchiveSource;
use crate::assets::ProvisioningError;
use crate::config::{ArchiveLocation, AssetConfig};
use crate::supervisor::Preparation;

/// How the bundle became available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The shared mount already held files.
    SharedMount,
    /// The ephemeral directory already held files; nothing was fetched.
    AlreadyExtracted,
    /// The archive was downloaded and extracted.
    Extracted { bytes: u64, report: ExtractReport },
}

/// Makes the model bundle visible at the conventional mount path.
pub struct AssetProvisioner {
    config: AssetConfig,
    source: Option<Arc<dyn ArchiveSource>>,
    gate: Mutex<()>,
}

impl AssetProvisioner {
    pub fn new(config: AssetConfig, source: Option<Arc<dyn ArchiveSource>>) -> Self {
        Self {
            config,
            source,
            gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// `true` when assets are present at `mount_path` (directly or via the
    /// compatibility link). Failures are logged, never raised.
    pub async fn ensure_assets(&self, mount_path: &Path) -> bool {
        match self.provision(mount_path).await {
            Ok(outcome) if has_entries(mount_path).await => {
                tracing::info!(
                    mount = %mount_path.display(),
                    outcome = ?outcome,
                    "Model assets available"
                );
                true
            }
            Ok(outcome) => {
                tracing::warn!(
                    mount = %mount_path.display(),
                    local = %self.config.local_dir.display(),
                    outcome = ?outcome,
                    "Model assets available only in the local directory"
                );
                false
            }
            Err(ProvisioningError::NotConfigured) => {
                tracing::warn!(
                    mount = %mount_path.display(),
                    "Shared mount is empty and no archive is configured; continuing without assets"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    mount = %mount_path.display(),
                    error = %e,
                    "Model provisioning failed"
                );
                false
            }
        }
    }

    pub async fn provision(
        &self,
        mount_path: &Path,
    ) -> Result<ProvisionOutcome, ProvisioningError> {
        let _guard = self.gate.lock().await;

        if has_entries(mount_path).await {
            return Ok(ProvisionOutcome::SharedMount);
        }
        let (location, source) = self.archive()?;

        let local = self.config.local_dir.clone();
        let outcome = if has_entries(&local).await {
            tracing::info!(
                local = %local.display(),
                "Ephemeral model directory already populated; skipping download"
            );
            ProvisionOutcome::AlreadyExtracted
        } else {
            let (bytes, report) = self.download_and_publish(source, &location, &local).await?;
            ProvisionOutcome::Extracted { bytes, report }
        };

        if !link_shared_mount(mount_path, &local).await {
            tracing::warn!(
                mount = %mount_path.display(),
                local = %local.display(),
                "Mount path does not point at the local models"
            );
        }
        Ok(outcome)
    }

    /// Populate the shared mount itself from object storage. Operator path,
    /// run once so later instances find the mount non-empty.
    pub async fn seed_shared_mount(
        &self,
        mount_path: &Path,
    ) -> Result<ProvisionOutcome, ProvisioningError> {
        let _guard = self.gate.lock().await;
        let (location, source) = self.archive()?;

        if fs::metadata(mount_path).await.is_err() {
            tracing::info!(mount = %mount_path.display(), "Mount path not found; creating it");
            fs::create_dir_all(mount_path)
                .await
                .map_err(ProvisioningError::io(mount_path))?;
        }
        if has_entries(mount_path).await {
            tracing::info!(mount = %mount_path.display(), "Mount already populated; skipping seed");
            return Ok(ProvisionOutcome::SharedMount);
        }

        // Download inside the mount so nothing crosses filesystems.
        let scratch = mount_path.join(format!(".download-{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&scratch)
            .await
            .map_err(ProvisioningError::io(&scratch))?;
        let result = async {
            let archive = scratch.join(location.file_name());
            let bytes = source.fetch(&location, &archive).await?;
            let report = extract_blocking(archive, mount_path.to_path_buf()).await?;
            Ok::<_, ProvisioningError>(ProvisionOutcome::Extracted { bytes, report })
        }
        .await;
        discard(&scratch).await;
        result
    }

    fn archive(&self) -> Result<(ArchiveLocation, &Arc<dyn ArchiveSource>), ProvisioningError> {
        match (self.config.archive_location(), &self.source) {
            (Some(location), Some(source)) => Ok((location, source)),
            _ => Err(ProvisioningError::NotConfigured),
        }
    }

    async fn download_and_publish(
        &self,
        source: &Arc<dyn ArchiveSource>,
        location: &ArchiveLocation,
        target: &Path,
    ) -> Result<(u64, ExtractReport), ProvisioningError> {
        let staging = staging_dir(target);
        fs::create_dir_all(&staging)
            .await
            .map_err(ProvisioningError::io(&staging))?;

        let result = async {
            let archive = staging.join(location.file_name());
            let bytes = source.fetch(location, &archive).await?;
            tracing::info!(bytes, archive = %archive.display(), "Model archive downloaded");

            let bundle = staging.join("bundle");
            let report = extract_blocking(archive, bundle.clone()).await?;
            publish(&bundle, target).await?;
            Ok::<_, ProvisioningError>((bytes, report))
        }
        .await;

        discard(&staging).await;
        result
    }
}

impl std::fmt::Debug for AssetProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetProvisioner")
            .field("config", &self.config)
            .field("source", &self.source.is_some())
            .finish()
    }
}

#[async_trait]
impl Preparation for AssetProvisioner {
    async fn prepare(&self) {
        let mount = self.config.mount_path.clone();
        self.ensure_assets(&mount).await;
    }
}

/// Point `mount_path` at `local_dir` unless the mount already serves files.
/// An empty mount directory is replaced; anything else is left alone.
pub async fn link_shared_mount(mount_path: &Path, local_dir: &Path) -> bool {
    match fs::symlink_metadata(mount_path).await {
        Ok(meta) if meta.file_type().is_symlink() => {
            return match fs::read_link(mount_path).await {
                Ok(existing) if existing == local_dir => true,
                Ok(existing) => {
                    tracing::warn!(
                        mount = %mount_path.display(),
                        points_to = %existing.display(),
                        "Mount path is a link elsewhere; leaving it"
                    );
                    false
                }
                Err(e) => {
                    tracing::warn!(
                        mount = %mount_path.display(),
                        error = %e,
                        "Cannot read mount link"
                    );
                    false
                }
            };
        }
        Ok(meta) if meta.is_dir() => {
            if has_entries(mount_path).await {
                return true;
            }
            if let Err(e) = fs::remove_dir(mount_path).await {
                tracing::warn!(
                    mount = %mount_path.display(),
                    error = %e,
                    "Cannot replace empty mount directory"
                );
                return false;
            }
        }
        Ok(_) => {
            tracing::warn!(
                mount = %mount_path.display(),
                "Mount path exists and is not a directory"
            );
            return false;
        }
        Err(_) => {}
    }

    if let Some(parent) = mount_path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            tracing::warn!(parent = %parent.display(), error = %e, "Cannot create mount parent");
            return false;
        }
    }

    match symlink(local_dir, mount_path).await {
        Ok(()) => {
            tracing::info!(
                mount = %mount_path.display(),
                local = %local_dir.display(),
                "Linked shared mount to local models"
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                mount = %mount_path.display(),
                error = %e,
                "Failed to create compatibility link"
            );
            false
        }
    }
}

#[cfg(unix)]
async fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink(original, link).await
}

#[cfg(not(unix))]
async fn symlink(_original: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "directory links are only supported on unix",
    ))
}

async fn has_entries(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

async fn extract_blocking(
    archive: PathBuf,
    target: PathBuf,
) -> Result<ExtractReport, ProvisioningError> {
    tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &target))
        .await
        .map_err(|e| ProvisioningError::Task(e.to_string()))?
}

/// Move the finished bundle into place. A target that gained files in the
/// meantime wins and the staged copy is dropped.
async fn publish(bundle: &Path, target: &Path) -> Result<(), ProvisioningError> {
    if has_entries(target).await {
        tracing::info!(
            target = %target.display(),
            "Target populated concurrently; discarding staged bundle"
        );
        return Ok(());
    }
    if fs::metadata(target).await.is_ok() {
        fs::remove_dir(target).await.map_err(ProvisioningError::io(target))?;
    }
    match fs::rename(bundle, target).await {
        Ok(()) => Ok(()),
        Err(_) if has_entries(target).await => Ok(()),
        Err(e) => Err(ProvisioningError::Io {
            path: target.to_path_buf(),
            source: e,
        }),
    }
}

fn staging_dir(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "models".to_string());
    target.with_file_name(format!(".{}.staging-{}", name, Uuid::new_v4().simple()))
}

async fn discard(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir).await {
        tracing::debug!(dir = %dir.display(), error = %e, "Could not remove scratch directory");
    }
}
