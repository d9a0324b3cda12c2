//! Model bundle provisioning.
//!
//! # Data Flow
//! ```text
//! ensure_assets(mount)
//!     ├─ mount non-empty ─────────────────────────→ SharedMount (no I/O)
//!     ├─ no bucket/key ───────────────────────────→ false, logged
//!     ├─ local dir non-empty ─────────────────────→ AlreadyExtracted
//!     └─ source.rs: stream object → staging/archive
//!            → archive.rs: extract into staging/bundle (blocking pool)
//!            → rename staging/bundle → local dir
//!        then symlink mount → local dir
//! ```
//!
//! # Design Decisions
//! - A non-empty directory means "provisioned"; nothing is ever deleted
//! - Provisioning failures are logged and never abort backend startup
//! - Calls are serialised behind an async mutex and published by rename

pub mod archive;
pub mod provisioner;
pub mod source;

use std::path::PathBuf;
use thiserror::Error;

pub use archive::{extract_stream, extract_tar_gz, resolve_within, ExtractReport};
pub use provisioner::{link_shared_mount, AssetProvisioner, ProvisionOutcome};
pub use source::{ArchiveSource, S3ArchiveSource};

/// Archive fetch or extraction failure.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("no archive location configured (bucket and key are required)")]
    NotConfigured,

    #[error("failed to download {location}: {reason}")]
    Download { location: String, reason: String },

    #[error("cannot open archive {path}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ProvisioningError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
