//! Streaming tar.gz extraction with a path-traversal guard.
//!
//! # Responsibilities
//! - Read the archive entry by entry; never hold it whole in memory
//! - Resolve every member against the target and skip any that escape it
//! - Skip symlinks and hard links whose targets escape the directory
//! - Log and skip members that fail to unpack
//!
//! # Design Decisions
//! - An archive that cannot be opened (missing file, not gzip, not tar)
//!   is a hard failure; a bad member is not
//! - Resolution is lexical, like the member names themselves; `unpack_in`
//!   additionally refuses to write through symlinked parents

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Entry};

use crate::assets::ProvisioningError;

/// Counts from one extraction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractReport {
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExtractReport {
    fn seen(&self) -> usize {
        self.extracted + self.skipped + self.failed
    }
}

/// Extract the gzip-compressed tar archive at `archive` into `target`.
pub fn extract_tar_gz(archive: &Path, target: &Path) -> Result<ExtractReport, ProvisioningError> {
    let file = File::open(archive).map_err(|e| ProvisioningError::ArchiveOpen {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })?;
    extract_stream(BufReader::new(file), target).map_err(|e| match e {
        ProvisioningError::ArchiveOpen { reason, .. } => ProvisioningError::ArchiveOpen {
            path: archive.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Extract a gzip-compressed tar stream into `target`.
pub fn extract_stream<R: Read>(
    reader: R,
    target: &Path,
) -> Result<ExtractReport, ProvisioningError> {
    fs::create_dir_all(target).map_err(|source| ProvisioningError::Io {
        path: target.to_path_buf(),
        source,
    })?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive.entries().map_err(|e| ProvisioningError::ArchiveOpen {
        path: PathBuf::from("<stream>"),
        reason: e.to_string(),
    })?;

    let mut report = ExtractReport::default();
    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) if report.seen() == 0 => {
                return Err(ProvisioningError::ArchiveOpen {
                    path: PathBuf::from("<stream>"),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Archive stream is corrupt; stopping extraction");
                report.failed += 1;
                break;
            }
        };

        let member = match entry.path() {
            Ok(path) => path.into_owned(),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping member with unreadable name");
                report.failed += 1;
                continue;
            }
        };

        if resolve_within(target, &member).is_none()
            || !link_stays_within(target, &member, &entry)
        {
            tracing::warn!(member = %member.display(), "Skipping suspicious member");
            report.skipped += 1;
            continue;
        }

        match entry.unpack_in(target) {
            Ok(true) => report.extracted += 1,
            Ok(false) => {
                tracing::warn!(member = %member.display(), "Skipping member outside target");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(member = %member.display(), error = %e, "Failed to extract member");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        target = %target.display(),
        extracted = report.extracted,
        skipped = report.skipped,
        failed = report.failed,
        "Extraction complete"
    );
    Ok(report)
}

/// Destination of `member` under `target`, or `None` if it would escape.
pub fn resolve_within(target: &Path, member: &Path) -> Option<PathBuf> {
    let mut resolved = target.to_path_buf();
    let mut depth = 0usize;
    for component in member.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

fn link_stays_within<R: Read>(target: &Path, member: &Path, entry: &Entry<'_, R>) -> bool {
    let kind = entry.header().entry_type();
    if !kind.is_symlink() && !kind.is_hard_link() {
        return true;
    }
    let link = match entry.link_name() {
        Ok(Some(link)) => link.into_owned(),
        _ => return false,
    };
    if kind.is_hard_link() {
        // Hard link names are relative to the archive root.
        return resolve_within(target, &link).is_some();
    }
    let base = member.parent().unwrap_or_else(|| Path::new(""));
    resolve_within(target, &base.join(link)).is_some()
}
