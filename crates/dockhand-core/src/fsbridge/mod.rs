//! Container filesystem bridge
//!
//! Lets callers read, list, download and write files "inside" a container by
//! choosing between two access strategies per request:
//!
//! - **mount-backed**: the requested path falls under a bind mount's
//!   destination, so the file is reached directly on the host filesystem
//!   (through the configured host root) without entering the container;
//! - **exec-backed**: no mount matches, so the path is probed with shell
//!   commands inside the container and writes go through archive upload.
//!
//! Both strategies present the same external contract. Each operation is
//! stateless; mount metadata is fetched fresh per call and never cached
//! (mounts change when a container is recreated).

pub mod archive;
pub mod mounts;
pub mod probe;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::runtime::{ArchiveStream, ContainerRuntime};

pub use archive::build_single_file_archive;
pub use mounts::{map_to_host, resolve, validate_request_path, ResolvedTarget};
pub use probe::{
    DirectoryEntry, EntryType, FileContent, PathView, Prober, MAX_TEXT_FILE_SIZE,
};

/// How a download is delivered to the transport layer.
pub enum Download {
    /// Mount-backed: serve the host file directly under its original name.
    HostFile {
        /// Absolute path under the host root
        host_path: PathBuf,
        /// Original basename of the requested path
        filename: String,
    },
    /// Exec-backed: a single-entry tar stream fetched from the container.
    Archive {
        /// Tar byte stream
        stream: ArchiveStream,
        /// `<basename>.tar`
        filename: String,
    },
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Download::HostFile {
                host_path,
                filename,
            } => f
                .debug_struct("HostFile")
                .field("host_path", host_path)
                .field("filename", filename)
                .finish(),
            Download::Archive { filename, .. } => f
                .debug_struct("Archive")
                .field("filename", filename)
                .finish_non_exhaustive(),
        }
    }
}

/// Which mechanism served a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Overwrote the resolved host file
    HostMount,
    /// Uploaded a single-file archive into the container
    ArchiveUpload,
}

/// The filesystem bridge orchestrator.
pub struct FsBridge {
    runtime: Arc<dyn ContainerRuntime>,
    host_root: PathBuf,
}

impl FsBridge {
    /// Create a bridge over `runtime`, mapping host paths under `host_root`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, host_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            host_root: host_root.into(),
        }
    }

    /// Read a file or list a directory at `path` inside the container.
    #[instrument(skip(self), fields(container = %container_id))]
    pub async fn browse(&self, container_id: &str, path: &str) -> Result<PathView> {
        validate_request_path(path)?;
        let info = self.runtime.inspect(container_id).await?;

        let Some(target) = resolve(&info.mounts, path) else {
            debug!(path = %path, "no mount match, probing in container");
            let prober = Prober::new(self.runtime.as_ref(), container_id);
            return prober.probe(path, &info.mounts).await;
        };

        let host_path = map_to_host(target.mount, &target.relative_path, &self.host_root)?;
        let meta = tokio::fs::metadata(&host_path).await.map_err(|_| {
            Error::PathNotFound(format!(
                "path not found on host: {}",
                display_unrooted(target.mount, &target.relative_path)
            ))
        })?;

        if meta.is_file() {
            Ok(PathView::File(self.read_host_file(&host_path, &meta).await?))
        } else if meta.is_dir() {
            Ok(PathView::Listing(self.scan_host_dir(&host_path).await?))
        } else {
            Err(Error::NotADirectory(path.to_string()))
        }
    }

    /// Download `path` either as a raw host file or as a tar stream.
    #[instrument(skip(self), fields(container = %container_id))]
    pub async fn download(&self, container_id: &str, path: &str) -> Result<Download> {
        validate_request_path(path)?;
        let info = self.runtime.inspect(container_id).await?;

        if let Some(target) = resolve(&info.mounts, path) {
            let host_path = map_to_host(target.mount, &target.relative_path, &self.host_root)?;
            if let Ok(meta) = tokio::fs::metadata(&host_path).await {
                if meta.is_dir() {
                    return Err(Error::IsADirectory(
                        "cannot download a directory directly, specify a file".to_string(),
                    ));
                }
                if meta.is_file() {
                    return Ok(Download::HostFile {
                        host_path,
                        filename: basename(path).to_string(),
                    });
                }
            }
            // Resolved host path absent: fall through to the archive fetch,
            // the container may still have the file on a lower layer.
        }

        let stream = self.runtime.get_archive(container_id, path).await?;
        Ok(Download::Archive {
            stream,
            filename: format!("{}.tar", basename(path)),
        })
    }

    /// Overwrite `path` inside the container with `content`.
    #[instrument(skip(self, content), fields(container = %container_id))]
    pub async fn write(
        &self,
        container_id: &str,
        path: &str,
        content: &str,
    ) -> Result<WriteOutcome> {
        validate_request_path(path)?;
        let info = self.runtime.inspect(container_id).await?;

        if let Some(target) = resolve(&info.mounts, path) {
            let host_path = map_to_host(target.mount, &target.relative_path, &self.host_root)?;

            let parent = host_path
                .parent()
                .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
            match tokio::fs::metadata(parent).await {
                Ok(meta) if meta.is_dir() => {}
                _ => {
                    return Err(Error::ParentDirectoryMissing(format!(
                        "parent directory not found on host: {}",
                        parent.display()
                    )))
                }
            }

            tokio::fs::write(&host_path, content).await?;
            return Ok(WriteOutcome::HostMount);
        }

        // Exec-backed write: verify the in-container parent first, then
        // upload a single-file archive into it.
        let parent = dirname(path);
        let prober = Prober::new(self.runtime.as_ref(), container_id);
        if !prober.is_dir(parent).await? {
            return Err(Error::ParentDirectoryMissing(format!(
                "parent directory does not exist inside container: {parent}"
            )));
        }

        let archive = build_single_file_archive(basename(path), content)?;
        self.runtime
            .put_archive(container_id, parent, Bytes::from(archive))
            .await?;
        Ok(WriteOutcome::ArchiveUpload)
    }

    async fn read_host_file(
        &self,
        host_path: &Path,
        meta: &std::fs::Metadata,
    ) -> Result<FileContent> {
        if meta.len() > MAX_TEXT_FILE_SIZE {
            return Err(Error::TooLarge {
                max: MAX_TEXT_FILE_SIZE,
            });
        }
        let bytes = tokio::fs::read(host_path).await?;
        let content = String::from_utf8(bytes).map_err(|_| Error::BinaryNotSupported)?;
        Ok(FileContent { content })
    }

    /// Enumerate host directory entries. Everything under a resolved mount
    /// is mount-backed, so entries report `is_mounted = true`.
    async fn scan_host_dir(&self, host_path: &Path) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(host_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let file_type = meta.file_type();
            // entry.metadata() does not follow symlinks; classify through
            // the link target so a symlinked directory lists as a directory.
            // A dangling link falls back to the link's own metadata.
            let is_dir = match tokio::fs::metadata(entry.path()).await {
                Ok(target) => target.is_dir(),
                Err(_) => meta.is_dir(),
            };
            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                entry_type: if is_dir {
                    EntryType::Directory
                } else {
                    EntryType::File
                },
                size: meta.len(),
                modified: modified_secs(&meta),
                is_symlink: file_type.is_symlink(),
                is_mounted: true,
            });
        }
        Ok(entries)
    }
}

/// Basename of an absolute container path ("" only for "/").
pub(crate) fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Parent directory of an absolute container path.
pub(crate) fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

fn modified_secs(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn display_unrooted(mount: &crate::runtime::MountRecord, relative: &str) -> String {
    if relative.is_empty() {
        mount.source.clone()
    } else {
        format!("{}/{}", mount.source.trim_end_matches('/'), relative)
    }
}
