//! In-container probing via shell execution
//!
//! Used when a requested path is not backed by any bind mount. The container
//! offers no structured filesystem API, so classification and listing go
//! through `/bin/sh` one-liners and the output is parsed here.
//!
//! Directory listings try two strategies in order:
//! 1. a `stat`-per-entry loop emitting `name|size|mtime|type` lines
//!    (delimiter-safe, typed fields), and
//! 2. a heuristic `ls -la` parser for minimal images without `stat`,
//!    which is lossy (no mtime) and skips lines it cannot make sense of.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, MountRecord};

/// Largest file the bridge will return as text.
pub const MAX_TEXT_FILE_SIZE: u64 = 1024 * 1024;

/// Entry type in a directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

/// One entry of a directory listing
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    /// Entry name (no path)
    pub name: String,
    /// file or directory
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Size in bytes
    pub size: u64,
    /// Modification time in unix seconds, 0 when unknown
    pub modified: i64,
    /// Whether the entry is a symlink
    pub is_symlink: bool,
    /// Whether the entry is itself a mount destination of the container
    pub is_mounted: bool,
}

/// Text content of a file (<= [`MAX_TEXT_FILE_SIZE`])
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    /// UTF-8 file content
    pub content: String,
}

/// What a probed path turned out to be
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PathView {
    /// Regular file content
    File(FileContent),
    /// Directory listing (ordering is whatever the enumeration yielded)
    Listing(Vec<DirectoryEntry>),
}

/// Quote a path for safe interpolation into a `/bin/sh -c` command.
pub(crate) fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}

/// Prober over a single container.
pub struct Prober<'a> {
    runtime: &'a dyn ContainerRuntime,
    container_id: &'a str,
}

impl<'a> Prober<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, container_id: &'a str) -> Self {
        Self {
            runtime,
            container_id,
        }
    }

    /// In-container `test -d`.
    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        let out = self
            .runtime
            .exec(self.container_id, &format!("test -d {}", shell_quote(path)))
            .await?;
        Ok(out.success())
    }

    /// In-container `test -f`.
    pub async fn is_file(&self, path: &str) -> Result<bool> {
        let out = self
            .runtime
            .exec(self.container_id, &format!("test -f {}", shell_quote(path)))
            .await?;
        Ok(out.success())
    }

    /// Classify `path` and return either its content or a listing.
    pub async fn probe(&self, path: &str, mounts: &[MountRecord]) -> Result<PathView> {
        if self.is_dir(path).await? {
            return Ok(PathView::Listing(self.list_dir(path, mounts).await?));
        }
        if self.is_file(path).await? {
            return Ok(PathView::File(self.read_file(path).await?));
        }
        // Neither test passed; the listing path reports the shell's own
        // diagnostic if the path truly does not exist.
        Ok(PathView::Listing(self.list_dir(path, mounts).await?))
    }

    /// Read a regular file as text, enforcing the size cap.
    pub async fn read_file(&self, path: &str) -> Result<FileContent> {
        // Size first, best effort: if stat itself fails we still try the read.
        let size_out = self
            .runtime
            .exec(
                self.container_id,
                &format!("stat -c %s {}", shell_quote(path)),
            )
            .await?;
        if size_out.success() {
            if let Ok(size) = size_out.text().trim().parse::<u64>() {
                if size > MAX_TEXT_FILE_SIZE {
                    return Err(Error::TooLarge {
                        max: MAX_TEXT_FILE_SIZE,
                    });
                }
            }
        }

        let cat_out = self
            .runtime
            .exec(self.container_id, &format!("cat {}", shell_quote(path)))
            .await?;
        if !cat_out.success() {
            return Err(Error::Runtime(format!(
                "error reading file: {}",
                cat_out.text()
            )));
        }

        let content =
            String::from_utf8(cat_out.output).map_err(|_| Error::BinaryNotSupported)?;
        Ok(FileContent { content })
    }

    /// List the immediate children of `path`.
    pub async fn list_dir(
        &self,
        path: &str,
        mounts: &[MountRecord],
    ) -> Result<Vec<DirectoryEntry>> {
        let destinations: HashSet<String> = mounts
            .iter()
            .map(|m| m.destination.trim_end_matches('/').to_string())
            .collect();

        let path_clean = path.trim_end_matches('/');

        // Primary strategy: per-entry stat with a pipe delimiter.
        let stat_cmd = format!(
            "for f in {}/*; do stat -c '%n|%s|%Y|%F' \"$f\" 2>/dev/null; done",
            shell_quote(path_clean)
        );
        let stat_out = self.runtime.exec(self.container_id, &stat_cmd).await?;
        if stat_out.success() {
            let text = stat_out.text();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(parse_stat_listing(trimmed, &destinations));
            }
        }

        debug!(
            container = %self.container_id,
            path = %path,
            "stat listing unavailable, falling back to ls -la"
        );

        // Fallback strategy: parse long-format ls output heuristically.
        let ls_out = self
            .runtime
            .exec(self.container_id, &format!("ls -la {}", shell_quote(path)))
            .await?;
        if !ls_out.success() {
            return Err(Error::PathNotFound(format!(
                "path not found or not accessible inside container: {}",
                ls_out.text().trim()
            )));
        }

        Ok(parse_ls_listing(&ls_out.text(), path_clean, &destinations))
    }
}

/// Parse `name|size|mtime|type` lines produced by the stat loop.
///
/// Fields are taken from the right so a name that somehow contains the
/// delimiter still parses. Lines with fewer than four fields are skipped.
pub(crate) fn parse_stat_listing(
    output: &str,
    mount_destinations: &HashSet<String>,
) -> Vec<DirectoryEntry> {
    let mut items = Vec::new();
    for line in output.lines() {
        let mut fields = line.rsplitn(4, '|');
        let (Some(type_desc), Some(mtime), Some(size), Some(full_path)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            continue;
        };
        let Ok(size) = size.parse::<u64>() else {
            continue;
        };
        let modified = mtime.parse::<i64>().unwrap_or(0);

        let type_desc = type_desc.to_lowercase();
        let entry_type = if type_desc.contains("directory") {
            EntryType::Directory
        } else {
            EntryType::File
        };
        let is_symlink = type_desc.contains("link");

        let name = full_path
            .rsplit('/')
            .next()
            .unwrap_or(full_path)
            .to_string();
        // Nested mounts one level down: exact match on the qualified path.
        let is_mounted = mount_destinations.contains(full_path.trim_end_matches('/'));

        items.push(DirectoryEntry {
            name,
            entry_type,
            size,
            modified,
            is_symlink,
            is_mounted,
        });
    }
    items
}

/// Heuristic parser for long-format `ls -la` output.
///
/// First character of the permission field decides directory/symlink/file;
/// the size is column 4; the name is everything from column 8 on, rejoined
/// with single spaces (filenames may contain whitespace) and truncated at
/// the ` -> ` symlink arrow. Modification time is not recoverable and is
/// reported as 0. Unparsable lines are skipped, not fatal.
pub(crate) fn parse_ls_listing(
    output: &str,
    dir_path: &str,
    mount_destinations: &HashSet<String>,
) -> Vec<DirectoryEntry> {
    let dir_clean = dir_path.trim_end_matches('/');
    let mut items = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("total ") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 {
            continue;
        }

        let perms = parts[0];
        let is_dir = perms.starts_with('d');
        let is_symlink = perms.starts_with('l');
        let size = parts[4].parse::<u64>().unwrap_or(0);

        let mut name = parts[8..].join(" ");
        if let Some(idx) = name.find(" -> ") {
            name.truncate(idx);
        }
        if name == "." || name == ".." {
            continue;
        }

        let full_path = format!("{dir_clean}/{name}");
        let is_mounted = mount_destinations.contains(full_path.as_str());

        items.push(DirectoryEntry {
            name,
            entry_type: if is_dir {
                EntryType::Directory
            } else {
                EntryType::File
            },
            size,
            modified: 0,
            is_symlink,
            is_mounted,
        });
    }

    items
}
