//! Mount resolution and host path mapping
//!
//! A container path is "mount-backed" when some bind mount's destination is
//! a prefix of it. Among several eligible mounts the one with the longest
//! normalized destination wins (most specific bind). The residual relative
//! path is then composed onto the mount's host-side source, rooted under the
//! configured host filesystem root.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runtime::MountRecord;

/// Outcome of resolving a requested container path against mount records.
#[derive(Debug, Clone)]
pub struct ResolvedTarget<'a> {
    /// The winning mount
    pub mount: &'a MountRecord,
    /// Requested path relative to the mount destination ("" when equal)
    pub relative_path: String,
}

/// Find the mount whose destination contains `path`, longest destination wins.
///
/// `path` must already be validated as absolute. Destinations and the
/// requested path are compared with trailing slashes stripped. Returns
/// `None` when no mount matches; callers then fall back to in-container
/// probing.
pub fn resolve<'a>(mounts: &'a [MountRecord], path: &str) -> Option<ResolvedTarget<'a>> {
    let path_clean = path.trim_end_matches('/');

    let mut best: Option<(&MountRecord, &str)> = None;
    for mount in mounts {
        // A destination of "/" normalizes to empty. Docker refuses to bind
        // over the container root, so such a record is treated as garbage
        // and skipped rather than matching every path.
        let dest_clean = mount.destination.trim_end_matches('/');
        if dest_clean.is_empty() {
            continue;
        }
        let matches =
            path_clean == dest_clean || path_clean.starts_with(&format!("{dest_clean}/"));
        if !matches {
            continue;
        }
        // Strict comparison: the first of two equal-length destinations wins,
        // which keeps selection deterministic for a given mount order.
        match best {
            Some((_, best_dest)) if dest_clean.len() <= best_dest.len() => {}
            _ => best = Some((mount, dest_clean)),
        }
    }

    best.map(|(mount, dest_clean)| {
        let relative_path = if path_clean == dest_clean {
            String::new()
        } else {
            path_clean[dest_clean.len()..]
                .trim_start_matches('/')
                .to_string()
        };
        ResolvedTarget {
            mount,
            relative_path,
        }
    })
}

/// Map a resolved mount + relative path to an absolute path under `host_root`.
///
/// Fails with [`Error::TraversalDetected`] if any segment of `relative_path`
/// equals `..` — checked before any filesystem access. The result is a pure
/// string/path composition; symlinks are deliberately not canonicalized
/// (the host root is itself a mount namespace we cannot assume symlink-free).
pub fn map_to_host(mount: &MountRecord, relative_path: &str, host_root: &Path) -> Result<PathBuf> {
    if relative_path.split('/').any(|seg| seg == "..") {
        return Err(Error::TraversalDetected);
    }

    let mut host_abs = PathBuf::from(&mount.source);
    if !relative_path.is_empty() {
        host_abs.push(relative_path);
    }

    let stripped = host_abs
        .strip_prefix("/")
        .map(Path::to_path_buf)
        .unwrap_or(host_abs);
    Ok(host_root.join(stripped))
}

/// Validate that a requested path is absolute and traversal-free at the edge.
///
/// Rejects empty paths, relative paths, and paths carrying `..` segments
/// before mount resolution ever runs.
pub fn validate_request_path(path: &str) -> Result<()> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(Error::InvalidPath(format!(
            "path must be absolute (e.g. /data/config.json), got {path:?}"
        )));
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(Error::InvalidPath(
            "path must not contain '..' segments".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount(source: &str, dest: &str) -> MountRecord {
        MountRecord {
            source: source.to_string(),
            destination: dest.to_string(),
            mount_type: "bind".to_string(),
        }
    }

    #[test]
    fn resolves_path_under_mount() {
        let mounts = vec![mount("/srv/app", "/data")];
        let target = resolve(&mounts, "/data/config.json").unwrap();
        assert_eq!(target.mount.source, "/srv/app");
        assert_eq!(target.relative_path, "config.json");
    }

    #[test]
    fn exact_destination_yields_empty_relative_path() {
        let mounts = vec![mount("/srv/app", "/data")];
        let target = resolve(&mounts, "/data").unwrap();
        assert_eq!(target.relative_path, "");
    }

    #[test]
    fn trailing_slashes_are_normalized() {
        let mounts = vec![mount("/srv/app", "/data/")];
        let target = resolve(&mounts, "/data/sub/").unwrap();
        assert_eq!(target.relative_path, "sub");
    }

    #[test]
    fn longest_destination_wins() {
        let mounts = vec![
            mount("/srv/app", "/data"),
            mount("/srv/app/sub", "/data/sub"),
        ];
        let target = resolve(&mounts, "/data/sub/x.txt").unwrap();
        assert_eq!(target.mount.source, "/srv/app/sub");
        assert_eq!(target.relative_path, "x.txt");
    }

    #[test]
    fn sibling_prefix_does_not_match() {
        // "/databases" must not match the "/data" mount
        let mounts = vec![mount("/srv/app", "/data")];
        assert!(resolve(&mounts, "/databases/x").is_none());
    }

    #[test]
    fn equal_length_destinations_pick_deterministically() {
        let mounts = vec![mount("/srv/a", "/data"), mount("/srv/b", "/data")];
        let first = resolve(&mounts, "/data/x").unwrap().mount.source.clone();
        for _ in 0..8 {
            assert_eq!(resolve(&mounts, "/data/x").unwrap().mount.source, first);
        }
    }

    #[test]
    fn root_destination_mount_is_skipped() {
        let mounts = vec![mount("/srv/whole-disk", "/")];
        assert!(resolve(&mounts, "/etc/passwd").is_none());
    }

    #[test]
    fn no_match_returns_none() {
        let mounts = vec![mount("/srv/app", "/data")];
        assert!(resolve(&mounts, "/etc/nginx/nginx.conf").is_none());
    }

    #[test]
    fn maps_to_host_root() {
        let m = mount("/srv/app", "/data");
        let host = map_to_host(&m, "config.json", Path::new("/hostfs")).unwrap();
        assert_eq!(host, PathBuf::from("/hostfs/srv/app/config.json"));
    }

    #[test]
    fn maps_mount_root_itself() {
        let m = mount("/srv/app", "/data");
        let host = map_to_host(&m, "", Path::new("/hostfs")).unwrap();
        assert_eq!(host, PathBuf::from("/hostfs/srv/app"));
    }

    #[test]
    fn rejects_dotdot_segments_before_io() {
        let m = mount("/srv/app", "/data");
        let err = map_to_host(&m, "../etc/passwd", Path::new("/hostfs")).unwrap_err();
        assert!(matches!(err, Error::TraversalDetected));

        let err = map_to_host(&m, "sub/../../x", Path::new("/hostfs")).unwrap_err();
        assert!(matches!(err, Error::TraversalDetected));
    }

    #[test]
    fn dotdot_as_substring_is_allowed() {
        let m = mount("/srv/app", "/data");
        let host = map_to_host(&m, "my..file", Path::new("/hostfs")).unwrap();
        assert_eq!(host, PathBuf::from("/hostfs/srv/app/my..file"));
    }

    #[test]
    fn validates_request_paths() {
        assert!(validate_request_path("/data").is_ok());
        assert!(matches!(
            validate_request_path(""),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            validate_request_path("data/x"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            validate_request_path("/../etc/passwd"),
            Err(Error::InvalidPath(_))
        ));
    }
}
