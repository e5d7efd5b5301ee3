//! Container summary projection
//!
//! Flattens the runtime's container records into the compact shape the
//! summary endpoints and the summary WebSocket stream return.

use bollard::models::ContainerSummary as RawSummary;
use serde::Serialize;

/// Compose project label set by docker compose
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Compact container summary
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    /// Full container id
    pub id: String,
    /// Primary name
    pub name: String,
    /// Lowercased state ("running", "exited", ...)
    pub status: String,
    /// Compose project, empty when standalone
    pub stack: String,
    /// Image reference
    pub image: String,
    /// "8080->80/tcp, ..." published port summary
    pub ports: String,
    /// Whether this is the container running the service itself
    pub is_self: bool,
}

/// Project a raw runtime summary record.
#[must_use]
pub fn summarize(raw: &RawSummary, self_id: Option<&str>) -> ContainerSummary {
    let id = raw.id.clone().unwrap_or_default();

    let name = raw
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    let stack = raw
        .labels
        .as_ref()
        .and_then(|labels| labels.get(COMPOSE_PROJECT_LABEL))
        .cloned()
        .unwrap_or_default();

    let ports = raw
        .ports
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|p| {
            let public = p.public_port?;
            let proto = p
                .typ
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "tcp".into());
            Some(format!("{}->{}/{}", public, p.private_port, proto))
        })
        .collect::<Vec<_>>()
        .join(", ");

    ContainerSummary {
        is_self: self_id.is_some_and(|self_id| ids_match(&id, self_id)),
        name,
        status: raw.state.clone().unwrap_or_default().to_lowercase(),
        stack,
        image: raw.image.clone().unwrap_or_default(),
        ports,
        id,
    }
}

/// Prefix comparison in both directions: the self id read from the cgroup
/// may be shorter (or, with some runtimes, longer) than the full id.
pub fn ids_match(container_id: &str, self_id: &str) -> bool {
    !container_id.is_empty()
        && !self_id.is_empty()
        && (container_id == self_id
            || container_id.starts_with(self_id)
            || self_id.starts_with(container_id))
}

/// Best-effort detection of the id of the container this service runs in.
///
/// Reads `/proc/self/cgroup` looking for a docker scope, falling back to the
/// hostname (which Docker sets to the short id by default). `None` when the
/// service runs outside a container and neither source yields anything.
#[must_use]
pub fn current_container_id() -> Option<String> {
    if let Ok(cgroup) = std::fs::read_to_string("/proc/self/cgroup") {
        if let Some(id) = container_id_from_cgroup(&cgroup) {
            return Some(id);
        }
    }

    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

fn container_id_from_cgroup(cgroup: &str) -> Option<String> {
    for line in cgroup.lines() {
        if !line.contains("docker") {
            continue;
        }
        let path = line.rsplit(':').next().unwrap_or("");
        let candidate = path
            .trim_end_matches(".scope")
            .rsplit(['/', '-'])
            .next()
            .unwrap_or("");
        if !candidate.is_empty() {
            return Some(candidate.to_string());
        }
    }
    None
}
