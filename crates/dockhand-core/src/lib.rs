//! Dockhand Core - Docker Management Engine
//!
//! This crate provides the core logic for the dockhand API server:
//! - Runtime: Docker daemon client abstraction (bollard)
//! - FsBridge: container filesystem access via bind mounts or in-container exec
//! - Events: daemon event fan-out over an in-process broadcast bus
//! - Keys: API key persistence (SQLite)
//! - Summary: lightweight container projections for dashboards
//! - RunCommand: `docker run` command-string parsing
//! - Update: deployment update checks against the git remote

#![forbid(unsafe_code)]

pub mod error;
pub mod events;
pub mod fsbridge;
pub mod keys;
pub mod run_command;
pub mod runtime;
pub mod summary;
pub mod update;

pub use error::{Error, Result};
pub use events::{spawn_event_listener, EventBus, RuntimeEvent};
pub use fsbridge::{
    DirectoryEntry, Download, EntryType, FileContent, FsBridge, PathView, WriteOutcome,
    MAX_TEXT_FILE_SIZE,
};
pub use keys::{ApiKey, ApiKeyStore};
pub use run_command::{parse_run_command, PortMapping, RunRequest};
pub use runtime::{
    connect_docker, ContainerInfo, ContainerRuntime, DockerRuntime, ExecOutput, MountRecord,
};
pub use summary::{
    current_container_id, ids_match, summarize, ContainerSummary, COMPOSE_PROJECT_LABEL,
};
pub use update::{spawn_update_checker, UpdateCheckerConfig, UpdateStatus};
