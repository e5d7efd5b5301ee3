//! Container runtime client
//!
//! The filesystem bridge consumes the runtime through the narrow
//! [`ContainerRuntime`] trait (inspect, exec, archive transfer) so it can be
//! mocked in tests. [`DockerRuntime`] backs the trait with bollard.
//!
//! Connections are acquired per call (connect, use, drop) rather than held
//! for the lifetime of the service — no pooled connection state is shared
//! between requests.

use async_trait::async_trait;
use bollard::container::DownloadFromContainerOptions;
use bollard::container::UploadToContainerOptions;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::error::{Error, Result};

/// A bind/volume mount record as reported by the runtime for a container.
///
/// Read-only input to the bridge; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    /// Host-side source path
    pub source: String,
    /// Absolute destination path inside the container
    pub destination: String,
    /// Mount type ("bind", "volume", ...)
    pub mount_type: String,
}

/// Container metadata needed by the bridge
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Full container id
    pub id: String,
    /// Container name without the leading `/`
    pub name: String,
    /// Mount records, in runtime order
    pub mounts: Vec<MountRecord>,
    /// Raw inspect attributes
    pub attrs: serde_json::Value,
}

/// Result of a synchronous in-container command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Command exit code (-1 if the runtime did not report one)
    pub exit_code: i64,
    /// Combined stdout/stderr bytes
    pub output: Vec<u8>,
}

impl ExecOutput {
    /// Whether the command exited 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Lossy text view of the output, for diagnostics
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Byte stream of an archive fetched from a container
pub type ArchiveStream = BoxStream<'static, Result<Bytes>>;

/// The runtime surface consumed by the filesystem bridge.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fetch container metadata and mount records.
    async fn inspect(&self, id: &str) -> Result<ContainerInfo>;

    /// Run `script` through `/bin/sh -c` inside the container and wait for it.
    async fn exec(&self, id: &str, script: &str) -> Result<ExecOutput>;

    /// Fetch `path` from the container as a tar stream.
    async fn get_archive(&self, id: &str, path: &str) -> Result<ArchiveStream>;

    /// Upload a tar archive into `directory` inside the container.
    async fn put_archive(&self, id: &str, directory: &str, archive: Bytes) -> Result<()>;
}

/// Connect to the local Docker daemon.
pub fn connect_docker() -> Result<Docker> {
    Docker::connect_with_local_defaults()
        .map_err(|e| Error::Runtime(format!("failed to connect to Docker daemon: {e}")))
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// bollard-backed [`ContainerRuntime`]
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Wrap an existing bollard client
    #[must_use]
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect with local defaults
    pub fn connect() -> Result<Self> {
        Ok(Self::new(connect_docker()?))
    }

    /// Access the underlying bollard client
    #[must_use]
    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        let response = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    Error::ContainerNotFound(id.to_string())
                } else {
                    Error::Runtime(e.to_string())
                }
            })?;

        let mounts = response
            .mounts
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|m| {
                Some(MountRecord {
                    source: m.source.clone()?,
                    destination: m.destination.clone()?,
                    mount_type: m
                        .typ
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "bind".to_string()),
                })
            })
            .collect();

        Ok(ContainerInfo {
            id: response.id.clone().unwrap_or_else(|| id.to_string()),
            name: response
                .name
                .as_deref()
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            mounts,
            attrs: serde_json::to_value(&response)
                .map_err(|e| Error::Runtime(e.to_string()))?,
        })
    }

    async fn exec(&self, id: &str, script: &str) -> Result<ExecOutput> {
        debug!(container = %id, script = %script, "exec in container");

        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions::<String> {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(vec![
                        "/bin/sh".to_string(),
                        "-c".to_string(),
                        script.to_string(),
                    ]),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    Error::ContainerNotFound(id.to_string())
                } else {
                    Error::Runtime(e.to_string())
                }
            })?;

        let mut output = Vec::new();
        // No timeout here: content fetches may legitimately take as long as
        // their size demands. A hung container process will hang the request.
        if let StartExecResults::Attached { output: mut logs, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = logs.next().await {
                output.extend_from_slice(&chunk?.into_bytes());
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            output,
        })
    }

    async fn get_archive(&self, id: &str, path: &str) -> Result<ArchiveStream> {
        let path_owned = path.to_string();
        let mut stream = self
            .docker
            .download_from_container(
                id,
                Some(DownloadFromContainerOptions { path: path_owned.clone() }),
            )
            .map(move |chunk| {
                chunk.map_err(|e| {
                    if is_not_found(&e) {
                        Error::PathNotFound(path_owned.clone())
                    } else {
                        Error::Runtime(e.to_string())
                    }
                })
            });

        // Pull the first chunk eagerly so a missing path surfaces as an
        // error instead of an empty response body.
        match stream.next().await {
            Some(Err(e)) => Err(e),
            Some(Ok(first)) => {
                Ok(futures::stream::once(async move { Ok(first) })
                    .chain(stream)
                    .boxed())
            }
            None => Ok(futures::stream::empty().boxed()),
        }
    }

    async fn put_archive(&self, id: &str, directory: &str, archive: Bytes) -> Result<()> {
        self.docker
            .upload_to_container(
                id,
                Some(UploadToContainerOptions {
                    path: directory.to_string(),
                    ..Default::default()
                }),
                archive,
            )
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    Error::ContainerNotFound(id.to_string())
                } else {
                    Error::UploadFailed(e.to_string())
                }
            })
    }
}
