//! Server module for Dockhand
//!
//! Configuration loading, shared state, and the axum serve loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use dockhand_core::{
    current_container_id, ApiKeyStore, DockerRuntime, EventBus, FsBridge, UpdateCheckerConfig,
};

use crate::Cli;

pub mod background_tasks;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Require API keys on /api/v1 routes
    #[serde(default)]
    pub enabled: bool,
    /// Admin endpoint username; empty disables the admin endpoints
    #[serde(default)]
    pub admin_user: String,
    #[serde(default)]
    pub admin_pass: String,
}

/// Docker daemon access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// Prefix under which bind-mount sources are reachable on this host
    #[serde(default = "default_host_root")]
    pub host_root: PathBuf,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host_root: default_host_root(),
        }
    }
}

fn default_host_root() -> PathBuf {
    PathBuf::from("/hostfs")
}

/// Event broadcast configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventsConfig {
    #[serde(default)]
    pub ignored_prefixes: Vec<String>,
}

/// API key store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/dockhand.db")
}

/// Update checker configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub auto_pull: bool,
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_interval() -> u64 {
    3600
}

/// Shared application state, one instance behind an `Extension` layer.
///
/// Docker connections are deliberately NOT held here: every request opens
/// its own client and drops it when done, so a wedged daemon socket never
/// poisons unrelated requests.
pub struct AppState {
    pub host_root: PathBuf,
    pub key_store: Arc<ApiKeyStore>,
    pub event_bus: Arc<EventBus>,
    pub auth: AuthConfig,
    /// Container id of this process when it runs inside Docker itself
    pub self_id: Option<String>,
}

impl AppState {
    /// Fresh filesystem bridge for one request.
    pub fn bridge(&self) -> dockhand_core::Result<FsBridge> {
        Ok(FsBridge::new(
            Arc::new(DockerRuntime::connect()?),
            self.host_root.clone(),
        ))
    }
}

/// Embedded default configuration (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Load configuration from files and environment
pub(crate) fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") ensures DOCKHAND_SERVER__PORT works (single _
        // after prefix); config-rs 0.14 would otherwise require DOCKHAND__SERVER__PORT.
        .add_source(
            Environment::with_prefix("DOCKHAND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Run the server until shutdown.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let key_store = Arc::new(
        ApiKeyStore::from_path(&config.keys.db_path)
            .await
            .context("Failed to open API key store")?,
    );
    if config.server.auth.enabled && key_store.list().await?.is_empty() {
        let key = key_store.add(None, Some("bootstrap".to_string())).await?;
        info!("Auth enabled with no keys on record, generated bootstrap key: {}", key.key);
    }

    let event_bus = Arc::new(EventBus::default());

    let self_id = current_container_id();
    match &self_id {
        Some(id) => info!(container = %id, "running inside a container"),
        None => info!("running directly on the host"),
    }

    let state = Arc::new(AppState {
        host_root: config.docker.host_root.clone(),
        key_store,
        event_bus: event_bus.clone(),
        auth: config.server.auth.clone(),
        self_id,
    });

    background_tasks::spawn_all(
        event_bus,
        config.events.ignored_prefixes.clone(),
        UpdateCheckerConfig {
            enabled: config.update.enabled,
            repo_dir: config.update.repo_dir.clone(),
            branch: config.update.branch.clone(),
            interval_secs: config.update.interval_secs,
            auto_pull: config.update.auto_pull,
        },
    );

    let app = Router::new()
        // Health endpoint (no auth, for load balancers)
        .route("/health", get(crate::api::system::health_check))
        .route("/", get(|| async { "Dockhand" }))
        // API routes (auth applied per-handler via RequireApiKey extractor)
        .merge(crate::api::api_router())
        // WebSocket routes
        .merge(crate::websocket::websocket_router())
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Dockhand shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8000);
        assert!(!config.server.auth.enabled);
        assert_eq!(config.docker.host_root, PathBuf::from("/hostfs"));
        assert!(!config.update.enabled);
        assert!(config
            .events
            .ignored_prefixes
            .iter()
            .any(|p| p == "exec_create"));
    }
}
