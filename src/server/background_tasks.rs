//! Background task startup
//!
//! Long-running tasks spawned once at boot: the daemon event listener that
//! feeds the broadcast bus, and the optional deployment update checker.

use std::sync::Arc;

use tracing::info;

use dockhand_core::{spawn_event_listener, spawn_update_checker, EventBus, UpdateCheckerConfig};

/// Spawn all background tasks.
pub fn spawn_all(
    event_bus: Arc<EventBus>,
    ignored_prefixes: Vec<String>,
    update: UpdateCheckerConfig,
) {
    spawn_event_listener(event_bus, ignored_prefixes);
    info!("Docker event listener started");

    spawn_update_checker(update);
}
