//! Runtime event fan-out
//!
//! A broadcast-based bus carries Docker daemon events to WebSocket clients
//! and any internal subscriber. Slow subscribers miss events (lagged) rather
//! than blocking the publisher. A background listener task consumes the
//! daemon's event stream, filters ignored actions, and publishes the rest.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::runtime::connect_docker;

/// A runtime event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeEvent {
    /// Object kind ("container", "image", "network", ...)
    pub event_type: String,
    /// Action ("start", "die", "pull", ...)
    pub action: String,
    /// Id of the object the event concerns
    pub actor_id: String,
    /// Human name of the object, when the daemon reports one
    pub actor_name: Option<String>,
    /// Event time in unix seconds
    pub time: i64,
}

/// Broadcast-based event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: RuntimeEvent) {
        // Send only fails when there are no subscribers; that is fine.
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Whether an action is filtered out by the configured ignore set.
///
/// Prefix comparison: `exec_create` also matches `exec_create: /bin/sh ...`.
fn is_ignored(action: &str, ignored_prefixes: &[String]) -> bool {
    ignored_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && action.starts_with(prefix.as_str()))
}

/// Spawn the daemon event listener.
///
/// Runs until the process exits; a broken event stream is re-established
/// after a short delay. Never shares mutable state with the bridge.
pub fn spawn_event_listener(
    bus: Arc<EventBus>,
    ignored_prefixes: Vec<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let docker = match connect_docker() {
                Ok(docker) => docker,
                Err(e) => {
                    warn!("event listener cannot reach Docker daemon: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            info!("docker event listener connected");
            let mut stream = docker.events::<String>(None);
            while let Some(message) = stream.next().await {
                match message {
                    Ok(event) => {
                        let action = event.action.clone().unwrap_or_default();
                        if is_ignored(&action, &ignored_prefixes) {
                            continue;
                        }
                        let actor = event.actor.unwrap_or_default();
                        let runtime_event = RuntimeEvent {
                            event_type: event
                                .typ
                                .map(|t| t.to_string())
                                .unwrap_or_default(),
                            action,
                            actor_id: actor.id.unwrap_or_default(),
                            actor_name: actor
                                .attributes
                                .as_ref()
                                .and_then(|a| a.get("name").cloned()),
                            time: event.time.unwrap_or_else(|| Utc::now().timestamp()),
                        };
                        debug!(?runtime_event, "publishing runtime event");
                        bus.publish(runtime_event);
                    }
                    Err(e) => {
                        warn!("docker event stream error: {e}");
                        break;
                    }
                }
            }

            warn!("docker event stream ended, reconnecting in 5s");
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec![
            "exec_create".to_string(),
            "exec_start".to_string(),
            "exec_die".to_string(),
        ]
    }

    #[test]
    fn ignore_set_matches_by_prefix() {
        assert!(is_ignored("exec_create: /bin/sh -c ls", &prefixes()));
        assert!(is_ignored("exec_die", &prefixes()));
        assert!(!is_ignored("start", &prefixes()));
        assert!(!is_ignored("die", &prefixes()));
    }

    #[test]
    fn empty_prefix_never_matches() {
        assert!(!is_ignored("start", &[String::new()]));
    }

    #[tokio::test]
    async fn bus_fans_out_to_multiple_subscribers() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(RuntimeEvent {
            event_type: "container".to_string(),
            action: "start".to_string(),
            actor_id: "abc".to_string(),
            actor_name: Some("web".to_string()),
            time: 1,
        });

        assert_eq!(rx1.recv().await.unwrap().action, "start");
        assert_eq!(rx2.recv().await.unwrap().actor_id, "abc");
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new(8);
        bus.publish(RuntimeEvent {
            event_type: "container".to_string(),
            action: "start".to_string(),
            actor_id: "abc".to_string(),
            actor_name: None,
            time: 1,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
