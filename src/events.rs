/*!
 * Dashboard Events
 * Typed change notifications fanned out to every open dashboard view
 */
use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::AdminIdentity;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DashboardEvent {
    CodesChanged,
    RedemptionsChanged,
    PostsChanged,
    AuthChanged { user: Option<AdminIdentity> },
}

impl DashboardEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::CodesChanged => "codesChanged",
            DashboardEvent::RedemptionsChanged => "redemptionsChanged",
            DashboardEvent::PostsChanged => "postsChanged",
            DashboardEvent::AuthChanged { .. } => "authChanged",
        }
    }
}

/// Broadcast channel owned by the application state
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish to current subscribers; having none is fine.
    pub fn publish(&self, event: DashboardEvent) {
        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(event = event.name(), delivered, "dashboard event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(DashboardEvent::CodesChanged);
        bus.publish(DashboardEvent::PostsChanged);

        assert_eq!(rx.recv().await.unwrap(), DashboardEvent::CodesChanged);
        assert_eq!(rx.recv().await.unwrap(), DashboardEvent::PostsChanged);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(DashboardEvent::RedemptionsChanged);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(DashboardEvent::AuthChanged { user: None }).unwrap();
        assert_eq!(json["type"], "authChanged");
        assert!(json["user"].is_null());
    }
}
