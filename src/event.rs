use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::User;

/// Well-known channel name shared by every context participating in the
/// handshake (the browser side opens a `BroadcastChannel` with the same name).
pub const AUTH_CHANNEL: &str = "kamus_auth";

/// Transient cross-window authentication event.
///
/// Delivered at most once per popup completion to each subscribed listener.
/// Subscribers must tolerate duplicates: the dual-transport delivery (bus +
/// opener message fallback) can hand the same completion to a listener twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthEvent {
    #[serde(rename = "AUTH_SUCCESS")]
    Success { user: User },
    #[serde(rename = "AUTH_ERROR")]
    Error { error: String },
}

/// In-process session event bus.
///
/// Fan-out channel connecting popup completions to every listening context in
/// this process. Receivers are dropped with their owners, so rapid repeated
/// handshakes never leak subscriptions.
#[derive(Debug, Clone)]
pub struct SessionEventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl SessionEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Publishing with no live subscriber is not an error: an opener that
    /// closed its tab simply never observes the completion.
    pub fn publish(&self, event: AuthEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One delivery path for a handshake outcome.
///
/// The popup handshake publishes through every configured transport so that a
/// single failing mechanism (blocked broadcast, missing opener) does not lose
/// the completion. Delivery is best effort; implementations must not panic.
pub trait EventTransport: Send + Sync {
    fn deliver(&self, event: &AuthEvent);
}

/// Transport that feeds the in-process [`SessionEventBus`].
pub struct BusTransport {
    bus: SessionEventBus,
}

impl BusTransport {
    #[must_use]
    pub fn new(bus: SessionEventBus) -> Self {
        Self { bus }
    }
}

impl EventTransport for BusTransport {
    fn deliver(&self, event: &AuthEvent) {
        self.bus.publish(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, User, UserId};

    fn test_user() -> User {
        User::new(UserId("u1".into()), "ayse", Role::member())
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = SessionEventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(AuthEvent::Success { user: test_user() });

        assert!(matches!(rx1.recv().await.unwrap(), AuthEvent::Success { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), AuthEvent::Success { .. }));
    }

    #[tokio::test]
    async fn subscribers_only_see_later_events() {
        let bus = SessionEventBus::new();
        bus.publish(AuthEvent::Error { error: "early".into() });

        let mut rx = bus.subscribe();
        bus.publish(AuthEvent::Error { error: "late".into() });

        assert_eq!(
            rx.recv().await.unwrap(),
            AuthEvent::Error { error: "late".into() }
        );
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = SessionEventBus::new();
        bus.publish(AuthEvent::Error { error: "nobody home".into() });
    }

    #[tokio::test]
    async fn bus_transport_feeds_bus() {
        let bus = SessionEventBus::new();
        let mut rx = bus.subscribe();
        let transport = BusTransport::new(bus.clone());

        transport.deliver(&AuthEvent::Success { user: test_user() });
        assert!(matches!(rx.recv().await.unwrap(), AuthEvent::Success { .. }));
    }

    #[test]
    fn event_wire_shape_matches_channel_contract() {
        let json = serde_json::to_string(&AuthEvent::Error { error: "denied".into() }).unwrap();
        assert_eq!(json, r#"{"type":"AUTH_ERROR","error":"denied"}"#);

        let json = serde_json::to_string(&AuthEvent::Success { user: test_user() }).unwrap();
        assert!(json.starts_with(r#"{"type":"AUTH_SUCCESS","user":"#));
    }
}
