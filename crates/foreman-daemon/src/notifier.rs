//! Outbound completion events.

use crate::protocol::ManagerEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Fire-and-forget sink for completion events.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, event: ManagerEvent);
}

/// Fans events out to every current subscriber.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ManagerEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn dispatch(&self, event: ManagerEvent) {
        let kind = event.event;
        let correlation_id = event.correlation_id.clone();
        if self.tx.send(event).is_err() {
            debug!(event = %kind, correlation_id = %correlation_id, "No subscribers for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EventKind;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.dispatch(ManagerEvent::new(EventKind::ItemsDeleted, "m-1", json!([])));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, EventKind::ItemsDeleted);
        assert_eq!(event.correlation_id, "m-1");
    }

    #[test]
    fn dispatch_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new(8);
        notifier.dispatch(ManagerEvent::new(EventKind::ManagerUpdated, "m-2", json!({})));
    }
}
