//! Session event distribution
//!
//! Replaces the signal/slot surface of UI toolkits with an explicit
//! subscription interface: synchronous handlers registered with a handle for
//! unregistering, plus a broadcast channel for async consumers. The session
//! scheduler is the sole publisher.

use crate::temperature::Temperature;
use crate::types::PrinterState;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events published by a printer session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrinterEvent {
    /// The printer state machine moved to a new state
    StateChanged(PrinterState),
    /// The set of available serial ports changed
    PortsChanged(Vec<String>),
    /// Print job progress changed, as a percentage
    PrintProgressChanged(f32),
    /// A raw line was received from the printer
    ReceivedMessage(Vec<u8>),
    /// The temperature record changed
    TemperatureChanged(Temperature),
    /// Dialect-defined status text, e.g. heat-and-wait completion
    PrinterStatusChanged(String),
    /// A session-level error occurred
    Error(String),
}

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Type alias for event handler functions
type EventHandler = Box<dyn Fn(&PrinterEvent) + Send + Sync>;

/// Per-session event bus
///
/// Publishing calls every registered synchronous handler on the publishing
/// task, then fans the event out over a broadcast channel for receivers
/// obtained with [`EventBus::receiver`].
pub struct EventBus {
    sender: broadcast::Sender<PrinterEvent>,
    handlers: Arc<RwLock<HashMap<SubscriptionId, EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with the given broadcast capacity
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: PrinterEvent) {
        let handlers = self.handlers.read();
        for handler in handlers.values() {
            handler(&event);
        }
        // A send error only means there are no broadcast receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe with a synchronous handler
    ///
    /// The handler runs on the publishing task and should return quickly.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PrinterEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, Box::new(handler));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Unsubscribe a handler
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get a receiver for async event consumption
    pub fn receiver(&self) -> broadcast::Receiver<PrinterEvent> {
        self.sender.subscribe()
    }

    /// Number of registered synchronous handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribe_and_unsubscribe() {
        let bus = EventBus::default();

        let id = bus.subscribe(|_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);

        // Double unsubscribe should return false
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn handler_receives_events() {
        let bus = EventBus::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let _id = bus.subscribe(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(PrinterEvent::StateChanged(PrinterState::Idle));
        bus.publish(PrinterEvent::PrintProgressChanged(50.0));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn broadcast_receiver_gets_events() {
        let bus = EventBus::default();
        let mut receiver = bus.receiver();

        bus.publish(PrinterEvent::StateChanged(PrinterState::Connecting));

        match receiver.try_recv() {
            Ok(PrinterEvent::StateChanged(state)) => assert_eq!(state, PrinterState::Connecting),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
