//! In-process publish/subscribe fan-out.
//!
//! Connects the log watcher and the location relay to the consumers of their
//! output. Delivery is synchronous on the publishing thread, in registration
//! order. The subscriber list is snapshotted before each dispatch, so a
//! handler that subscribes or unsubscribes only affects later publishes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::relay::{LocationTable, LocationUpdate};
use crate::watcher::LogLine;

/// Bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A new line was read from the active log file.
    LogLine,
    /// A different log file became active (character switch).
    ActiveFileChanged,
    /// The sharing server broadcast a fresh location table.
    LocationsUpdated,
    /// A consumer wants its local position forwarded to the relay.
    SendLocation,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::LogLine => "log_line",
            Topic::ActiveFileChanged => "active_file_changed",
            Topic::LocationsUpdated => "locations_updated",
            Topic::SendLocation => "send_location",
        }
    }
}

/// A payload together with the topic it belongs to.
#[derive(Debug, Clone)]
pub enum Event {
    LogLine(LogLine),
    ActiveFileChanged(PathBuf),
    LocationsUpdated(LocationTable),
    SendLocation(LocationUpdate),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::LogLine(_) => Topic::LogLine,
            Event::ActiveFileChanged(_) => Topic::ActiveFileChanged,
            Event::LocationsUpdated(_) => Topic::LocationsUpdated,
            Event::SendLocation(_) => Topic::SendLocation,
        }
    }
}

/// Identifies a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Topic, Handler)>,
}

/// Shared handle to one bus. Clones publish to and subscribe on the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for every event published on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.subscribers.push((id, topic, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|(sid, _, _)| *sid != id);
        registry.subscribers.len() != before
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry()
            .subscribers
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .count()
    }

    /// Deliver `event` to every current subscriber of its topic.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        let handlers: Vec<Handler> = self
            .registry()
            .subscribers
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();

        trace!(topic = topic.as_str(), subscribers = handlers.len(), "Publishing");
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.registry().subscribers.len())
            .finish()
    }
}
