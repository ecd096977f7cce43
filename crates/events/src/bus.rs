//! In-process one-shot publish/subscribe bus.
//!
//! Handlers registered with [`EventBus::subscribe_once`] are keyed by
//! [`Topic`]. [`EventBus::publish`] removes every handler for the topic
//! under the table lock and invokes them after releasing it, so a handler
//! runs at most once even when publishes race. Publishing a topic nobody
//! subscribed to only reaches the broadcast feed.
//!
//! Every publish is also sent on a `tokio::sync::broadcast` channel so that
//! long-lived observers (the event logger) see the full stream.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use labcoord_core::lifecycle::Topic;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// LifecycleNotice
// ---------------------------------------------------------------------------

/// A lifecycle event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleNotice {
    pub topic: Topic,

    /// Event-specific data; an empty object when the publisher has none.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl LifecycleNotice {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

type Handler = Box<dyn FnOnce(&LifecycleNotice) + Send + 'static>;

/// Default buffer capacity for the broadcast feed.
const DEFAULT_CAPACITY: usize = 1024;

/// Process-wide event bus, shared as `Arc<EventBus>`.
pub struct EventBus {
    handlers: Mutex<HashMap<Topic, Vec<Handler>>>,
    sender: broadcast::Sender<LifecycleNotice>,
}

impl EventBus {
    /// Create a bus whose broadcast feed buffers `capacity` notices.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            handlers: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Register a handler that runs on the next publish of `topic`, then is
    /// discarded.
    pub fn subscribe_once<F>(&self, topic: Topic, handler: F)
    where
        F: FnOnce(&LifecycleNotice) + Send + 'static,
    {
        self.table().entry(topic).or_default().push(Box::new(handler));
    }

    /// Publish a notice, firing and removing every one-shot handler for its
    /// topic. Returns the number of handlers fired.
    pub fn publish(&self, notice: LifecycleNotice) -> usize {
        let fired = self.table().remove(&notice.topic).unwrap_or_default();
        let count = fired.len();
        for handler in fired {
            handler(&notice);
        }

        // A send error only means there are no feed subscribers.
        let _ = self.sender.send(notice);
        count
    }

    /// Subscribe to the feed of every published notice.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleNotice> {
        self.sender.subscribe()
    }

    /// Number of handlers waiting on `topic`.
    pub fn pending(&self, topic: &Topic) -> usize {
        self.table().get(topic).map_or(0, Vec::len)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Topic, Vec<Handler>>> {
        // Handlers never run under the lock, so a poisoned table is intact.
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
