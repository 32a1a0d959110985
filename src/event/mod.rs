//! Event system for async notification handling.
//!
//! The event system broadcasts connection changes, push events and attribute
//! changes from a mug session to any number of subscribers.

mod callback;

pub use callback::{CallbackHandle, CallbackRegistry, MugCallback};

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::protocol::PushEvent;
use crate::types::{Attribute, Change};

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection established.
    Connected,
    /// Connection lost.
    Disconnected {
        /// True if the session asked for the disconnect.
        expected: bool,
    },
    /// Push event received from the mug.
    Push(PushEvent),
    /// Attributes changed after a read.
    Changed(Vec<Change>),
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    filter: Option<EventFilter>,
}

impl Subscription {
    /// Receives the next event matching the subscription filter.
    ///
    /// Returns `None` once the dispatcher is gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Subscription lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter for specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only these push events.
    pub push_events: Option<Vec<PushEvent>>,
    /// Only change sets touching this attribute.
    pub attribute: Option<Attribute>,
    /// Only connection events.
    pub connection: bool,
}

impl EventFilter {
    /// Creates a filter for specific push events.
    #[must_use]
    pub const fn push_events(events: Vec<PushEvent>) -> Self {
        Self {
            push_events: Some(events),
            attribute: None,
            connection: false,
        }
    }

    /// Creates a filter for changes of one attribute.
    #[must_use]
    pub const fn attribute(attribute: Attribute) -> Self {
        Self {
            push_events: None,
            attribute: Some(attribute),
            connection: false,
        }
    }

    /// Creates a filter for connect and disconnect events.
    #[must_use]
    pub const fn connection() -> Self {
        Self {
            push_events: None,
            attribute: None,
            connection: true,
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.connection && !matches!(event, Event::Connected | Event::Disconnected { .. }) {
            return false;
        }

        if let Some(ref events) = self.push_events {
            match event {
                Event::Push(push) if events.contains(push) => {}
                _ => return false,
            }
        }

        if let Some(attribute) = self.attribute {
            match event {
                Event::Changed(changes) if changes.iter().any(|c| c.attribute == attribute) => {}
                _ => return false,
            }
        }

        true
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to events with an optional filter.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
            filter,
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(
        &self,
        filter: EventFilter,
        timeout: std::time::Duration,
    ) -> Option<Event> {
        let mut subscription = self.subscribe(Some(filter));
        tokio::time::timeout(timeout, subscription.recv())
            .await
            .ok()
            .flatten()
    }
}
