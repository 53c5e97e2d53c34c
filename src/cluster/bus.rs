//! Event bus - synchronous, ordered publish/subscribe
//!
//! `emit` records the event in history, then calls every subscriber for
//! the event's type followed by every wildcard subscriber, each group in
//! subscription order. It returns only after all subscribers have run.
//!
//! Handlers are invoked with the registry lock released, so a handler may
//! emit further events or unsubscribe without deadlocking.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::events::{ClusterEvent, EventType};
use super::filters::EventPredicate;

pub type EventHandler = Arc<dyn Fn(&ClusterEvent) + Send + Sync>;

/// Bus configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Whether emitted events are recorded
    pub enable_history: bool,

    /// Oldest events are dropped beyond this size
    pub max_history_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enable_history: true,
            max_history_size: 1000,
        }
    }
}

type SubscriptionId = u64;

struct Registry {
    next_id: SubscriptionId,
    typed: Vec<(SubscriptionId, EventType, EventHandler)>,
    wildcard: Vec<(SubscriptionId, EventHandler)>,
    history: VecDeque<ClusterEvent>,
    config: BusConfig,
}

impl Registry {
    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.typed.len() + self.wildcard.len();
        self.typed.retain(|(sid, _, _)| *sid != id);
        self.wildcard.retain(|(sid, _)| *sid != id);
        before != self.typed.len() + self.wildcard.len()
    }
}

/// Handle to one bus instance. Clones share the same subscribers and history.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                typed: Vec::new(),
                wildcard: Vec::new(),
                history: VecDeque::new(),
                config,
            })),
        }
    }

    /// Deliver an event to every matching subscriber
    pub fn emit(&self, event: ClusterEvent) {
        let (typed, wildcard) = {
            let mut reg = self.registry.lock();
            if reg.config.enable_history {
                reg.history.push_back(event.clone());
                while reg.history.len() > reg.config.max_history_size {
                    reg.history.pop_front();
                }
            }
            let typed: Vec<EventHandler> = reg
                .typed
                .iter()
                .filter(|(_, t, _)| *t == event.event_type)
                .map(|(_, _, h)| h.clone())
                .collect();
            let wildcard: Vec<EventHandler> = reg.wildcard.iter().map(|(_, h)| h.clone()).collect();
            (typed, wildcard)
        };

        debug!(
            event_type = %event.event_type,
            correlation_id = %event.metadata.correlation_id,
            resource = %event.resource_name(),
            namespace = %event.namespace(),
            subscribers = typed.len() + wildcard.len(),
            "Emitting event"
        );

        for handler in typed.iter().chain(wildcard.iter()) {
            handler(&event);
        }
    }

    /// Subscribe to one event type
    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&ClusterEvent) + Send + Sync + 'static,
    {
        let mut reg = self.registry.lock();
        let id = reg.allocate_id();
        reg.typed.push((id, event_type, Arc::new(handler)));
        trace!(id, %event_type, "Subscribed");
        self.subscription(id)
    }

    /// Subscribe to every event
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ClusterEvent) + Send + Sync + 'static,
    {
        let mut reg = self.registry.lock();
        let id = reg.allocate_id();
        reg.wildcard.push((id, Arc::new(handler)));
        trace!(id, "Subscribed to all events");
        self.subscription(id)
    }

    /// Subscribe to every event accepted by `predicate`. Delivered in the
    /// wildcard group.
    pub fn subscribe_filtered<F>(&self, predicate: EventPredicate, handler: F) -> Subscription
    where
        F: Fn(&ClusterEvent) + Send + Sync + 'static,
    {
        self.subscribe_all(move |event| {
            if !predicate(event) {
                return;
            }
            handler(event)
        })
    }

    /// A copy of the recorded history, oldest first
    pub fn get_history(&self) -> Vec<ClusterEvent> {
        self.registry.lock().history.iter().cloned().collect()
    }

    pub fn get_history_filtered(&self, predicate: &EventPredicate) -> Vec<ClusterEvent> {
        self.registry
            .lock()
            .history
            .iter()
            .filter(|e| predicate(*e))
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.registry.lock().history.clear();
    }

    pub fn history_len(&self) -> usize {
        self.registry.lock().history.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let reg = self.registry.lock();
        reg.typed.len() + reg.wildcard.len()
    }

    fn subscription(&self, id: SubscriptionId) -> Subscription {
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }
}

/// Returned by every subscribe call. Dropping it keeps the subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stop future deliveries. Calling it again has no effect.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.lock().remove(self.id) {
                trace!(id = self.id, "Unsubscribed");
            }
        }
    }
}
