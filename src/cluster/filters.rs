//! Event filter predicates and combinators
//!
//! Predicates are plain shared closures over an event, used by
//! [`EventBus::subscribe_filtered`](super::bus::EventBus::subscribe_filtered)
//! and [`EventBus::get_history_filtered`](super::bus::EventBus::get_history_filtered).

use std::sync::Arc;

use super::events::{ClusterEvent, EventType};
use super::resources::ResourceKind;

pub type EventPredicate = Arc<dyn Fn(&ClusterEvent) -> bool + Send + Sync>;

/// Events about resources in `namespace`
pub fn by_namespace(namespace: impl Into<String>) -> EventPredicate {
    let namespace = namespace.into();
    Arc::new(move |e: &ClusterEvent| e.namespace() == namespace)
}

pub fn by_type(event_type: EventType) -> EventPredicate {
    Arc::new(move |e: &ClusterEvent| e.event_type == event_type)
}

/// Events whose type is any of `types`
pub fn by_types(types: &[EventType]) -> EventPredicate {
    let types = types.to_vec();
    Arc::new(move |e: &ClusterEvent| types.contains(&e.event_type))
}

pub fn by_source(source: impl Into<String>) -> EventPredicate {
    let source = source.into();
    Arc::new(move |e: &ClusterEvent| e.metadata.source == source)
}

pub fn by_resource_kind(kind: ResourceKind) -> EventPredicate {
    Arc::new(move |e: &ClusterEvent| e.resource_kind() == kind)
}

/// Logical AND. An empty list accepts everything.
pub fn all_of(predicates: Vec<EventPredicate>) -> EventPredicate {
    Arc::new(move |e: &ClusterEvent| predicates.iter().all(|p| p(e)))
}

/// Logical OR. An empty list rejects everything.
pub fn any_of(predicates: Vec<EventPredicate>) -> EventPredicate {
    Arc::new(move |e: &ClusterEvent| predicates.iter().any(|p| p(e)))
}

pub fn not(predicate: EventPredicate) -> EventPredicate {
    Arc::new(move |e: &ClusterEvent| !predicate(e))
}
