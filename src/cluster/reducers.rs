//! Event reducers - `(state, event) -> state`
//!
//! One named reducer per event type. Reducers never fail: an event that
//! refers to an absent resource leaves the state unchanged (Deleted) or
//! inserts it (Updated, Labeled, Annotated). Labeled and Annotated events
//! already carry the finished resource, so applying them is a replace.

use tracing::{debug, warn};

use super::events::{ChangeVerb, ClusterEvent, EventPayload, EventType, ResourceChange};
use super::state::{self, ClusterStateData, StoredResource};

pub type Reducer = fn(&ClusterStateData, &ClusterEvent) -> ClusterStateData;

fn apply_change<R: StoredResource>(state: &ClusterStateData, change: &ResourceChange<R>) -> ClusterStateData {
    match change {
        ResourceChange::Created { resource } => {
            if state::find::<R>(state, resource.name(), resource.namespace()).is_ok() {
                warn!(
                    resource = %resource.reference(),
                    namespace = %resource.namespace(),
                    "Created event for an existing resource; replacing it"
                );
                state::upsert(state, resource.clone())
            } else {
                state::add(state, resource.clone())
            }
        }
        ResourceChange::Deleted { resource } => {
            match state::remove::<R>(state, resource.name(), resource.namespace()) {
                Ok((next, _)) => next,
                Err(e) => {
                    debug!(error = %e, "Deleted event for an absent resource");
                    state.clone()
                }
            }
        }
        ResourceChange::Updated { resource, .. }
        | ResourceChange::Labeled { resource, .. }
        | ResourceChange::Annotated { resource, .. } => state::upsert(state, resource.clone()),
    }
}

fn mismatched(state: &ClusterStateData, event: &ClusterEvent, reducer: &str) -> ClusterStateData {
    warn!(
        reducer,
        event_type = %event.event_type,
        "Event payload does not match reducer; ignoring"
    );
    state.clone()
}

macro_rules! reducer {
    ($name:ident, $payload:ident, $verb:ident) => {
        pub fn $name(state: &ClusterStateData, event: &ClusterEvent) -> ClusterStateData {
            match &event.payload {
                EventPayload::$payload(change) if change.verb() == ChangeVerb::$verb => {
                    apply_change(state, change)
                }
                _ => mismatched(state, event, stringify!($name)),
            }
        }
    };
}

reducer!(pod_created, Pod, Created);
reducer!(pod_deleted, Pod, Deleted);
reducer!(pod_updated, Pod, Updated);
reducer!(pod_labeled, Pod, Labeled);
reducer!(pod_annotated, Pod, Annotated);
reducer!(config_map_created, ConfigMap, Created);
reducer!(config_map_deleted, ConfigMap, Deleted);
reducer!(config_map_updated, ConfigMap, Updated);
reducer!(config_map_labeled, ConfigMap, Labeled);
reducer!(config_map_annotated, ConfigMap, Annotated);
reducer!(secret_created, Secret, Created);
reducer!(secret_deleted, Secret, Deleted);
reducer!(secret_updated, Secret, Updated);
reducer!(secret_labeled, Secret, Labeled);
reducer!(secret_annotated, Secret, Annotated);

/// The reducer registered for an event type
pub fn reducer_for(event_type: EventType) -> Reducer {
    match event_type {
        EventType::PodCreated => pod_created,
        EventType::PodDeleted => pod_deleted,
        EventType::PodUpdated => pod_updated,
        EventType::PodLabeled => pod_labeled,
        EventType::PodAnnotated => pod_annotated,
        EventType::ConfigMapCreated => config_map_created,
        EventType::ConfigMapDeleted => config_map_deleted,
        EventType::ConfigMapUpdated => config_map_updated,
        EventType::ConfigMapLabeled => config_map_labeled,
        EventType::ConfigMapAnnotated => config_map_annotated,
        EventType::SecretCreated => secret_created,
        EventType::SecretDeleted => secret_deleted,
        EventType::SecretUpdated => secret_updated,
        EventType::SecretLabeled => secret_labeled,
        EventType::SecretAnnotated => secret_annotated,
    }
}

pub fn apply_event(state: &ClusterStateData, event: &ClusterEvent) -> ClusterStateData {
    reducer_for(event.event_type)(state, event)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::configmap::ConfigMap;
    use crate::cluster::events::EventMetadata;
    use crate::cluster::pod::{Container, Pod};
    use crate::cluster::resources::{KeyChanges, KeyValues};
    use crate::cluster::secret::Secret;

    fn meta() -> EventMetadata {
        EventMetadata::fresh("test")
    }

    fn pod(name: &str) -> Arc<Pod> {
        Arc::new(Pod::new(name, "default", vec![Container::new("c", "nginx")]))
    }

    #[test]
    fn test_created_then_deleted_leaves_nothing() {
        let p = pod("web");
        let s1 = apply_event(
            &ClusterStateData::default(),
            &ClusterEvent::new(ResourceChange::Created { resource: p.clone() }, meta()),
        );
        assert_eq!(s1.pods.items.len(), 1);
        let s2 = apply_event(
            &s1,
            &ClusterEvent::new(ResourceChange::Deleted { resource: p }, meta()),
        );
        assert!(state::find::<Pod>(&s2, "web", "default").is_err());
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let start = ClusterStateData::default();
        let event = ClusterEvent::new(
            ResourceChange::Deleted {
                resource: Arc::new(Secret::new("gone", "default")),
            },
            meta(),
        );
        assert_eq!(secret_deleted(&start, &event), start);
    }

    #[test]
    fn test_labeled_replaces_with_payload_labels() {
        let previous = pod("web");
        let start = state::add(&ClusterStateData::default(), previous.clone());
        let mut labels = KeyValues::new();
        labels.insert("tier".into(), "web".into());
        let mut changes = KeyChanges::new();
        changes.insert("tier".into(), Some("web".into()));

        let event = ClusterEvent::new(
            ResourceChange::labeled(previous, Some(labels.clone()), changes),
            meta(),
        );
        let next = pod_labeled(&start, &event);
        let stored = state::find::<Pod>(&next, "web", "default").unwrap();
        assert_eq!(stored.metadata.labels, Some(labels));
        assert_eq!(next.pods.items.len(), 1);
    }

    #[test]
    fn test_created_twice_keeps_identity_unique() {
        let start = ClusterStateData::default();
        let cm = Arc::new(ConfigMap::new("cfg", "default"));
        let event = ClusterEvent::new(ResourceChange::Created { resource: cm }, meta());
        let next = config_map_created(&config_map_created(&start, &event), &event);
        assert_eq!(next.config_maps.items.len(), 1);
    }

    #[test]
    fn test_mismatched_reducer_ignores_event() {
        let start = ClusterStateData::default();
        let event = ClusterEvent::new(ResourceChange::Created { resource: pod("web") }, meta());
        assert_eq!(secret_created(&start, &event), start);
        assert_eq!(pod_deleted(&start, &event), start);
    }

    #[test]
    fn test_reducer_for_every_type() {
        let start = ClusterStateData::default();
        let event = ClusterEvent::new(ResourceChange::Created { resource: pod("web") }, meta());
        for t in EventType::ALL {
            let next = reducer_for(t)(&start, &event);
            let expected = if t == EventType::PodCreated { 1 } else { 0 };
            assert_eq!(next.pods.items.len(), expected, "{}", t);
        }
    }
}
