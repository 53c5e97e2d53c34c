//! Cluster events - immutable facts about resource changes
//!
//! Every mutation of cluster state is described by one [`ClusterEvent`].
//! The set of event types is closed: five changes ({Created, Deleted,
//! Updated, Labeled, Annotated}) for each of the three resource kinds.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::configmap::ConfigMap;
use super::pod::Pod;
use super::resources::{KeyChanges, KeyValues, Object, ObjectMeta, ResourceKind};
use super::secret::Secret;

/// Where an event came from and which command it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Emitting component (e.g., "kubectl")
    pub source: String,

    /// Shared by every event produced by one command
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>, correlation_id: Uuid) -> Self {
        Self {
            source: source.into(),
            correlation_id,
        }
    }

    /// Metadata with a fresh correlation id
    pub fn fresh(source: impl Into<String>) -> Self {
        Self::new(source, Uuid::new_v4())
    }
}

/// The fifteen event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    PodCreated,
    PodDeleted,
    PodUpdated,
    PodLabeled,
    PodAnnotated,
    ConfigMapCreated,
    ConfigMapDeleted,
    ConfigMapUpdated,
    ConfigMapLabeled,
    ConfigMapAnnotated,
    SecretCreated,
    SecretDeleted,
    SecretUpdated,
    SecretLabeled,
    SecretAnnotated,
}

impl EventType {
    pub const ALL: [EventType; 15] = [
        EventType::PodCreated,
        EventType::PodDeleted,
        EventType::PodUpdated,
        EventType::PodLabeled,
        EventType::PodAnnotated,
        EventType::ConfigMapCreated,
        EventType::ConfigMapDeleted,
        EventType::ConfigMapUpdated,
        EventType::ConfigMapLabeled,
        EventType::ConfigMapAnnotated,
        EventType::SecretCreated,
        EventType::SecretDeleted,
        EventType::SecretUpdated,
        EventType::SecretLabeled,
        EventType::SecretAnnotated,
    ];

    /// Resource kind the event type concerns
    pub fn kind(&self) -> ResourceKind {
        use EventType::*;
        match self {
            PodCreated | PodDeleted | PodUpdated | PodLabeled | PodAnnotated => ResourceKind::Pod,
            ConfigMapCreated | ConfigMapDeleted | ConfigMapUpdated | ConfigMapLabeled
            | ConfigMapAnnotated => ResourceKind::ConfigMap,
            SecretCreated | SecretDeleted | SecretUpdated | SecretLabeled | SecretAnnotated => {
                ResourceKind::Secret
            }
        }
    }

    pub fn of(kind: ResourceKind, verb: ChangeVerb) -> Self {
        use ChangeVerb::*;
        use EventType::*;
        match (kind, verb) {
            (ResourceKind::Pod, Created) => PodCreated,
            (ResourceKind::Pod, Deleted) => PodDeleted,
            (ResourceKind::Pod, Updated) => PodUpdated,
            (ResourceKind::Pod, Labeled) => PodLabeled,
            (ResourceKind::Pod, Annotated) => PodAnnotated,
            (ResourceKind::ConfigMap, Created) => ConfigMapCreated,
            (ResourceKind::ConfigMap, Deleted) => ConfigMapDeleted,
            (ResourceKind::ConfigMap, Updated) => ConfigMapUpdated,
            (ResourceKind::ConfigMap, Labeled) => ConfigMapLabeled,
            (ResourceKind::ConfigMap, Annotated) => ConfigMapAnnotated,
            (ResourceKind::Secret, Created) => SecretCreated,
            (ResourceKind::Secret, Deleted) => SecretDeleted,
            (ResourceKind::Secret, Updated) => SecretUpdated,
            (ResourceKind::Secret, Labeled) => SecretLabeled,
            (ResourceKind::Secret, Annotated) => SecretAnnotated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use EventType::*;
        match self {
            PodCreated => "PodCreated",
            PodDeleted => "PodDeleted",
            PodUpdated => "PodUpdated",
            PodLabeled => "PodLabeled",
            PodAnnotated => "PodAnnotated",
            ConfigMapCreated => "ConfigMapCreated",
            ConfigMapDeleted => "ConfigMapDeleted",
            ConfigMapUpdated => "ConfigMapUpdated",
            ConfigMapLabeled => "ConfigMapLabeled",
            ConfigMapAnnotated => "ConfigMapAnnotated",
            SecretCreated => "SecretCreated",
            SecretDeleted => "SecretDeleted",
            SecretUpdated => "SecretUpdated",
            SecretLabeled => "SecretLabeled",
            SecretAnnotated => "SecretAnnotated",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one resource
///
/// `Labeled`/`Annotated` carry the resource as it is after the change,
/// the version it replaced, and the key delta that was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum ResourceChange<T> {
    Created {
        resource: Arc<T>,
    },
    Deleted {
        resource: Arc<T>,
    },
    Updated {
        resource: Arc<T>,
        previous: Arc<T>,
    },
    Labeled {
        resource: Arc<T>,
        previous: Arc<T>,
        changes: KeyChanges,
    },
    Annotated {
        resource: Arc<T>,
        previous: Arc<T>,
        changes: KeyChanges,
    },
}

impl<T: Object> ResourceChange<T> {
    /// The resource the change is about (its new version, or the removed one)
    pub fn resource(&self) -> &Arc<T> {
        match self {
            ResourceChange::Created { resource }
            | ResourceChange::Deleted { resource }
            | ResourceChange::Updated { resource, .. }
            | ResourceChange::Labeled { resource, .. }
            | ResourceChange::Annotated { resource, .. } => resource,
        }
    }

    pub fn previous(&self) -> Option<&Arc<T>> {
        match self {
            ResourceChange::Created { .. } | ResourceChange::Deleted { .. } => None,
            ResourceChange::Updated { previous, .. }
            | ResourceChange::Labeled { previous, .. }
            | ResourceChange::Annotated { previous, .. } => Some(previous),
        }
    }

    /// Build a `Labeled` change from the previous version and the delta.
    /// The new labels are computed here, not by the reducer.
    pub fn labeled(previous: Arc<T>, new_labels: Option<KeyValues>, changes: KeyChanges) -> Self {
        let meta = ObjectMeta {
            labels: new_labels,
            ..previous.metadata().clone()
        };
        ResourceChange::Labeled {
            resource: Arc::new(previous.with_metadata(meta)),
            previous,
            changes,
        }
    }

    /// Build an `Annotated` change from the previous version and the delta
    pub fn annotated(
        previous: Arc<T>,
        new_annotations: Option<KeyValues>,
        changes: KeyChanges,
    ) -> Self {
        let meta = ObjectMeta {
            annotations: new_annotations,
            ..previous.metadata().clone()
        };
        ResourceChange::Annotated {
            resource: Arc::new(previous.with_metadata(meta)),
            previous,
            changes,
        }
    }

    pub fn verb(&self) -> ChangeVerb {
        match self {
            ResourceChange::Created { .. } => ChangeVerb::Created,
            ResourceChange::Deleted { .. } => ChangeVerb::Deleted,
            ResourceChange::Updated { .. } => ChangeVerb::Updated,
            ResourceChange::Labeled { .. } => ChangeVerb::Labeled,
            ResourceChange::Annotated { .. } => ChangeVerb::Annotated,
        }
    }
}

/// The five kinds of change, independent of resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerb {
    Created,
    Deleted,
    Updated,
    Labeled,
    Annotated,
}

/// Kind-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum EventPayload {
    Pod(ResourceChange<Pod>),
    ConfigMap(ResourceChange<ConfigMap>),
    Secret(ResourceChange<Secret>),
}

impl From<ResourceChange<Pod>> for EventPayload {
    fn from(change: ResourceChange<Pod>) -> Self {
        EventPayload::Pod(change)
    }
}

impl From<ResourceChange<ConfigMap>> for EventPayload {
    fn from(change: ResourceChange<ConfigMap>) -> Self {
        EventPayload::ConfigMap(change)
    }
}

impl From<ResourceChange<Secret>> for EventPayload {
    fn from(change: ResourceChange<Secret>) -> Self {
        EventPayload::Secret(change)
    }
}

impl EventPayload {
    /// The event type is fully determined by the payload
    pub fn event_type(&self) -> EventType {
        let (kind, verb) = match self {
            EventPayload::Pod(c) => (ResourceKind::Pod, c.verb()),
            EventPayload::ConfigMap(c) => (ResourceKind::ConfigMap, c.verb()),
            EventPayload::Secret(c) => (ResourceKind::Secret, c.verb()),
        };
        EventType::of(kind, verb)
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            EventPayload::Pod(c) => c.resource().metadata(),
            EventPayload::ConfigMap(c) => c.resource().metadata(),
            EventPayload::Secret(c) => c.resource().metadata(),
        }
    }
}

/// An event emitted on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    pub timestamp: DateTime<Utc>,

    pub metadata: EventMetadata,

    pub payload: EventPayload,
}

impl ClusterEvent {
    pub fn new(payload: impl Into<EventPayload>, metadata: EventMetadata) -> Self {
        let payload = payload.into();
        Self {
            event_type: payload.event_type(),
            timestamp: Utc::now(),
            metadata,
            payload,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.payload.metadata().namespace
    }

    pub fn resource_name(&self) -> &str {
        &self.payload.metadata().name
    }

    pub fn resource_kind(&self) -> ResourceKind {
        self.event_type.kind()
    }
}
