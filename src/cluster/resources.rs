//! Shared resource types for the simulated cluster

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::configmap::ConfigMap;
use super::pod::Pod;
use super::secret::Secret;

/// Namespace used when a command or manifest does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// API version carried by every core resource
pub const CORE_API_VERSION: &str = "v1";

/// Namespaces that always exist in a simulated cluster
pub const BUILTIN_NAMESPACES: [&str; 3] = ["default", "kube-public", "kube-system"];

/// Labels or annotations. Ordered so listings are deterministic.
pub type KeyValues = BTreeMap<String, String>;

/// Requested key changes: `Some(value)` sets, `None` removes
pub type KeyChanges = BTreeMap<String, Option<String>>;

/// The three resource kinds held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    ConfigMap,
    Secret,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Pod, ResourceKind::ConfigMap, ResourceKind::Secret];

    /// Lowercase plural used in API paths and error messages ("pods")
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pods",
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::Secret => "secrets",
        }
    }

    /// Lowercase singular used in `kind/name` references ("pod")
    pub fn singular(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::ConfigMap => "configmap",
            ResourceKind::Secret => "secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
        };
        f.write_str(s)
    }
}

/// Metadata shared by every resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Unique name within a namespace
    pub name: String,

    /// Namespace (defaults to "default")
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Labels for organization and selection. Never an empty map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<KeyValues>,

    /// Annotations for arbitrary metadata. Never an empty map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<KeyValues>,

    /// Creation timestamp
    #[serde(rename = "creationTimestamp")]
    #[serde(default = "Utc::now")]
    pub creation_timestamp: DateTime<Utc>,

    /// Unique identifier (generated)
    #[serde(default = "Uuid::new_v4")]
    pub uid: Uuid,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl ObjectMeta {
    /// Create metadata stamped with the current time and a fresh uid
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: None,
            annotations: None,
            creation_timestamp: Utc::now(),
            uid: Uuid::new_v4(),
        }
    }

    pub fn with_labels(mut self, labels: KeyValues) -> Self {
        self.labels = non_empty(labels);
        self
    }

    pub fn with_annotations(mut self, annotations: KeyValues) -> Self {
        self.annotations = non_empty(annotations);
        self
    }

    pub fn with_creation_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.creation_timestamp = ts;
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|l| l.get(key))
            .map(String::as_str)
    }
}

/// Collapse an empty map to `None`
pub fn non_empty(map: KeyValues) -> Option<KeyValues> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Apply key changes to an optional map, producing the new map.
///
/// Removing an absent key is a no-op. The result is `None` when no keys
/// remain.
pub fn apply_key_changes(current: Option<&KeyValues>, changes: &KeyChanges) -> Option<KeyValues> {
    let mut next = current.cloned().unwrap_or_default();
    for (key, value) in changes {
        match value {
            Some(v) => {
                next.insert(key.clone(), v.clone());
            }
            None => {
                next.remove(key);
            }
        }
    }
    non_empty(next)
}

/// Common behavior of every stored resource
pub trait Object: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    /// Return a copy of this resource carrying `metadata`
    fn with_metadata(&self, metadata: ObjectMeta) -> Self;

    /// Whether two versions declare the same desired state, ignoring
    /// status, uid and timestamps
    fn same_definition(&self, other: &Self) -> bool;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn namespace(&self) -> &str {
        &self.metadata().namespace
    }

    /// `kind/name` reference as printed by the CLI
    fn reference(&self) -> String {
        format!("{}/{}", Self::KIND.singular(), self.name())
    }
}

/// Any resource held by the cluster. Built by the manifest parser, which
/// dispatches on `kind`; serialized transparently as the inner resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Pod(Pod),
    ConfigMap(ConfigMap),
    Secret(Secret),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Pod(_) => ResourceKind::Pod,
            Resource::ConfigMap(_) => ResourceKind::ConfigMap,
            Resource::Secret(_) => ResourceKind::Secret,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Pod(p) => p.metadata(),
            Resource::ConfigMap(c) => c.metadata(),
            Resource::Secret(s) => s.metadata(),
        }
    }

    /// Return a copy with its namespace replaced
    pub fn in_namespace(&self, namespace: &str) -> Resource {
        let mut meta = self.metadata().clone();
        meta.namespace = namespace.to_string();
        match self {
            Resource::Pod(p) => Resource::Pod(p.with_metadata(meta)),
            Resource::ConfigMap(c) => Resource::ConfigMap(c.with_metadata(meta)),
            Resource::Secret(s) => Resource::Secret(s.with_metadata(meta)),
        }
    }
}

/// A list of resources, as stored in cluster state and printed by `-o json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceList<T> {
    /// API version
    #[serde(rename = "apiVersion")]
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind (e.g., "PodList", "List")
    #[serde(default)]
    pub kind: String,

    /// List of items
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

fn default_api_version() -> String {
    CORE_API_VERSION.to_string()
}

impl<T> ResourceList<T> {
    /// Create a new resource list
    pub fn new(kind: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            api_version: CORE_API_VERSION.to_string(),
            kind: kind.into(),
            items,
        }
    }
}

/// Label selector for filtering resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    /// Match exact labels
    #[serde(rename = "matchLabels")]
    #[serde(default)]
    pub match_labels: KeyValues,
}

impl LabelSelector {
    /// Create a selector that matches a specific label
    pub fn matching(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut labels = KeyValues::new();
        labels.insert(key.into(), value.into());
        Self {
            match_labels: labels,
        }
    }

    pub fn from_labels(match_labels: KeyValues) -> Self {
        Self { match_labels }
    }

    /// Check if labels match this selector. An empty selector matches
    /// everything.
    pub fn matches(&self, labels: Option<&KeyValues>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
    }
}
