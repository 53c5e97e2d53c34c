//! Cluster state store
//!
//! [`ClusterStateData`] is a plain value holding the three resource
//! collections. The free functions in this module are pure: they take a
//! state and return a new one, never touching their input. Resources are
//! held as `Arc<T>`, so copying a state only copies pointers and a query
//! result can never be mutated through.
//!
//! [`ClusterStore`] is the facade most callers use. It owns the current
//! state and replaces it wholesale on every change.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::bus::{EventBus, Subscription};
use super::configmap::ConfigMap;
use super::events::{ClusterEvent, EventType};
use super::pod::Pod;
use super::reducers;
use super::resources::{Object, ResourceKind, ResourceList, BUILTIN_NAMESPACES};
use super::secret::Secret;

/// Errors returned by store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{} \"{name}\" not found in namespace \"{namespace}\"", .kind.plural())]
    NotFound {
        kind: ResourceKind,
        name: String,
        namespace: String,
    },

    #[error("invalid state snapshot: {0}")]
    Snapshot(String),
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, name: &str, namespace: &str) -> Self {
        StoreError::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

/// The full state of a simulated cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStateData {
    pub pods: ResourceList<Arc<Pod>>,

    #[serde(rename = "configMaps")]
    pub config_maps: ResourceList<Arc<ConfigMap>>,

    pub secrets: ResourceList<Arc<Secret>>,
}

impl Default for ClusterStateData {
    fn default() -> Self {
        Self {
            pods: ResourceList::new("PodList", Vec::new()),
            config_maps: ResourceList::new("ConfigMapList", Vec::new()),
            secrets: ResourceList::new("SecretList", Vec::new()),
        }
    }
}

impl ClusterStateData {
    /// Namespaces in use by any resource, plus the built-in ones, sorted
    pub fn namespaces(&self) -> Vec<String> {
        let mut set: BTreeSet<String> = BUILTIN_NAMESPACES.iter().map(|s| s.to_string()).collect();
        set.extend(self.pods.items.iter().map(|p| p.namespace().to_string()));
        set.extend(self.config_maps.items.iter().map(|c| c.namespace().to_string()));
        set.extend(self.secrets.items.iter().map(|s| s.namespace().to_string()));
        set.into_iter().collect()
    }

    pub fn resource_count(&self) -> usize {
        self.pods.items.len() + self.config_maps.items.len() + self.secrets.items.len()
    }
}

/// A resource kind with a collection in [`ClusterStateData`]
pub trait StoredResource: Object {
    fn collection(state: &ClusterStateData) -> &Vec<Arc<Self>>;
    fn collection_mut(state: &mut ClusterStateData) -> &mut Vec<Arc<Self>>;
}

impl StoredResource for Pod {
    fn collection(state: &ClusterStateData) -> &Vec<Arc<Self>> {
        &state.pods.items
    }
    fn collection_mut(state: &mut ClusterStateData) -> &mut Vec<Arc<Self>> {
        &mut state.pods.items
    }
}

impl StoredResource for ConfigMap {
    fn collection(state: &ClusterStateData) -> &Vec<Arc<Self>> {
        &state.config_maps.items
    }
    fn collection_mut(state: &mut ClusterStateData) -> &mut Vec<Arc<Self>> {
        &mut state.config_maps.items
    }
}

impl StoredResource for Secret {
    fn collection(state: &ClusterStateData) -> &Vec<Arc<Self>> {
        &state.secrets.items
    }
    fn collection_mut(state: &mut ClusterStateData) -> &mut Vec<Arc<Self>> {
        &mut state.secrets.items
    }
}

// ============================================================================
// Pure operations
// ============================================================================

fn position<R: StoredResource>(state: &ClusterStateData, name: &str, namespace: &str) -> Option<usize> {
    R::collection(state)
        .iter()
        .position(|r| r.name() == name && r.namespace() == namespace)
}

/// Append a resource. Uniqueness is the caller's responsibility.
pub fn add<R: StoredResource>(state: &ClusterStateData, resource: Arc<R>) -> ClusterStateData {
    let mut next = state.clone();
    R::collection_mut(&mut next).push(resource);
    next
}

/// Remove a resource, returning the new state and the removed resource
pub fn remove<R: StoredResource>(
    state: &ClusterStateData,
    name: &str,
    namespace: &str,
) -> Result<(ClusterStateData, Arc<R>), StoreError> {
    let idx = position::<R>(state, name, namespace)
        .ok_or_else(|| StoreError::not_found(R::KIND, name, namespace))?;
    let mut next = state.clone();
    let removed = R::collection_mut(&mut next).remove(idx);
    Ok((next, removed))
}

/// Replace a resource with `f(current)`, keeping its list position
pub fn update<R, F>(
    state: &ClusterStateData,
    name: &str,
    namespace: &str,
    f: F,
) -> Result<(ClusterStateData, Arc<R>), StoreError>
where
    R: StoredResource,
    F: FnOnce(&R) -> R,
{
    let idx = position::<R>(state, name, namespace)
        .ok_or_else(|| StoreError::not_found(R::KIND, name, namespace))?;
    let mut next = state.clone();
    let items = R::collection_mut(&mut next);
    let updated = Arc::new(f(&items[idx]));
    items[idx] = updated.clone();
    Ok((next, updated))
}

/// Insert a resource, or replace the one with the same identity in place
pub fn upsert<R: StoredResource>(state: &ClusterStateData, resource: Arc<R>) -> ClusterStateData {
    let mut next = state.clone();
    match position::<R>(state, resource.name(), resource.namespace()) {
        Some(idx) => R::collection_mut(&mut next)[idx] = resource,
        None => R::collection_mut(&mut next).push(resource),
    }
    next
}

pub fn find<R: StoredResource>(
    state: &ClusterStateData,
    name: &str,
    namespace: &str,
) -> Result<Arc<R>, StoreError> {
    position::<R>(state, name, namespace)
        .map(|idx| R::collection(state)[idx].clone())
        .ok_or_else(|| StoreError::not_found(R::KIND, name, namespace))
}

/// Resources in `namespace`, or in every namespace when `None`, in
/// insertion order
pub fn list<R: StoredResource>(state: &ClusterStateData, namespace: Option<&str>) -> Vec<Arc<R>> {
    R::collection(state)
        .iter()
        .filter(|r| namespace.map_or(true, |ns| r.namespace() == ns))
        .cloned()
        .collect()
}

// ============================================================================
// Facade
// ============================================================================

/// Shared handle to the current cluster state
///
/// Query results are `Arc`s and cannot be modified:
///
/// ```compile_fail
/// use kubesim::cluster::{ClusterStore, Container, Pod};
///
/// let store = ClusterStore::new();
/// store.add_pod(Pod::new("web", "default", vec![Container::new("web", "nginx")]));
/// let pod = store.find_pod("web", "default").unwrap();
/// pod.metadata.name = "renamed".to_string();
/// ```
#[derive(Clone, Default)]
pub struct ClusterStore {
    state: Arc<RwLock<Arc<ClusterStateData>>>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::with_state(ClusterStateData::default())
    }

    pub fn with_state(state: ClusterStateData) -> Self {
        Self {
            state: Arc::new(RwLock::new(Arc::new(state))),
        }
    }

    /// The current state value
    pub fn snapshot(&self) -> Arc<ClusterStateData> {
        self.state.read().clone()
    }

    fn replace(&self, next: ClusterStateData) {
        trace!(resources = next.resource_count(), "Replacing cluster state");
        *self.state.write() = Arc::new(next);
    }

    /// Apply the reducer for `event` to the held state
    pub fn apply_event(&self, event: &ClusterEvent) {
        let mut guard = self.state.write();
        let next = reducers::apply_event(&guard, event);
        *guard = Arc::new(next);
    }

    /// Subscribe a reducer for every event type on `bus`
    pub fn attach(&self, bus: &EventBus) -> StoreBinding {
        let subscriptions = EventType::ALL
            .iter()
            .map(|&event_type| {
                let store = self.clone();
                let reducer = reducers::reducer_for(event_type);
                bus.subscribe(event_type, move |event| {
                    let mut guard = store.state.write();
                    let next = reducer(&guard, event);
                    *guard = Arc::new(next);
                })
            })
            .collect::<Vec<_>>();
        debug!(subscriptions = subscriptions.len(), "Store attached to event bus");
        StoreBinding { subscriptions }
    }

    // ========================================================================
    // Persistence boundary
    // ========================================================================

    pub fn export_state(&self) -> ClusterStateData {
        self.snapshot().as_ref().clone()
    }

    pub fn import_state(&self, state: ClusterStateData) {
        debug!(resources = state.resource_count(), "Importing cluster state");
        self.replace(state);
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self.snapshot().as_ref())
            .map_err(|e| StoreError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let state: ClusterStateData =
            serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Ok(Self::with_state(state))
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.snapshot().namespaces()
    }

    // ========================================================================
    // Generic access
    // ========================================================================

    pub fn list<R: StoredResource>(&self, namespace: Option<&str>) -> Vec<Arc<R>> {
        list(&self.snapshot(), namespace)
    }

    pub fn find<R: StoredResource>(&self, name: &str, namespace: &str) -> Result<Arc<R>, StoreError> {
        find(&self.snapshot(), name, namespace)
    }

    pub fn add<R: StoredResource>(&self, resource: R) -> Arc<R> {
        let resource = Arc::new(resource);
        let mut guard = self.state.write();
        *guard = Arc::new(add(&guard, resource.clone()));
        resource
    }

    pub fn remove<R: StoredResource>(&self, name: &str, namespace: &str) -> Result<Arc<R>, StoreError> {
        let mut guard = self.state.write();
        let (next, removed) = remove(&guard, name, namespace)?;
        *guard = Arc::new(next);
        Ok(removed)
    }

    pub fn update<R, F>(&self, name: &str, namespace: &str, f: F) -> Result<Arc<R>, StoreError>
    where
        R: StoredResource,
        F: FnOnce(&R) -> R,
    {
        let mut guard = self.state.write();
        let (next, updated) = update(&guard, name, namespace, f)?;
        *guard = Arc::new(next);
        Ok(updated)
    }

    // ========================================================================
    // Per-kind conveniences
    // ========================================================================

    pub fn get_pods(&self, namespace: Option<&str>) -> Vec<Arc<Pod>> {
        self.list(namespace)
    }

    pub fn add_pod(&self, pod: Pod) -> Arc<Pod> {
        self.add(pod)
    }

    pub fn remove_pod(&self, name: &str, namespace: &str) -> Result<Arc<Pod>, StoreError> {
        self.remove(name, namespace)
    }

    pub fn update_pod<F: FnOnce(&Pod) -> Pod>(
        &self,
        name: &str,
        namespace: &str,
        f: F,
    ) -> Result<Arc<Pod>, StoreError> {
        self.update(name, namespace, f)
    }

    pub fn find_pod(&self, name: &str, namespace: &str) -> Result<Arc<Pod>, StoreError> {
        self.find(name, namespace)
    }

    pub fn get_config_maps(&self, namespace: Option<&str>) -> Vec<Arc<ConfigMap>> {
        self.list(namespace)
    }

    pub fn add_config_map(&self, config_map: ConfigMap) -> Arc<ConfigMap> {
        self.add(config_map)
    }

    pub fn remove_config_map(&self, name: &str, namespace: &str) -> Result<Arc<ConfigMap>, StoreError> {
        self.remove(name, namespace)
    }

    pub fn update_config_map<F: FnOnce(&ConfigMap) -> ConfigMap>(
        &self,
        name: &str,
        namespace: &str,
        f: F,
    ) -> Result<Arc<ConfigMap>, StoreError> {
        self.update(name, namespace, f)
    }

    pub fn find_config_map(&self, name: &str, namespace: &str) -> Result<Arc<ConfigMap>, StoreError> {
        self.find(name, namespace)
    }

    pub fn get_secrets(&self, namespace: Option<&str>) -> Vec<Arc<Secret>> {
        self.list(namespace)
    }

    pub fn add_secret(&self, secret: Secret) -> Arc<Secret> {
        self.add(secret)
    }

    pub fn remove_secret(&self, name: &str, namespace: &str) -> Result<Arc<Secret>, StoreError> {
        self.remove(name, namespace)
    }

    pub fn update_secret<F: FnOnce(&Secret) -> Secret>(
        &self,
        name: &str,
        namespace: &str,
        f: F,
    ) -> Result<Arc<Secret>, StoreError> {
        self.update(name, namespace, f)
    }

    pub fn find_secret(&self, name: &str, namespace: &str) -> Result<Arc<Secret>, StoreError> {
        self.find(name, namespace)
    }
}

/// The store's subscriptions on one bus
#[derive(Debug)]
pub struct StoreBinding {
    subscriptions: Vec<Subscription>,
}

impl StoreBinding {
    /// Stop applying events from the bus
    pub fn detach(&self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
    }
}
