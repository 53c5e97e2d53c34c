//! # Simulated Cluster
//!
//! Event-sourced state for a small Kubernetes-like control plane.
//!
//! ## What We Mirror from K8s
//!
//! 1. **Core resources**: Pods (with init containers), ConfigMaps, Secrets
//! 2. **Namespaces**: every resource is identified by (kind, namespace, name)
//! 3. **Labels & Annotations**: with `kubectl label` / `annotate` semantics
//! 4. **Object metadata**: uid, creation timestamp, `apiVersion`/`kind`
//!
//! ## What We Leave Out
//!
//! 1. **Scheduling**: pods have no nodes
//! 2. **Networking**: probes are gated on phase and time only
//! 3. **Controllers**: nothing reconciles in the background
//!
//! ## Data Flow
//!
//! ```text
//!   command ──► handler ──► ClusterEvent ──► EventBus ──► reducer ──► ClusterStore
//!                  ▲                            │
//!                  └──────── snapshot ◄─────────┴──► other subscribers
//! ```
//!
//! Handlers never mutate state themselves: they emit an event, and the
//! store's reducers (subscribed per event type) produce the next state
//! before `emit` returns.

pub mod bus;
pub mod configmap;
pub mod events;
pub mod filters;
pub mod pod;
pub mod reducers;
pub mod resources;
pub mod secret;
pub mod seed;
pub mod state;

pub use bus::{BusConfig, EventBus, EventHandler, Subscription};
pub use configmap::ConfigMap;
pub use events::{ChangeVerb, ClusterEvent, EventMetadata, EventPayload, EventType, ResourceChange};
pub use filters::EventPredicate;
pub use pod::{
    Container, ContainerPort, ContainerState, ContainerStatus, ContainerType, EnvVar, EnvVarSource,
    KeySelector, Pod, PodPhase, PodSpec, PodStatus, Probe, ProbeAction,
};
pub use resources::*;
pub use secret::{Secret, SecretType};
pub use state::{ClusterStateData, ClusterStore, StoreBinding, StoreError, StoredResource};
