//! kubesim - an event-sourced Kubernetes control plane simulator
//!
//! Command lines in the style of `kubectl` are parsed, turned into
//! [`cluster::ClusterEvent`]s, and folded into an immutable
//! [`cluster::ClusterStore`] by per-event reducers. Pods are driven
//! through their init containers by [`runtime::InitContainerReconciler`].
//! [`session::ClusterSession`] wires the pieces together.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod filesystem;
pub mod runtime;
pub mod session;
pub mod shell;

pub use session::ClusterSession;
