//! Simulated container runtime
//!
//! Everything that stands in for a kubelet: image validation, running init
//! containers, probe gating and container logs.

pub mod container;
pub mod logs;
pub mod probes;
pub mod reconciler;
pub mod registry;

pub use container::{ContainerRuntime, ExecutionFailure, SimulatedRuntime};
pub use logs::generate_logs;
pub use probes::{evaluate_container_probes, evaluate_probe, ProbeKind, ProbeOutcome};
pub use reconciler::{reconcile_init_containers, InitContainerReconciler};
pub use registry::{ImageError, ImageReference, ImageRegistry, StaticRegistry};
