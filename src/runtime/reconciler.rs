//! Init container reconciler
//!
//! Drives a pod from its pending status to `Running` or `Failed`:
//!
//! 1. Init containers run one at a time, in declared order. Each starts
//!    from a fresh base filesystem.
//! 2. An image the registry rejects, or a command that exits non-zero,
//!    terminates that container and fails the pod. Later init containers
//!    stay `Waiting`.
//! 3. When every init container completed, the regular containers start
//!    and the pod is `Running`.
//!
//! There are no retries. A pass always starts from the pod's initial
//! status, so reconciling the same pod twice gives the same result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::container::{ContainerRuntime, SimulatedRuntime};
use super::registry::{ImageRegistry, StaticRegistry};
use crate::cluster::pod::{ContainerState, ContainerType, Pod, PodPhase, PodStatus};
use crate::cluster::resources::Object;
use crate::filesystem::VirtualFileSystem;

/// Reconciler with its registry and runtime collaborators
#[derive(Clone)]
pub struct InitContainerReconciler {
    registry: Arc<dyn ImageRegistry>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl Default for InitContainerReconciler {
    fn default() -> Self {
        Self::new(Arc::new(StaticRegistry::default()), Arc::new(SimulatedRuntime))
    }
}

impl InitContainerReconciler {
    pub fn new(registry: Arc<dyn ImageRegistry>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { registry, runtime }
    }

    pub fn reconcile(&self, pod: &Pod) -> Pod {
        reconcile_init_containers(pod, self.registry.as_ref(), self.runtime.as_ref())
    }
}

fn status_index(status: &PodStatus, name: &str, container_type: ContainerType) -> Option<usize> {
    status
        .container_statuses
        .iter()
        .position(|s| s.name == name && s.container_type == container_type)
}

fn terminate(status: &mut PodStatus, name: &str, exit_code: i32, reason: &str) {
    if let Some(idx) = status_index(status, name, ContainerType::Init) {
        let s = &mut status.container_statuses[idx];
        s.state = ContainerState::Terminated {
            exit_code,
            reason: reason.to_string(),
        };
        s.ready = false;
    }
}

/// Run `pod`'s init containers and return the resulting pod
pub fn reconcile_init_containers(
    pod: &Pod,
    registry: &dyn ImageRegistry,
    runtime: &dyn ContainerRuntime,
) -> Pod {
    let mut status = pod.initial_status();
    let reference = pod.reference();

    for init in pod.init_containers() {
        if let Err(e) = registry.validate_image(&init.image) {
            warn!(pod = %reference, container = %init.name, image = %init.image, error = %e, "Init container image rejected");
            terminate(&mut status, &init.name, 1, e.reason());
            status.phase = PodPhase::Failed;
            return pod.with_status(status);
        }

        match runtime.run(init, VirtualFileSystem::container_base()) {
            Ok(fs) => {
                debug!(pod = %reference, container = %init.name, files = fs.file_count(), "Init container completed");
                terminate(&mut status, &init.name, 0, "Completed");
                if let Some(idx) = status_index(&status, &init.name, ContainerType::Init) {
                    status.container_statuses[idx].file_system = Some(fs);
                }
            }
            Err(failure) => {
                warn!(pod = %reference, container = %init.name, exit_code = failure.exit_code, "Init container failed");
                terminate(&mut status, &init.name, failure.exit_code, "Error");
                status.phase = PodPhase::Failed;
                return pod.with_status(status);
            }
        }
    }

    let started = start_regular_containers(status, Utc::now());
    info!(pod = %reference, namespace = %pod.namespace(), "Pod running");
    pod.with_status(started)
}

/// Mark every regular container `Running` and ready, and the pod `Running`
pub fn start_regular_containers(mut status: PodStatus, now: DateTime<Utc>) -> PodStatus {
    for s in status
        .container_statuses
        .iter_mut()
        .filter(|s| s.container_type == ContainerType::Regular)
    {
        s.state = ContainerState::Running { started_at: now };
        s.ready = true;
        if s.file_system.is_none() {
            s.file_system = Some(VirtualFileSystem::container_base());
        }
    }
    status.phase = PodPhase::Running;
    status
}
