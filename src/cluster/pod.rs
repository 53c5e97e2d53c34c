//! Pod resource - the unit of execution in the simulated cluster
//!
//! A Pod declares regular containers and, optionally, init containers that
//! run to completion in order before the regular containers start. Its
//! status tracks one [`ContainerStatus`] per declared container.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resources::{Object, ObjectMeta, ResourceKind, CORE_API_VERSION};
use crate::filesystem::VirtualFileSystem;

/// A Pod in the simulated cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    /// API version (always "v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind is always "Pod"
    pub kind: String,

    /// Metadata about the pod
    pub metadata: ObjectMeta,

    /// Desired state specification
    pub spec: PodSpec,

    /// Current observed status
    #[serde(default)]
    pub status: PodStatus,
}

/// Specification of desired Pod state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Containers run to completion, in order, before `containers` start
    #[serde(rename = "initContainers")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_containers: Option<Vec<Container>>,

    /// Regular containers
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// A container declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,

    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ContainerPort>>,

    #[serde(rename = "livenessProbe")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<Probe>,

    #[serde(rename = "readinessProbe")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<Probe>,

    #[serde(rename = "startupProbe")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_probe: Option<Probe>,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_command(mut self, command: &[&str]) -> Self {
        self.command = Some(command.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_env(mut self, env: Vec<EnvVar>) -> Self {
        self.env = Some(env);
        self
    }

    /// Command and args concatenated, as the runtime would execute them
    pub fn full_command(&self) -> Vec<String> {
        let mut out = self.command.clone().unwrap_or_default();
        out.extend(self.args.clone().unwrap_or_default());
        out
    }
}

/// A port exposed by a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    #[serde(rename = "containerPort")]
    pub container_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Environment variable for a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(rename = "valueFrom")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

/// Source for an environment variable's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarSource {
    #[serde(rename = "configMapKeyRef")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_key_ref: Option<KeySelector>,

    #[serde(rename = "secretKeyRef")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<KeySelector>,
}

/// Selects a key of a ConfigMap or Secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySelector {
    pub name: String,
    pub key: String,
}

/// A health check attached to a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    /// How the probe is performed
    #[serde(flatten)]
    pub action: ProbeAction,

    #[serde(rename = "initialDelaySeconds")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<u32>,

    #[serde(rename = "periodSeconds")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<u32>,

    #[serde(rename = "timeoutSeconds")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,

    #[serde(rename = "failureThreshold")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

impl Probe {
    pub fn new(action: ProbeAction) -> Self {
        Self {
            action,
            initial_delay_seconds: None,
            period_seconds: None,
            timeout_seconds: None,
            failure_threshold: None,
        }
    }

    pub fn with_initial_delay(mut self, seconds: u32) -> Self {
        self.initial_delay_seconds = Some(seconds);
        self
    }
}

/// Probe mechanism
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeAction {
    HttpGet(HttpGetAction),
    Exec(ExecAction),
    TcpSocket(TcpSocketAction),
}

impl fmt::Display for ProbeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeAction::HttpGet(h) => write!(
                f,
                "http-get :{}{}",
                h.port,
                h.path.as_deref().unwrap_or("/")
            ),
            ProbeAction::Exec(e) => write!(f, "exec [{}]", e.command.join(" ")),
            ProbeAction::TcpSocket(t) => write!(f, "tcp-socket :{}", t.port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGetAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub port: PortRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecAction {
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSocketAction {
    pub port: PortRef,
}

/// A port given by number or by container port name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRef {
    Number(u16),
    Name(String),
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRef::Number(n) => write!(f, "{}", n),
            PortRef::Name(s) => f.write_str(s),
        }
    }
}

/// Phase of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Whether a status belongs to an init or a regular container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Regular,
    Init,
}

/// Lifecycle state of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerState {
    Waiting {
        reason: String,
    },
    Running {
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
    },
    Terminated {
        #[serde(rename = "exitCode")]
        exit_code: i32,
        reason: String,
    },
}

impl ContainerState {
    pub fn waiting(reason: impl Into<String>) -> Self {
        ContainerState::Waiting {
            reason: reason.into(),
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, ContainerState::Waiting { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, ContainerState::Terminated { .. })
    }

    /// Short name of the state ("Waiting", "Running", "Terminated")
    pub fn name(&self) -> &'static str {
        match self {
            ContainerState::Waiting { .. } => "Waiting",
            ContainerState::Running { .. } => "Running",
            ContainerState::Terminated { .. } => "Terminated",
        }
    }
}

/// Observed status of one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,

    #[serde(rename = "containerType")]
    pub container_type: ContainerType,

    pub image: String,

    pub state: ContainerState,

    pub ready: bool,

    #[serde(rename = "restartCount")]
    #[serde(default)]
    pub restart_count: u32,

    /// Root filesystem snapshot left behind by the container
    #[serde(rename = "fileSystem")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system: Option<VirtualFileSystem>,
}

impl ContainerStatus {
    /// A fresh status in the `Waiting` state
    pub fn waiting(container: &Container, container_type: ContainerType, reason: &str) -> Self {
        Self {
            name: container.name.clone(),
            container_type,
            image: container.image.clone(),
            state: ContainerState::waiting(reason),
            ready: false,
            restart_count: 0,
            file_system: None,
        }
    }
}

/// Current status of a Pod (observed state)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodStatus {
    pub phase: PodPhase,

    #[serde(rename = "containerStatuses")]
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,

    /// Recorded log lines; synthesized on demand when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
}

impl Pod {
    /// Create a new Pod with the given containers and a pending status
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        containers: Vec<Container>,
    ) -> Self {
        Self::from_parts(ObjectMeta::new(name, namespace), PodSpec {
            init_containers: None,
            containers,
        })
    }

    /// Build a Pod from metadata and spec, with its initial status
    pub fn from_parts(metadata: ObjectMeta, spec: PodSpec) -> Self {
        let pod = Self {
            api_version: CORE_API_VERSION.to_string(),
            kind: "Pod".to_string(),
            metadata,
            spec,
            status: PodStatus::default(),
        };
        let status = pod.initial_status();
        Self { status, ..pod }
    }

    pub fn with_init_containers(mut self, init: Vec<Container>) -> Self {
        self.spec.init_containers = if init.is_empty() { None } else { Some(init) };
        self.status = self.initial_status();
        self
    }

    pub fn with_status(&self, status: PodStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_logs(&self, logs: Vec<String>) -> Self {
        let mut status = self.status.clone();
        status.logs = Some(logs);
        self.with_status(status)
    }

    /// The pending status of a freshly created pod: every container waiting
    pub fn initial_status(&self) -> PodStatus {
        let init = self.init_containers();
        let regular_reason = if init.is_empty() {
            "ContainerCreating"
        } else {
            "PodInitializing"
        };
        let container_statuses = init
            .iter()
            .map(|c| ContainerStatus::waiting(c, ContainerType::Init, "PodInitializing"))
            .chain(
                self.spec
                    .containers
                    .iter()
                    .map(|c| ContainerStatus::waiting(c, ContainerType::Regular, regular_reason)),
            )
            .collect();
        PodStatus {
            phase: PodPhase::Pending,
            container_statuses,
            logs: self.status.logs.clone(),
        }
    }

    pub fn init_containers(&self) -> &[Container] {
        self.spec.init_containers.as_deref().unwrap_or(&[])
    }

    pub fn phase(&self) -> PodPhase {
        self.status.phase
    }

    /// Find a regular container by name, or the first one when `name` is None
    pub fn container(&self, name: Option<&str>) -> Option<&Container> {
        match name {
            Some(n) => self.spec.containers.iter().find(|c| c.name == n),
            None => self.spec.containers.first(),
        }
    }

    pub fn container_status(&self, name: &str, container_type: ContainerType) -> Option<&ContainerStatus> {
        self.status
            .container_statuses
            .iter()
            .find(|s| s.name == name && s.container_type == container_type)
    }

    /// (ready, total) over regular containers
    pub fn ready_count(&self) -> (usize, usize) {
        let regular = self
            .status
            .container_statuses
            .iter()
            .filter(|s| s.container_type == ContainerType::Regular);
        let total = self.spec.containers.len();
        (regular.filter(|s| s.ready).count(), total)
    }

    pub fn restart_count(&self) -> u32 {
        self.status
            .container_statuses
            .iter()
            .filter(|s| s.container_type == ContainerType::Regular)
            .map(|s| s.restart_count)
            .sum()
    }
}

impl Object for Pod {
    const KIND: ResourceKind = ResourceKind::Pod;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn with_metadata(&self, metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    fn same_definition(&self, other: &Self) -> bool {
        self.spec == other.spec
            && self.metadata.labels == other.metadata.labels
            && self.metadata.annotations == other.metadata.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_pod() -> Pod {
        Pod::new("web", "default", vec![Container::new("nginx", "nginx:1.25")])
    }

    #[test]
    fn test_new_pod_is_pending() {
        let pod = web_pod();
        assert_eq!(pod.phase(), PodPhase::Pending);
        assert_eq!(pod.kind, "Pod");
        assert_eq!(pod.status.container_statuses.len(), 1);
        assert_eq!(
            pod.status.container_statuses[0].state,
            ContainerState::waiting("ContainerCreating")
        );
    }

    #[test]
    fn test_initial_status_includes_init_containers() {
        let pod = web_pod().with_init_containers(vec![Container::new("setup", "busybox")]);
        let statuses = &pod.status.container_statuses;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].container_type, ContainerType::Init);
        assert_eq!(statuses[1].state, ContainerState::waiting("PodInitializing"));
    }

    #[test]
    fn test_same_definition_ignores_status() {
        let a = web_pod();
        let mut status = a.status.clone();
        status.phase = PodPhase::Running;
        let b = a.with_status(status);
        assert!(a.same_definition(&b));
    }

    #[test]
    fn test_probe_serde_camel_case() {
        let json = r#"{"httpGet":{"path":"/healthz","port":8080},"initialDelaySeconds":10}"#;
        let probe: Probe = serde_json::from_str(json).unwrap();
        assert_eq!(probe.initial_delay_seconds, Some(10));
        assert!(matches!(probe.action, ProbeAction::HttpGet(_)));
        assert_eq!(probe.action.to_string(), "http-get :8080/healthz");
    }

    #[test]
    fn test_container_state_serde() {
        let state = ContainerState::Terminated {
            exit_code: 0,
            reason: "Completed".into(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["terminated"]["exitCode"], 0);
    }

    #[test]
    fn test_container_lookup() {
        let pod = web_pod();
        assert_eq!(pod.container(None).unwrap().name, "nginx");
        assert!(pod.container(Some("sidecar")).is_none());
        assert_eq!(pod.reference(), "pod/web");
    }
}
