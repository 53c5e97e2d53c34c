//! Probe evaluation
//!
//! Probes are gated on pod phase and on the configured initial delay only.
//! Reachability is not modelled, so a probe on a running pod past its
//! delay always succeeds, whatever its mechanism.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::cluster::pod::{Container, Pod, PodPhase, Probe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Liveness,
    Readiness,
    Startup,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbeKind::Liveness => "Liveness",
            ProbeKind::Readiness => "Readiness",
            ProbeKind::Startup => "Startup",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure { reason: String },
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Success => f.write_str("success"),
            ProbeOutcome::Failure { reason } => write!(f, "failure ({})", reason),
        }
    }
}

/// Evaluate one probe for a pod in `phase`, `elapsed_ms` after creation
pub fn evaluate_probe(probe: &Probe, phase: PodPhase, elapsed_ms: u64) -> ProbeOutcome {
    match phase {
        PodPhase::Running => {}
        PodPhase::Failed => {
            return ProbeOutcome::Failure {
                reason: "pod has failed".to_string(),
            }
        }
        other => {
            return ProbeOutcome::Failure {
                reason: format!("pod not ready (phase {})", other),
            }
        }
    }

    let delay_ms = u64::from(probe.initial_delay_seconds.unwrap_or(0)) * 1000;
    if elapsed_ms < delay_ms {
        return ProbeOutcome::Failure {
            reason: format!(
                "within initial delay ({}s, {}ms elapsed)",
                delay_ms / 1000,
                elapsed_ms
            ),
        };
    }

    ProbeOutcome::Success
}

/// Milliseconds since the pod was created. Zero for a clock that went
/// backwards.
pub fn elapsed_since_creation(pod: &Pod, now: DateTime<Utc>) -> u64 {
    let millis = (now - pod.metadata.creation_timestamp).num_milliseconds();
    u64::try_from(millis).unwrap_or(0)
}

/// Evaluate every probe configured on `container`
pub fn evaluate_container_probes(
    pod: &Pod,
    container: &Container,
    now: DateTime<Utc>,
) -> Vec<(ProbeKind, ProbeOutcome)> {
    let elapsed = elapsed_since_creation(pod, now);
    [
        (ProbeKind::Liveness, &container.liveness_probe),
        (ProbeKind::Readiness, &container.readiness_probe),
        (ProbeKind::Startup, &container.startup_probe),
    ]
    .into_iter()
    .filter_map(|(kind, probe)| {
        probe
            .as_ref()
            .map(|p| (kind, evaluate_probe(p, pod.phase(), elapsed)))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::pod::{ExecAction, HttpGetAction, PortRef, ProbeAction, TcpSocketAction};

    fn http(delay: u32) -> Probe {
        Probe::new(ProbeAction::HttpGet(HttpGetAction {
            path: Some("/healthz".into()),
            port: PortRef::Number(8080),
        }))
        .with_initial_delay(delay)
    }

    #[test]
    fn test_initial_delay_gates_success() {
        let probe = http(10);
        let early = evaluate_probe(&probe, PodPhase::Running, 5_000);
        assert!(matches!(early, ProbeOutcome::Failure { ref reason } if reason.contains("initial delay")));
        assert_eq!(evaluate_probe(&probe, PodPhase::Running, 15_000), ProbeOutcome::Success);
        assert_eq!(evaluate_probe(&probe, PodPhase::Running, 10_000), ProbeOutcome::Success);
    }

    #[test]
    fn test_phase_gating() {
        let probe = http(0);
        match evaluate_probe(&probe, PodPhase::Pending, 60_000) {
            ProbeOutcome::Failure { reason } => assert!(reason.contains("not ready")),
            ProbeOutcome::Success => panic!("pending pod must not pass"),
        }
        match evaluate_probe(&probe, PodPhase::Failed, 60_000) {
            ProbeOutcome::Failure { reason } => {
                assert!(reason.contains("failed"));
                assert!(!reason.contains("not ready"));
            }
            ProbeOutcome::Success => panic!("failed pod must not pass"),
        }
    }

    #[test]
    fn test_mechanism_does_not_matter() {
        let exec = Probe::new(ProbeAction::Exec(ExecAction {
            command: vec!["cat".into(), "/tmp/healthy".into()],
        }));
        let tcp = Probe::new(ProbeAction::TcpSocket(TcpSocketAction {
            port: PortRef::Name("http".into()),
        }));
        assert!(evaluate_probe(&exec, PodPhase::Running, 0).is_success());
        assert!(evaluate_probe(&tcp, PodPhase::Running, 0).is_success());
    }

    #[test]
    fn test_container_probes_only_configured_ones() {
        let mut container = Container::new("web", "nginx");
        container.readiness_probe = Some(http(0));
        let pod = Pod::new("web", "default", vec![container.clone()]);
        let results = evaluate_container_probes(&pod, &container, Utc::now());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, ProbeKind::Readiness);
        // Freshly created pods are still pending
        assert!(!results[0].1.is_success());
    }
}
