//! Integration tests for the event flow between commands, the bus and the
//! store

use std::sync::Arc;

use parking_lot::Mutex;

use kubesim::cluster::{
    filters, ClusterStateData, ConfigMap, EventPayload, EventType, Object, Pod, ResourceChange,
};
use kubesim::config::{DispatchMode, HistoryConfig, SimulatorConfig};
use kubesim::ClusterSession;

const TWO_CONFIGMAPS: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: one\ndata:\n  a: \"1\"\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: two\n";

fn session_with(dispatch: DispatchMode) -> ClusterSession {
    ClusterSession::new(SimulatorConfig {
        dispatch,
        ..SimulatorConfig::default()
    })
}

fn types(session: &ClusterSession) -> Vec<EventType> {
    session.history().iter().map(|e| e.event_type).collect()
}

#[test]
fn test_mutations_emit_one_event_each() {
    let session = ClusterSession::default();
    session.execute("kubectl create configmap cfg --from-literal=a=1").unwrap();
    session.execute("kubectl label cm cfg team=core").unwrap();
    session.execute("kubectl annotate cm cfg note=hi").unwrap();
    session.execute("kubectl delete cm cfg").unwrap();

    assert_eq!(
        types(&session),
        vec![
            EventType::ConfigMapCreated,
            EventType::ConfigMapLabeled,
            EventType::ConfigMapAnnotated,
            EventType::ConfigMapDeleted,
        ]
    );
}

#[test]
fn test_reads_and_failures_emit_nothing() {
    let session = ClusterSession::default();
    session.execute("kubectl get pods -A").unwrap();
    session.execute("kubectl describe pod nginx").unwrap();
    session.execute("kubectl logs nginx").unwrap();
    session.execute("kubectl exec nginx -- ls").unwrap();
    assert!(session.execute("kubectl delete pod ghost").is_err());
    assert!(session.execute("kubectl label pod nginx app=other").is_err());
    assert!(session.history().is_empty());
}

#[test]
fn test_one_command_shares_correlation_id() {
    let session = ClusterSession::default();
    session.add_file("cms.yaml", TWO_CONFIGMAPS).unwrap();
    session.execute("kubectl apply -f cms.yaml").unwrap();
    session.execute("kubectl delete cm one").unwrap();

    let history = session.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].metadata.correlation_id, history[1].metadata.correlation_id);
    assert_ne!(history[1].metadata.correlation_id, history[2].metadata.correlation_id);
    assert!(history.iter().all(|e| e.metadata.source == "kubectl"));
}

#[test]
fn test_label_event_carries_previous_and_delta() {
    let session = ClusterSession::default();
    session.execute("kubectl label pod nginx tier=web").unwrap();

    let history = session.history();
    let EventPayload::Pod(ResourceChange::Labeled {
        resource,
        previous,
        changes,
    }) = &history[0].payload
    else {
        panic!("expected a pod label event, got {:?}", history[0].event_type);
    };
    assert_eq!(previous.metadata.label("tier"), None);
    assert_eq!(resource.metadata.label("tier"), Some("web"));
    assert_eq!(changes.get("tier"), Some(&Some("web".to_string())));
}

#[test]
fn test_store_is_updated_before_observers_run() {
    let session = ClusterSession::default();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let store = session.store().clone();
    let sink = seen.clone();
    session.bus().subscribe_all(move |event| {
        let present = store
            .find::<ConfigMap>(event.resource_name(), event.namespace())
            .is_ok();
        sink.lock().push((event.event_type, present));
    });

    session.execute("kubectl create configmap watched --from-literal=a=1").unwrap();
    session.execute("kubectl delete configmap watched").unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            (EventType::ConfigMapCreated, true),
            (EventType::ConfigMapDeleted, false),
        ]
    );
}

#[test]
fn test_filtered_history() {
    let session = ClusterSession::default();
    session.execute("kubectl create configmap a --from-literal=k=v -n team").unwrap();
    session.execute("kubectl create configmap b --from-literal=k=v").unwrap();
    session.execute("kubectl label pod nginx x=y").unwrap();

    let team = session.bus().get_history_filtered(&filters::by_namespace("team"));
    assert_eq!(team.len(), 1);

    let not_pods = session
        .bus()
        .get_history_filtered(&filters::not(filters::by_resource_kind(Pod::KIND)));
    assert_eq!(not_pods.len(), 2);
}

#[test]
fn test_history_is_bounded() {
    let session = ClusterSession::new(SimulatorConfig {
        history: HistoryConfig {
            enabled: true,
            max_size: 2,
        },
        ..SimulatorConfig::default()
    });
    for name in ["a", "b", "c"] {
        session
            .execute(&format!("kubectl create configmap {} --from-literal=k=v", name))
            .unwrap();
    }
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].resource_name(), "b");
    assert_eq!(history[1].resource_name(), "c");
}

#[test]
fn test_direct_dispatch_matches_event_dispatch() {
    let script = [
        "kubectl create configmap cfg --from-literal=a=1",
        "kubectl label cm cfg team=core",
        "kubectl create secret generic token --from-literal=t=x -n ops",
        "kubectl annotate secret token -n ops owner=sre",
        "kubectl delete pod nginx",
        "kubectl label pods -n kube-system -l tier=control-plane managed=yes",
    ];

    let summarize = |state: &ClusterStateData| {
        let mut rows: Vec<String> = state
            .pods
            .items
            .iter()
            .map(|p| format!("{} {:?}", p.reference(), p.metadata.labels))
            .chain(
                state
                    .config_maps
                    .items
                    .iter()
                    .map(|c| format!("{} {:?} {:?}", c.reference(), c.metadata.labels, c.data)),
            )
            .chain(state.secrets.items.iter().map(|s| {
                format!(
                    "{}/{} {:?} {:?}",
                    s.reference(),
                    s.metadata.namespace,
                    s.metadata.annotations,
                    s.data
                )
            }))
            .collect();
        rows.sort();
        rows
    };

    let seed = ClusterSession::default().store().export_state();
    let mut results = Vec::new();
    for dispatch in [DispatchMode::Events, DispatchMode::Direct] {
        let config = SimulatorConfig {
            dispatch,
            ..SimulatorConfig::default()
        };
        let session = ClusterSession::with_state(config, seed.clone());
        for line in script {
            session.execute(line).unwrap();
        }
        let expected_history = if dispatch == DispatchMode::Events { 9 } else { 0 };
        assert_eq!(session.history().len(), expected_history, "{:?}", dispatch);
        results.push(summarize(&session.store().export_state()));
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_snapshots_are_immutable() {
    let session = session_with(DispatchMode::Events);
    let before = session.store().snapshot();
    session.execute("kubectl delete pod nginx").unwrap();
    let after = session.store().snapshot();

    assert!(before.pods.items.iter().any(|p| p.name() == "nginx"));
    assert!(!after.pods.items.iter().any(|p| p.name() == "nginx"));
    assert_eq!(before.pods.items.len(), after.pods.items.len() + 1);
}
