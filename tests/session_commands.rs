//! Integration tests for the command surface
//!
//! Each test drives a fresh session through command lines, the way the
//! REPL does, and checks the printed output.

use kubesim::config::SimulatorConfig;
use kubesim::ClusterSession;

const WEB_POD: &str = r#"
apiVersion: v1
kind: Pod
metadata:
  name: web
  labels:
    app: web
spec:
  initContainers:
  - name: setup
    image: busybox:1.36
    command: ["sh", "-c", "echo ready > /tmp/status"]
  containers:
  - name: app
    image: nginx:1.25
    readinessProbe:
      httpGet:
        path: /healthz
        port: 80
"#;

const BROKEN_POD: &str = r#"
apiVersion: v1
kind: Pod
metadata:
  name: broken
spec:
  initContainers:
  - name: migrate
    image: busybox
    command: ["sh", "-c", "exit 3"]
  - name: never
    image: busybox
  containers:
  - name: app
    image: nginx
"#;

fn seeded() -> ClusterSession {
    ClusterSession::default()
}

fn with_manifest(path: &str, content: &str) -> ClusterSession {
    let session = seeded();
    session.add_file(path, content).unwrap();
    session
}

fn ok(session: &ClusterSession, line: &str) -> String {
    session
        .execute(line)
        .unwrap_or_else(|e| panic!("{} failed: {}", line, e))
}

fn err(session: &ClusterSession, line: &str) -> String {
    match session.execute(line) {
        Ok(out) => panic!("{} unexpectedly succeeded: {}", line, out),
        Err(e) => e,
    }
}

// ============================================================================
// get
// ============================================================================

#[test]
fn test_get_pods_default_namespace() {
    let session = seeded();
    let out = ok(&session, "kubectl get pods");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("NAME"));
    assert!(lines[0].contains("STATUS"));
    assert!(lines[1].starts_with("nginx"));
    assert!(lines[1].contains("Running"));
}

#[test]
fn test_get_pods_other_namespace_and_all() {
    let session = seeded();
    let system = ok(&session, "kubectl get po -n kube-system");
    assert_eq!(system.lines().count(), 6);

    let all = ok(&session, "kubectl get pods -A");
    assert!(all.lines().next().unwrap().starts_with("NAMESPACE"));
    assert_eq!(all.lines().count(), 7);
}

#[test]
fn test_get_missing_pod() {
    let session = seeded();
    let e = err(&session, "kubectl get pod ghost");
    assert!(e.starts_with("Error from server (NotFound): pods \"ghost\" not found"), "{}", e);
}

#[test]
fn test_get_with_selector_and_name_output() {
    let session = seeded();
    let out = ok(&session, "kubectl get pods -A -l tier=control-plane -o name");
    assert_eq!(out.lines().count(), 4);
    assert!(out.lines().all(|l| l.starts_with("pod/kube-") || l == "pod/etcd-control-plane"));

    let none = ok(&session, "kubectl get pods -l app=missing");
    assert_eq!(none, "No resources found in default namespace.");
}

#[test]
fn test_get_json_hides_filesystem_snapshots() {
    let session = seeded();
    let out = ok(&session, "kubectl get pod nginx -o json");
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["kind"], "Pod");
    assert_eq!(value["metadata"]["name"], "nginx");
    assert!(!out.contains("fileSystem"));
}

#[test]
fn test_get_json_keeps_user_keys_named_like_snapshots() {
    let session = seeded();
    ok(&session, "kubectl create configmap fs --from-literal=fileSystem=ext4");
    let out = ok(&session, "kubectl get cm fs -o json");
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["data"]["fileSystem"], "ext4");

    let list = ok(&session, "kubectl get cm -o yaml");
    assert!(list.contains("fileSystem: ext4"), "{}", list);

    let pods = ok(&session, "kubectl get pods -o json");
    let value: serde_json::Value = serde_json::from_str(&pods).unwrap();
    let statuses = value["items"][0]["status"]["containerStatuses"].as_array().unwrap();
    assert!(!statuses.is_empty());
    assert!(statuses.iter().all(|s| s.get("fileSystem").is_none()));
}

#[test]
fn test_get_configmaps_and_secrets() {
    let session = seeded();
    let cms = ok(&session, "kubectl get cm");
    assert!(cms.starts_with("NAME"));
    assert!(cms.contains("app-config"));

    let secrets = ok(&session, "kubectl get secrets");
    let row = secrets.lines().nth(1).unwrap();
    assert!(row.starts_with("db-credentials"));
    assert!(row.contains("Opaque"));
}

#[test]
fn test_get_namespaces_and_empty_kinds() {
    let session = seeded();
    let ns = ok(&session, "kubectl get namespaces");
    for name in ["default", "kube-public", "kube-system"] {
        assert!(ns.lines().any(|l| l.starts_with(name)), "{}", name);
    }
    assert_eq!(
        ok(&session, "kubectl get deployments"),
        "No resources found in default namespace."
    );
    assert_eq!(ok(&session, "kubectl get nodes"), "No resources found");
    assert!(err(&session, "kubectl get svc api").contains("NotFound"));
}

// ============================================================================
// create / apply
// ============================================================================

#[test]
fn test_create_configmap_from_literals() {
    let session = seeded();
    assert_eq!(
        ok(&session, "kubectl create configmap settings --from-literal=mode=dev --from-literal=debug=true"),
        "configmap/settings created"
    );
    let listing = ok(&session, "kubectl get configmap settings");
    assert!(listing.lines().nth(1).unwrap().contains('2'));

    let e = err(&session, "kubectl create configmap settings");
    assert_eq!(
        e,
        "Error from server (AlreadyExists): configmaps \"settings\" already exists"
    );
}

#[test]
fn test_create_generic_secret_stores_base64() {
    let session = seeded();
    ok(&session, "kubectl create secret generic api-key --from-literal=token=abc123 -n kube-public");
    let secret = session
        .store()
        .find_secret("api-key", "kube-public")
        .unwrap();
    assert_eq!(secret.data.as_ref().unwrap()["token"], "YWJjMTIz");
    assert_eq!(secret.decoded("token").as_deref(), Some("abc123"));
}

#[test]
fn test_create_tls_secret_from_files() {
    let session = seeded();
    session.add_file("tls.crt", "CERT").unwrap();
    session.add_file("tls.key", "KEY").unwrap();
    ok(&session, "kubectl create secret tls web-tls --cert=tls.crt --key=tls.key");
    let listing = ok(&session, "kubectl get secret web-tls");
    assert!(listing.contains("kubernetes.io/tls"));

    let e = err(&session, "kubectl create secret tls other --cert=tls.crt");
    assert!(e.contains("--cert and --key"));
}

#[test]
fn test_create_pod_runs_init_containers() {
    let session = with_manifest("/manifests/web.yaml", WEB_POD);
    assert_eq!(ok(&session, "kubectl create -f /manifests/web.yaml"), "pod/web created");

    let listing = ok(&session, "kubectl get pod web");
    assert!(listing.lines().nth(1).unwrap().contains("Running"));

    let detail = ok(&session, "kubectl describe pod web");
    assert!(detail.contains("Init Containers:"));
    assert!(detail.contains("Completed"));
    assert!(detail.contains("PodCreated"));
}

#[test]
fn test_failed_init_container_fails_pod() {
    let session = with_manifest("broken.yaml", BROKEN_POD);
    ok(&session, "kubectl apply -f broken.yaml");
    let listing = ok(&session, "kubectl get pods broken");
    assert!(listing.contains("Init:Error"), "{}", listing);

    let pod = session.store().find_pod("broken", "default").unwrap();
    assert_eq!(pod.phase().to_string(), "Failed");

    let e = err(&session, "kubectl exec broken -- ls");
    assert!(e.contains("completed pod"), "{}", e);
}

#[test]
fn test_apply_is_idempotent_and_keeps_identity() {
    let session = with_manifest("web.yaml", WEB_POD);
    assert_eq!(ok(&session, "kubectl apply -f web.yaml"), "pod/web created");
    let uid = session.store().find_pod("web", "default").unwrap().metadata.uid;

    assert_eq!(ok(&session, "kubectl apply -f web.yaml"), "pod/web unchanged");

    session
        .add_file("web.yaml", &WEB_POD.replace("app: web", "app: web2"))
        .unwrap();
    assert_eq!(ok(&session, "kubectl apply -f web.yaml"), "pod/web configured");
    let pod = session.store().find_pod("web", "default").unwrap();
    assert_eq!(pod.metadata.uid, uid);
    assert_eq!(pod.metadata.label("app"), Some("web2"));
}

#[test]
fn test_create_rejects_whole_file_on_conflict() {
    let manifests = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: fresh\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: app-config\n";
    let session = with_manifest("cms.yaml", manifests);
    let e = err(&session, "kubectl create -f cms.yaml");
    assert!(e.contains("AlreadyExists"));
    assert!(session.store().find_config_map("fresh", "default").is_err());
    assert!(session.history().is_empty());
}

#[test]
fn test_manifest_namespace_mismatch() {
    let manifest = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n  namespace: team-a\n";
    let session = with_manifest("x.yaml", manifest);
    let e = err(&session, "kubectl apply -f x.yaml -n team-b");
    assert!(e.contains("does not match the namespace"), "{}", e);

    ok(&session, "kubectl apply -f x.yaml");
    assert!(session.store().find_config_map("x", "team-a").is_ok());
}

#[test]
fn test_invalid_manifest_is_reported() {
    let session = with_manifest("bad.yaml", "apiVersion: v1\nkind: Deployment\nmetadata:\n  name: d\n");
    let e = err(&session, "kubectl apply -f bad.yaml");
    assert!(e.contains("no matches for kind \"Deployment\""), "{}", e);

    let e = err(&session, "kubectl apply -f missing.yaml");
    assert!(e.contains("No such file or directory"), "{}", e);
}

// ============================================================================
// label / annotate
// ============================================================================

#[test]
fn test_label_overwrite_rules() {
    let session = seeded();
    assert_eq!(ok(&session, "kubectl label pods nginx tier=web"), "pod/nginx labeled");
    let history = session.history().len();

    let e = err(&session, "kubectl label pods nginx tier=web");
    assert_eq!(e, "error: 'tier' already has a value (web), and --overwrite is false");
    let e = err(&session, "kubectl label pods nginx tier=backend");
    assert_eq!(e, "error: 'tier' already has a value (web), and --overwrite is false");
    assert_eq!(session.history().len(), history);
    let pod = session.store().find_pod("nginx", "default").unwrap();
    assert_eq!(pod.metadata.label("tier"), Some("web"));

    assert_eq!(
        ok(&session, "kubectl label pods nginx tier=web --overwrite"),
        "pod/nginx not labeled"
    );

    ok(&session, "kubectl label pods nginx tier=backend --overwrite");
    let pod = session.store().find_pod("nginx", "default").unwrap();
    assert_eq!(pod.metadata.label("tier"), Some("backend"));

    ok(&session, "kubectl label pod/nginx tier-");
    let pod = session.store().find_pod("nginx", "default").unwrap();
    assert_eq!(pod.metadata.label("tier"), None);
}

#[test]
fn test_label_requires_changes() {
    let session = seeded();
    let e = err(&session, "kubectl label pods nginx");
    assert_eq!(e, "error: at least one label update is required");
}

#[test]
fn test_annotate_configmap() {
    let session = seeded();
    assert_eq!(
        ok(&session, "kubectl annotate configmap app-config owner=platform"),
        "configmap/app-config annotated"
    );
    let cm = session.store().find_config_map("app-config", "default").unwrap();
    assert_eq!(
        cm.metadata.annotations.as_ref().unwrap().get("owner").map(String::as_str),
        Some("platform")
    );
    let detail = ok(&session, "kubectl describe cm app-config");
    assert!(detail.contains("owner=platform"));
}

#[test]
fn test_annotate_same_value_needs_overwrite() {
    let session = seeded();
    ok(&session, "kubectl annotate configmap app-config owner=platform");
    let e = err(&session, "kubectl annotate configmap app-config owner=platform");
    assert_eq!(e, "error: 'owner' already has a value (platform), and --overwrite is false");
    assert_eq!(
        ok(&session, "kubectl annotate configmap app-config owner=sre --overwrite"),
        "configmap/app-config annotated"
    );
}

// ============================================================================
// delete
// ============================================================================

#[test]
fn test_delete_by_name_and_selector() {
    let session = seeded();
    assert_eq!(
        ok(&session, "kubectl delete configmap app-config"),
        "configmap \"app-config\" deleted"
    );
    assert!(err(&session, "kubectl get cm app-config").contains("NotFound"));

    let out = ok(&session, "kubectl delete pods -n kube-system -l tier=control-plane");
    assert_eq!(out.lines().count(), 4);
    assert_eq!(ok(&session, "kubectl get pods -n kube-system").lines().count(), 2);
}

#[test]
fn test_delete_requires_target() {
    let session = seeded();
    let e = err(&session, "kubectl delete pods");
    assert!(e.contains("no name was specified"));
    assert!(err(&session, "kubectl delete pod ghost").contains("NotFound"));
}

#[test]
fn test_delete_namespace() {
    let session = seeded();
    ok(&session, "kubectl create configmap a --from-literal=k=v -n scratch");
    ok(&session, "kubectl create secret generic b --from-literal=k=v -n scratch");
    assert_eq!(ok(&session, "kubectl delete namespace scratch"), "namespace \"scratch\" deleted");
    assert!(!session.store().namespaces().contains(&"scratch".to_string()));

    let e = err(&session, "kubectl delete ns kube-system");
    assert!(e.starts_with("Error from server (Forbidden)"), "{}", e);
}

#[test]
fn test_delete_from_file() {
    let session = with_manifest("web.yaml", WEB_POD);
    ok(&session, "kubectl apply -f web.yaml");
    assert_eq!(ok(&session, "kubectl delete -f web.yaml"), "pod \"web\" deleted");
    assert!(err(&session, "kubectl delete -f web.yaml").contains("NotFound"));
}

// ============================================================================
// describe / exec / logs
// ============================================================================

#[test]
fn test_describe_secret_hides_values() {
    let session = seeded();
    let out = ok(&session, "kubectl describe secret db-credentials");
    assert!(out.contains("password:  15 bytes"));
    assert!(out.contains("username:  5 bytes"));
    assert!(!out.contains("s3cr3t"));
    assert!(!out.contains("admin"));
}

#[test]
fn test_describe_pod_shows_probe_outcome() {
    let session = with_manifest("web.yaml", WEB_POD);
    ok(&session, "kubectl apply -f web.yaml");
    let out = ok(&session, "kubectl describe pods web");
    assert!(out.contains("Readiness:"));
    assert!(out.contains("[success]"));
}

#[test]
fn test_exec_env_redacts_references() {
    let session = seeded();
    let out = ok(&session, "kubectl exec nginx -- env");
    assert!(out.contains("HOSTNAME=nginx"));
    assert!(out.contains("NGINX_PORT=80"));
    assert!(out.contains("APP_MODE=<set to the key 'mode' of config map 'app-config'>"));
    assert!(out.contains("DB_PASSWORD=<set to the key 'password' in secret 'db-credentials'>"));
    assert!(!out.contains("s3cr3t"));
}

#[test]
fn test_exec_filesystem_commands() {
    let session = seeded();
    assert_eq!(ok(&session, "kubectl exec nginx -- pwd"), "/");
    assert_eq!(ok(&session, "kubectl exec nginx -- whoami"), "root");
    assert!(ok(&session, "kubectl exec nginx -- ls /etc").contains("os-release"));
    assert!(ok(&session, "kubectl exec nginx -- cat /etc/os-release").contains("Simulated Linux"));

    let e = err(&session, "kubectl exec nginx -- cat /nope");
    assert!(e.ends_with("command terminated with exit code 1"), "{}", e);

    let generic = ok(&session, "kubectl exec -it nginx -- nginx -t");
    assert!(generic.contains("simulated output"));
}

#[test]
fn test_exec_refuses_pod_that_is_not_running() {
    let session = with_manifest("broken.yaml", BROKEN_POD);
    ok(&session, "kubectl apply -f broken.yaml");
    let history = session.history().len();

    for line in ["kubectl exec broken -- ls", "kubectl exec broken -c app -- env"] {
        let e = err(&session, line);
        assert_eq!(
            e,
            "error: cannot exec into a container in a completed pod; current phase is Failed"
        );
    }
    assert_eq!(session.history().len(), history);
}

#[test]
fn test_logs_tail_and_follow() {
    let session = seeded();
    let all = ok(&session, "kubectl logs nginx");
    assert!(all.lines().count() >= 6);

    let tail = ok(&session, "kubectl logs nginx --tail 2");
    assert_eq!(tail.lines().count(), 2);
    assert_eq!(tail.lines().last(), all.lines().last());
    let stamps: Vec<&str> = all.lines().map(|l| l.split(' ').next().unwrap()).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{:?}", stamps);
    let newest = stamps[stamps.len() - 2..].to_vec();
    let tailed: Vec<&str> = tail.lines().map(|l| l.split(' ').next().unwrap()).collect();
    assert_eq!(tailed, newest);

    let followed = ok(&session, "kubectl logs nginx -f");
    assert!(followed.ends_with("[following logs: no new entries]"));

    assert!(err(&session, "kubectl logs nginx --tail 0").contains("positive integer"));
    assert!(err(&session, "kubectl logs ghost").contains("NotFound"));
}

#[test]
fn test_logs_waiting_container() {
    let session = with_manifest("broken.yaml", BROKEN_POD);
    ok(&session, "kubectl apply -f broken.yaml");
    let e = err(&session, "kubectl logs broken");
    assert!(e.contains("is waiting to start"), "{}", e);
}

// ============================================================================
// parsing and configuration
// ============================================================================

#[test]
fn test_parse_errors_surface() {
    let session = seeded();
    assert!(err(&session, "kubectl frobnicate pods").contains("unknown action"));
    assert!(err(&session, "kubectl get widgets").contains("resource type \"widgets\""));
    assert!(err(&session, "kubectl get pods -n").contains("flag needs an argument"));
    assert!(err(&session, "helm list").contains("must start with"));
}

#[test]
fn test_custom_tool_name_and_namespace() {
    let session = ClusterSession::new(SimulatorConfig {
        tool_name: "k".to_string(),
        default_namespace: "kube-system".to_string(),
        ..SimulatorConfig::default()
    });
    let out = ok(&session, "k get pods");
    assert!(out.contains("etcd-control-plane"));
    assert!(err(&session, "kubectl get pods").contains("must start with"));
}
