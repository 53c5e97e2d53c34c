//! Seed data for a fresh simulated cluster
//!
//! A small control plane in `kube-system` plus one workload with its
//! config in `default`, so `get` has something to show on first start.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::configmap::ConfigMap;
use super::pod::{Container, ContainerPort, EnvVar, EnvVarSource, KeySelector, Pod, PodSpec};
use super::resources::{KeyValues, ObjectMeta, ResourceList};
use super::secret::{encode_value, Secret, SecretType};
use super::state::ClusterStateData;
use crate::runtime::reconciler::start_regular_containers;

fn labels(pairs: &[(&str, &str)]) -> KeyValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn running_pod(meta: ObjectMeta, containers: Vec<Container>, started: DateTime<Utc>) -> Arc<Pod> {
    let pod = Pod::from_parts(
        meta,
        PodSpec {
            init_containers: None,
            containers,
        },
    );
    let status = start_regular_containers(pod.status.clone(), started);
    Arc::new(pod.with_status(status))
}

/// The default state of a new session, anchored at `now`
pub fn default_state(now: DateTime<Utc>) -> ClusterStateData {
    let boot = now - Duration::days(7);
    let deployed = now - Duration::hours(2);

    let system = |name: &str, component: &str, image: &str| {
        running_pod(
            ObjectMeta::new(name, "kube-system")
                .with_labels(labels(&[("component", component), ("tier", "control-plane")]))
                .with_creation_timestamp(boot),
            vec![Container::new(component, image)],
            boot,
        )
    };

    let mut pods = vec![
        running_pod(
            ObjectMeta::new("coredns-5dd5756b68-7xkqp", "kube-system")
                .with_labels(labels(&[("k8s-app", "kube-dns")]))
                .with_creation_timestamp(boot),
            vec![Container::new("coredns", "registry.k8s.io/coredns/coredns:v1.11.1")],
            boot,
        ),
        system("etcd-control-plane", "etcd", "registry.k8s.io/etcd:3.5.10-0"),
        system(
            "kube-apiserver-control-plane",
            "kube-apiserver",
            "registry.k8s.io/kube-apiserver:v1.29.0",
        ),
        system(
            "kube-controller-manager-control-plane",
            "kube-controller-manager",
            "registry.k8s.io/kube-controller-manager:v1.29.0",
        ),
        system(
            "kube-scheduler-control-plane",
            "kube-scheduler",
            "registry.k8s.io/kube-scheduler:v1.29.0",
        ),
    ];

    let mut nginx = Container::new("nginx", "nginx:1.25").with_env(vec![
        EnvVar::literal("NGINX_PORT", "80"),
        EnvVar {
            name: "APP_MODE".to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                config_map_key_ref: Some(KeySelector {
                    name: "app-config".to_string(),
                    key: "mode".to_string(),
                }),
                secret_key_ref: None,
            }),
        },
        EnvVar {
            name: "DB_PASSWORD".to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                config_map_key_ref: None,
                secret_key_ref: Some(KeySelector {
                    name: "db-credentials".to_string(),
                    key: "password".to_string(),
                }),
            }),
        },
    ]);
    nginx.ports = Some(vec![ContainerPort {
        container_port: 80,
        name: Some("http".to_string()),
        protocol: Some("TCP".to_string()),
    }]);
    pods.push(running_pod(
        ObjectMeta::new("nginx", "default")
            .with_labels(labels(&[("app", "nginx")]))
            .with_creation_timestamp(deployed),
        vec![nginx],
        deployed,
    ));

    let mut config = BTreeMap::new();
    config.insert("mode".to_string(), "production".to_string());
    config.insert("log_level".to_string(), "info".to_string());
    let config_map = ConfigMap::from_parts(
        ObjectMeta::new("app-config", "default").with_creation_timestamp(deployed),
        Some(config),
    );

    let mut credentials = BTreeMap::new();
    credentials.insert("username".to_string(), encode_value("admin"));
    credentials.insert("password".to_string(), encode_value("s3cr3t-passw0rd"));
    let secret = Secret::from_parts(
        ObjectMeta::new("db-credentials", "default").with_creation_timestamp(deployed),
        SecretType::Opaque,
        Some(credentials),
    );

    ClusterStateData {
        pods: ResourceList::new("PodList", pods),
        config_maps: ResourceList::new("ConfigMapList", vec![Arc::new(config_map)]),
        secrets: ResourceList::new("SecretList", vec![Arc::new(secret)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::pod::PodPhase;
    use crate::cluster::state;

    #[test]
    fn test_seed_contents() {
        let data = default_state(Utc::now());
        assert_eq!(state::list::<Pod>(&data, Some("kube-system")).len(), 5);
        let nginx = state::find::<Pod>(&data, "nginx", "default").unwrap();
        assert_eq!(nginx.phase(), PodPhase::Running);
        assert_eq!(nginx.metadata.label("app"), Some("nginx"));
        assert!(state::find::<ConfigMap>(&data, "app-config", "default").is_ok());
        let secret = state::find::<Secret>(&data, "db-credentials", "default").unwrap();
        assert_eq!(secret.decoded("username").as_deref(), Some("admin"));
    }

    #[test]
    fn test_seed_identities_are_unique() {
        let data = default_state(Utc::now());
        let mut names: Vec<_> = data
            .pods
            .items
            .iter()
            .map(|p| format!("{}/{}", p.metadata.namespace, p.metadata.name))
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
