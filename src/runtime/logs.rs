//! Synthetic container logs
//!
//! Log lines are derived from a hash of the pod and container identity, so
//! the same container always produces the same lines and `logs` output is
//! stable across calls and sessions.

use chrono::{Duration, SecondsFormat};
use sha2::{Digest, Sha256};

use crate::cluster::pod::{Container, Pod};

const NGINX: &[&str] = &[
    "/docker-entrypoint.sh: Configuration complete; ready for start up",
    "10.244.{a}.{b} - - \"GET / HTTP/1.1\" 200 615 \"-\" \"kube-probe/1.29\"",
    "10.244.{a}.{b} - - \"GET /healthz HTTP/1.1\" 200 2 \"-\" \"curl/8.5.0\"",
    "10.244.{a}.{b} - - \"GET /favicon.ico HTTP/1.1\" 404 153 \"-\" \"Mozilla/5.0\"",
    "[notice] 1#1: start worker process {n}",
];

const REDIS: &[&str] = &[
    "* Ready to accept connections tcp",
    "* DB saved on disk",
    "* {n} changes in 60 seconds. Saving...",
    "* Background saving terminated with success",
];

const POSTGRES: &[&str] = &[
    "LOG:  database system is ready to accept connections",
    "LOG:  checkpoint starting: time",
    "LOG:  checkpoint complete: wrote {n} buffers",
    "LOG:  connection received: host=10.244.{a}.{b} port=5{n}",
];

const CONTROL_PLANE: &[&str] = &[
    "I0101 controller.go:{n}] Starting controller",
    "I0101 reflector.go:{n}] Listing and watching *v1.Pod",
    "I0101 leaderelection.go:{n}] successfully renewed lease",
    "I0101 shared_informer.go:{n}] Caches are synced",
];

const COREDNS: &[&str] = &[
    "[INFO] plugin/reload: Running configuration SHA512 = {n}",
    "[INFO] 10.244.{a}.{b}:{n} - \"A IN kubernetes.default.svc.cluster.local. udp\" NOERROR",
    "CoreDNS-1.11.1",
];

const GENERIC: &[&str] = &[
    "Starting application",
    "Listening on port 80{a}",
    "Processed {n} requests",
    "Health check passed",
    "Worker {a} idle",
];

fn templates_for(image: &str) -> &'static [&'static str] {
    let name = image
        .rsplit('/')
        .next()
        .unwrap_or(image)
        .split([':', '@'])
        .next()
        .unwrap_or(image);
    match name {
        "nginx" | "httpd" => NGINX,
        "redis" => REDIS,
        "postgres" | "mysql" => POSTGRES,
        "coredns" => COREDNS,
        n if n.starts_with("kube-") || n == "etcd" => CONTROL_PLANE,
        _ => GENERIC,
    }
}

fn seed(pod: &Pod, container: &Container) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pod.metadata.namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(pod.metadata.name.as_bytes());
    hasher.update(b"/");
    hasher.update(container.name.as_bytes());
    hasher.update(container.image.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Produce the log lines of one container
pub fn generate_logs(pod: &Pod, container: &Container) -> Vec<String> {
    let digest = seed(pod, container);
    let templates = templates_for(&container.image);
    let count = 6 + usize::from(digest[0] % 8);
    let start = pod.metadata.creation_timestamp;

    let mut elapsed = 0i64;
    (0..count)
        .map(|i| {
            let byte = |offset: usize| digest[(i * 3 + offset) % digest.len()];
            let template = if i == 0 {
                templates[0]
            } else {
                templates[usize::from(byte(1)) % templates.len()]
            };
            let line = template
                .replace("{a}", &(byte(2) % 250).to_string())
                .replace("{b}", &(byte(3) % 250 + 1).to_string())
                .replace("{n}", &(u32::from(byte(4)) * 7 + 10).to_string());
            if i > 0 {
                elapsed += 1 + i64::from(byte(5) % 30);
            }
            let at = start + Duration::seconds(elapsed);
            format!("{} {}", at.to_rfc3339_opts(SecondsFormat::Secs, true), line)
        })
        .collect()
}
