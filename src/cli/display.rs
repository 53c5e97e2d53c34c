//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use chrono::{DateTime, SecondsFormat, Utc};

use crate::cluster::configmap::ConfigMap;
use crate::cluster::events::{ClusterEvent, EventPayload};
use crate::cluster::pod::{Container, ContainerState, ContainerStatus, ContainerType, EnvVar, Pod, PodPhase};
use crate::cluster::resources::KeyValues;
use crate::cluster::secret::Secret;
use crate::runtime::probes::{evaluate_probe, elapsed_since_creation, ProbeKind};

/// Shown in place of an empty field
const NONE: &str = "<none>";

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found".to_string();
    }

    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    std::iter::once(header_row)
        .chain(rows)
        .map(|row| {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| match widths.get(i) {
                    Some(w) => format!("{:width$}", cell, width = *w),
                    None => cell.clone(),
                })
                .collect::<Vec<_>>()
                .join("   ");
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Age in the compact form `kubectl get` prints (`45s`, `3m12s`, `5h`, `7d`)
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    let (mins, hours, days) = (secs / 60, secs / 3600, secs / 86_400);
    if secs < 120 {
        format!("{}s", secs)
    } else if mins < 10 {
        match secs % 60 {
            0 => format!("{}m", mins),
            s => format!("{}m{}s", mins, s),
        }
    } else if hours < 3 {
        format!("{}m", mins)
    } else if hours < 8 {
        match mins % 60 {
            0 => format!("{}h", hours),
            m => format!("{}h{}m", hours, m),
        }
    } else if hours < 48 {
        format!("{}h", hours)
    } else if days < 8 {
        match hours % 24 {
            0 => format!("{}d", days),
            h => format!("{}d{}h", days, h),
        }
    } else if days < 365 * 2 {
        format!("{}d", days)
    } else {
        format!("{}y", days / 365)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `k=v` pairs one per line, continuation lines indented by `indent`
fn format_key_values(values: Option<&KeyValues>, indent: usize) -> String {
    match values {
        Some(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(&format!("\n{}", " ".repeat(indent))),
        _ => NONE.to_string(),
    }
}

// ============================================================================
// Pod display
// ============================================================================

/// The STATUS column of `get pods`
pub fn pod_status(pod: &Pod) -> String {
    let init: Vec<&ContainerStatus> = pod
        .status
        .container_statuses
        .iter()
        .filter(|s| s.container_type == ContainerType::Init)
        .collect();
    let failed_init = init.iter().find_map(|s| match &s.state {
        ContainerState::Terminated { exit_code, reason } if *exit_code != 0 => Some(reason.clone()),
        _ => None,
    });

    match pod.phase() {
        PodPhase::Running => "Running".to_string(),
        PodPhase::Succeeded => "Completed".to_string(),
        PodPhase::Unknown => "Unknown".to_string(),
        PodPhase::Failed => match failed_init {
            Some(reason) => format!("Init:{}", reason),
            None => "Error".to_string(),
        },
        PodPhase::Pending => {
            let done = init.iter().filter(|s| s.state.is_terminated()).count();
            if done < init.len() {
                return format!("Init:{}/{}", done, init.len());
            }
            pod.status
                .container_statuses
                .iter()
                .find_map(|s| match &s.state {
                    ContainerState::Waiting { reason } if s.container_type == ContainerType::Regular => {
                        Some(reason.clone())
                    }
                    _ => None,
                })
                .unwrap_or_else(|| "Pending".to_string())
        }
    }
}

/// Format a pod listing
pub fn format_pod_list(pods: &[&Pod], now: DateTime<Utc>, wide: bool, show_namespace: bool) -> String {
    let mut headers = vec![];
    if show_namespace {
        headers.push("NAMESPACE");
    }
    headers.extend(["NAME", "STATUS", "AGE"]);
    if wide {
        headers.extend(["READY", "RESTARTS", "CONTAINERS", "IMAGES"]);
    }

    let rows = pods
        .iter()
        .map(|pod| {
            let mut row = vec![];
            if show_namespace {
                row.push(pod.metadata.namespace.clone());
            }
            row.push(pod.metadata.name.clone());
            row.push(pod_status(pod));
            row.push(format_age(pod.metadata.creation_timestamp, now));
            if wide {
                let (ready, total) = pod.ready_count();
                row.push(format!("{}/{}", ready, total));
                row.push(pod.restart_count().to_string());
                row.push(names(&pod.spec.containers, |c| &c.name));
                row.push(names(&pod.spec.containers, |c| &c.image));
            }
            row
        })
        .collect();

    format_table(&headers, rows)
}

fn names(containers: &[Container], f: impl Fn(&Container) -> &String) -> String {
    containers.iter().map(|c| f(c).as_str()).collect::<Vec<_>>().join(",")
}

/// How `describe` and `env` show a variable without resolving references
pub fn env_value_display(var: &EnvVar) -> String {
    if let Some(value) = &var.value {
        return value.clone();
    }
    match &var.value_from {
        Some(src) => {
            if let Some(r) = &src.config_map_key_ref {
                format!("<set to the key '{}' of config map '{}'>", r.key, r.name)
            } else if let Some(r) = &src.secret_key_ref {
                format!("<set to the key '{}' in secret '{}'>", r.key, r.name)
            } else {
                String::new()
            }
        }
        None => String::new(),
    }
}

fn format_state(state: &ContainerState, indent: &str) -> String {
    match state {
        ContainerState::Waiting { reason } => {
            format!("{i}State:          Waiting\n{i}  Reason:       {}\n", reason, i = indent)
        }
        ContainerState::Running { started_at } => format!(
            "{i}State:          Running\n{i}  Started:      {}\n",
            format_timestamp(*started_at),
            i = indent
        ),
        ContainerState::Terminated { exit_code, reason } => format!(
            "{i}State:          Terminated\n{i}  Reason:       {}\n{i}  Exit Code:    {}\n",
            reason,
            exit_code,
            i = indent
        ),
    }
}

fn format_container(pod: &Pod, container: &Container, container_type: ContainerType, now: DateTime<Utc>) -> String {
    let mut output = format!("  {}:\n", container.name);
    output.push_str(&format!("    Image:          {}\n", container.image));

    for port in container.ports.iter().flatten() {
        output.push_str(&format!(
            "    Port:           {}/{}\n",
            port.container_port,
            port.protocol.as_deref().unwrap_or("TCP")
        ));
    }
    if let Some(command) = &container.command {
        output.push_str("    Command:\n");
        for part in command {
            output.push_str(&format!("      {}\n", part));
        }
    }
    if let Some(args) = &container.args {
        output.push_str("    Args:\n");
        for part in args {
            output.push_str(&format!("      {}\n", part));
        }
    }

    if let Some(status) = pod.container_status(&container.name, container_type) {
        output.push_str(&format_state(&status.state, "    "));
        output.push_str(&format!(
            "    Ready:          {}\n",
            if status.ready { "True" } else { "False" }
        ));
        output.push_str(&format!("    Restart Count:  {}\n", status.restart_count));
    }

    let elapsed = elapsed_since_creation(pod, now);
    for (kind, probe) in [
        (ProbeKind::Liveness, &container.liveness_probe),
        (ProbeKind::Readiness, &container.readiness_probe),
        (ProbeKind::Startup, &container.startup_probe),
    ] {
        if let Some(probe) = probe {
            let outcome = evaluate_probe(probe, pod.phase(), elapsed);
            output.push_str(&format!(
                "    {:<16}{} delay={}s period={}s  [{}]\n",
                format!("{}:", kind),
                probe.action,
                probe.initial_delay_seconds.unwrap_or(0),
                probe.period_seconds.unwrap_or(10),
                outcome
            ));
        }
    }

    match container.env.as_deref() {
        Some(env) if !env.is_empty() => {
            output.push_str("    Environment:\n");
            for var in env {
                output.push_str(&format!("      {}:  {}\n", var.name, env_value_display(var)));
            }
        }
        _ => output.push_str("    Environment:    <none>\n"),
    }
    output
}

/// Format a single pod for `describe`
pub fn format_pod_detail(pod: &Pod, events: &[ClusterEvent], now: DateTime<Utc>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Name:         {}\n", pod.metadata.name));
    output.push_str(&format!("Namespace:    {}\n", pod.metadata.namespace));
    output.push_str(&format!("UID:          {}\n", pod.metadata.uid));
    output.push_str(&format!(
        "Start Time:   {}\n",
        format_timestamp(pod.metadata.creation_timestamp)
    ));
    output.push_str(&format!("Labels:       {}\n", format_key_values(pod.metadata.labels.as_ref(), 14)));
    output.push_str(&format!(
        "Annotations:  {}\n",
        format_key_values(pod.metadata.annotations.as_ref(), 14)
    ));
    output.push_str(&format!("Status:       {}\n", pod.phase()));

    if !pod.init_containers().is_empty() {
        output.push_str("Init Containers:\n");
        for c in pod.init_containers() {
            output.push_str(&format_container(pod, c, ContainerType::Init, now));
        }
    }
    output.push_str("Containers:\n");
    for c in &pod.spec.containers {
        output.push_str(&format_container(pod, c, ContainerType::Regular, now));
    }

    let (ready, total) = pod.ready_count();
    output.push_str("Conditions:\n");
    output.push_str("  Type              Status\n");
    output.push_str(&format!(
        "  Initialized       {}\n",
        bool_word(pod.init_containers().len() == count_completed_init(pod))
    ));
    output.push_str(&format!("  Ready             {}\n", bool_word(total > 0 && ready == total)));
    output.push_str(&format_events(events, now));
    output
}

fn count_completed_init(pod: &Pod) -> usize {
    pod.status
        .container_statuses
        .iter()
        .filter(|s| {
            s.container_type == ContainerType::Init
                && matches!(s.state, ContainerState::Terminated { exit_code: 0, .. })
        })
        .count()
}

fn bool_word(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

// ============================================================================
// ConfigMap / Secret display
// ============================================================================

/// Format a configmap listing
pub fn format_config_map_list(items: &[&ConfigMap], now: DateTime<Utc>, show_namespace: bool) -> String {
    let mut headers = vec![];
    if show_namespace {
        headers.push("NAMESPACE");
    }
    headers.extend(["NAME", "DATA", "AGE"]);
    let rows = items
        .iter()
        .map(|cm| {
            let mut row = vec![];
            if show_namespace {
                row.push(cm.metadata.namespace.clone());
            }
            row.push(cm.metadata.name.clone());
            row.push(cm.data_count().to_string());
            row.push(format_age(cm.metadata.creation_timestamp, now));
            row
        })
        .collect();
    format_table(&headers, rows)
}

/// Format a secret listing
pub fn format_secret_list(items: &[&Secret], now: DateTime<Utc>, show_namespace: bool) -> String {
    let mut headers = vec![];
    if show_namespace {
        headers.push("NAMESPACE");
    }
    headers.extend(["NAME", "TYPE", "DATA", "AGE"]);
    let rows = items
        .iter()
        .map(|s| {
            let mut row = vec![];
            if show_namespace {
                row.push(s.metadata.namespace.clone());
            }
            row.push(s.metadata.name.clone());
            row.push(s.secret_type.as_str().to_string());
            row.push(s.data_count().to_string());
            row.push(format_age(s.metadata.creation_timestamp, now));
            row
        })
        .collect();
    format_table(&headers, rows)
}

/// Format a configmap for `describe`
pub fn format_config_map_detail(cm: &ConfigMap, events: &[ClusterEvent], now: DateTime<Utc>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Name:         {}\n", cm.metadata.name));
    output.push_str(&format!("Namespace:    {}\n", cm.metadata.namespace));
    output.push_str(&format!("Labels:       {}\n", format_key_values(cm.metadata.labels.as_ref(), 14)));
    output.push_str(&format!(
        "Annotations:  {}\n",
        format_key_values(cm.metadata.annotations.as_ref(), 14)
    ));
    output.push_str("\nData\n====\n");
    for (key, value) in cm.data.iter().flatten() {
        output.push_str(&format!("{}:\n----\n{}\n\n", key, value));
    }
    output.push_str(&format_events(events, now));
    output
}

/// Format a secret for `describe`. Values are never shown, only sizes.
pub fn format_secret_detail(secret: &Secret, events: &[ClusterEvent], now: DateTime<Utc>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Name:         {}\n", secret.metadata.name));
    output.push_str(&format!("Namespace:    {}\n", secret.metadata.namespace));
    output.push_str(&format!(
        "Labels:       {}\n",
        format_key_values(secret.metadata.labels.as_ref(), 14)
    ));
    output.push_str(&format!(
        "Annotations:  {}\n",
        format_key_values(secret.metadata.annotations.as_ref(), 14)
    ));
    output.push_str(&format!("\nType:  {}\n", secret.secret_type.as_str()));
    output.push_str("\nData\n====\n");
    for (key, size) in secret.value_sizes() {
        output.push_str(&format!("{}:  {} bytes\n", key, size));
    }
    output.push('\n');
    output.push_str(&format_events(events, now));
    output
}

// ============================================================================
// Namespaces and events
// ============================================================================

/// Format a namespace listing; `created` is the oldest resource in each
pub fn format_namespace_list(namespaces: &[(String, Option<DateTime<Utc>>)], now: DateTime<Utc>) -> String {
    let rows = namespaces
        .iter()
        .map(|(name, created)| {
            vec![
                name.clone(),
                "Active".to_string(),
                created
                    .map(|c| format_age(c, now))
                    .unwrap_or_else(|| "<unknown>".to_string()),
            ]
        })
        .collect();
    format_table(&["NAME", "STATUS", "AGE"], rows)
}

/// The `Events:` section of `describe`, from the bus history
pub fn format_events(events: &[ClusterEvent], now: DateTime<Utc>) -> String {
    if events.is_empty() {
        return "Events:       <none>\n".to_string();
    }
    let rows = events
        .iter()
        .map(|e| {
            vec![
                "Normal".to_string(),
                e.event_type.to_string(),
                format_age(e.timestamp, now),
                e.metadata.source.clone(),
                event_message(e),
            ]
        })
        .collect();
    let table = format_table(&["Type", "Reason", "Age", "From", "Message"], rows);
    let indented: Vec<String> = table.lines().map(|l| format!("  {}", l)).collect();
    format!("Events:\n{}\n", indented.join("\n"))
}

fn event_message(event: &ClusterEvent) -> String {
    use crate::cluster::events::ResourceChange as C;
    fn describe_changes<T>(change: &C<T>) -> Option<String> {
        match change {
            C::Labeled { changes, .. } | C::Annotated { changes, .. } => Some(
                changes
                    .iter()
                    .map(|(k, v)| match v {
                        Some(v) => format!("{}={}", k, v),
                        None => format!("{}-", k),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        }
    }
    let detail = match &event.payload {
        EventPayload::Pod(c) => describe_changes(c),
        EventPayload::ConfigMap(c) => describe_changes(c),
        EventPayload::Secret(c) => describe_changes(c),
    };
    let base = format!("{} {}", event.resource_kind(), event.resource_name());
    match detail {
        Some(d) => format!("{}: {}", base, d),
        None => base,
    }
}

/// One line per event for the REPL's `history` command
pub fn format_event_history(events: &[ClusterEvent]) -> String {
    if events.is_empty() {
        return "No events recorded".to_string();
    }
    events
        .iter()
        .map(|e| {
            format!(
                "{}  {:<20} {}/{}  ({})",
                format_timestamp(e.timestamp),
                e.event_type.to_string(),
                e.namespace(),
                e.resource_name(),
                e.metadata.correlation_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::cluster::pod::{EnvVarSource, KeySelector};
    use crate::runtime::reconciler::start_regular_containers;

    #[test]
    fn test_format_table() {
        let headers = &["NAME", "VALUE"];
        let rows = vec![
            vec!["foo".to_string(), "bar".to_string()],
            vec!["longer-name".to_string(), "x".to_string()],
        ];
        let output = format_table(headers, rows);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "NAME          VALUE");
        assert_eq!(lines[1], "foo           bar");
        assert_eq!(lines[2], "longer-name   x");
    }

    #[test]
    fn test_format_table_empty() {
        let output = format_table(&["NAME"], vec![]);
        assert!(output.contains("No resources found"));
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(45), now), "45s");
        assert_eq!(format_age(now - Duration::seconds(192), now), "3m12s");
        assert_eq!(format_age(now - Duration::hours(2), now), "120m");
        assert_eq!(format_age(now - Duration::hours(5), now), "5h");
        assert_eq!(format_age(now - Duration::days(7), now), "7d");
        assert_eq!(format_age(now + Duration::seconds(5), now), "0s");
    }

    #[test]
    fn test_pod_status_column() {
        let pod = Pod::new("web", "default", vec![Container::new("web", "nginx")])
            .with_init_containers(vec![Container::new("a", "busybox"), Container::new("b", "busybox")]);
        assert_eq!(pod_status(&pod), "Init:0/2");

        let plain = Pod::new("web", "default", vec![Container::new("web", "nginx")]);
        assert_eq!(pod_status(&plain), "ContainerCreating");
        let running = plain.with_status(start_regular_containers(plain.status.clone(), Utc::now()));
        assert_eq!(pod_status(&running), "Running");
    }

    #[test]
    fn test_pod_list_headers() {
        let pod = Pod::new("web", "default", vec![Container::new("web", "nginx")]);
        let out = format_pod_list(&[&pod], Utc::now(), false, false);
        assert!(out.starts_with("NAME   STATUS"));
        assert!(out.lines().next().unwrap_or("").ends_with("AGE"));
        let wide = format_pod_list(&[&pod], Utc::now(), true, true);
        assert!(wide.starts_with("NAMESPACE"));
        assert!(wide.contains("IMAGES"));
    }

    #[test]
    fn test_env_placeholders() {
        let var = EnvVar {
            name: "PASS".into(),
            value: None,
            value_from: Some(EnvVarSource {
                config_map_key_ref: None,
                secret_key_ref: Some(KeySelector {
                    name: "creds".into(),
                    key: "password".into(),
                }),
            }),
        };
        assert_eq!(env_value_display(&var), "<set to the key 'password' in secret 'creds'>");
        assert_eq!(env_value_display(&EnvVar::literal("A", "1")), "1");
    }

    #[test]
    fn test_secret_detail_hides_values() {
        let secret = Secret::from_literals(
            crate::cluster::resources::ObjectMeta::new("creds", "default"),
            &[("password".to_string(), "hunter2".to_string())],
        );
        let out = format_secret_detail(&secret, &[], Utc::now());
        assert!(out.contains("password:  7 bytes"));
        assert!(!out.contains("hunter2"));
    }
}
