//! One module per action. Every handler has the shape
//! `fn(&CommandContext, &ParsedCommand) -> CommandResult<String>`.

pub mod create;
pub mod delete;
pub mod describe;
pub mod exec;
pub mod get;
pub mod label;
pub mod logs;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::executor::{CommandContext, CommandError, CommandResult};
use super::parser::{OutputFormat, ParsedCommand, ResourceType};
use crate::cluster::events::ClusterEvent;
use crate::cluster::filters;
use crate::cluster::resources::{KeyValues, LabelSelector, Object, ResourceKind, ResourceList};
use crate::cluster::state::StoredResource;
use crate::config::{load_manifest_file, Manifest};

/// Resources named by `cmd`: the one named resource, or every resource
/// in scope matching the selector
pub(crate) fn select<R: StoredResource>(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<Vec<Arc<R>>> {
    if let Some(name) = &cmd.name {
        return Ok(vec![ctx.store.find::<R>(name, &ctx.namespace)?]);
    }
    let scope = if cmd.flags.all_namespaces {
        None
    } else {
        Some(ctx.namespace.as_str())
    };
    Ok(filter_by_selector(ctx.store.list::<R>(scope), cmd.selector.as_ref()))
}

pub(crate) fn filter_by_selector<R: Object>(items: Vec<Arc<R>>, selector: Option<&KeyValues>) -> Vec<Arc<R>> {
    match selector {
        Some(labels) => {
            let selector = LabelSelector::from_labels(labels.clone());
            items
                .into_iter()
                .filter(|r| selector.matches(r.metadata().labels.as_ref()))
                .collect()
        }
        None => items,
    }
}

/// What an empty listing prints
pub(crate) fn no_resources(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> String {
    if cmd.flags.all_namespaces {
        "No resources found".to_string()
    } else {
        format!("No resources found in {} namespace.", ctx.namespace)
    }
}

pub(crate) fn not_found(resource: ResourceType, name: &str) -> CommandError {
    CommandError::NotFound(format!("{} \"{}\" not found", resource, name))
}

/// Bus history entries about one resource, oldest first
pub(crate) fn resource_events(
    ctx: &CommandContext<'_>,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Vec<ClusterEvent> {
    let predicate = filters::all_of(vec![
        filters::by_namespace(namespace),
        filters::by_resource_kind(kind),
    ]);
    ctx.bus
        .get_history_filtered(&predicate)
        .into_iter()
        .filter(|e| e.resource_name() == name)
        .collect()
}

/// Read and validate every document of the `-f` file, resolving each
/// manifest's target namespace. Nothing is committed here.
pub(crate) fn read_manifests(ctx: &CommandContext<'_>, path: &str) -> CommandResult<Vec<(Manifest, String)>> {
    let manifests = {
        let fs = ctx.fs.read();
        load_manifest_file(&fs, &ctx.config.working_dir, path)?
    };
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let namespace = target_namespace(ctx, manifest.namespace.as_deref())?;
        let kind = manifest.resource.kind();
        let name = manifest.resource.metadata().name.clone();
        if !seen.insert((kind, namespace.clone(), name.clone())) {
            return Err(CommandError::invalid(format!(
                "{} \"{}\" appears more than once in {}",
                kind.plural(),
                name,
                path
            )));
        }
        resolved.push((manifest, namespace));
    }
    Ok(resolved)
}

/// The namespace a manifest lands in. A manifest naming a namespace other
/// than an explicit `-n` is rejected.
fn target_namespace(ctx: &CommandContext<'_>, declared: Option<&str>) -> CommandResult<String> {
    match declared {
        Some(ns) if ctx.explicit_namespace && ns != ctx.namespace => Err(CommandError::invalid(format!(
            "the namespace from the provided object \"{}\" does not match the namespace \"{}\". You must pass '--namespace={}' to perform this operation.",
            ns, ctx.namespace, ns
        ))),
        Some(ns) => Ok(ns.to_string()),
        None => Ok(ctx.namespace.clone()),
    }
}

/// Drop container filesystem snapshots, which are internal bookkeeping.
/// Only `status.containerStatuses[*].fileSystem` is touched, on a single
/// object or on each of a list's `items`.
fn strip_internal(value: &mut Value) {
    if let Some(items) = value.get_mut("items").and_then(Value::as_array_mut) {
        items.iter_mut().for_each(strip_internal);
        return;
    }
    let statuses = value
        .pointer_mut("/status/containerStatuses")
        .and_then(Value::as_array_mut);
    for status in statuses.into_iter().flatten() {
        if let Some(fields) = status.as_object_mut() {
            fields.remove("fileSystem");
        }
    }
}

/// Render resources for `-o yaml|json|name`. Returns `None` for table
/// formats.
pub(crate) fn render_structured<R: Object + Serialize>(
    cmd: &ParsedCommand,
    items: &[Arc<R>],
) -> CommandResult<Option<String>> {
    let format = match cmd.flags.output {
        Some(f @ (OutputFormat::Yaml | OutputFormat::Json)) => f,
        Some(OutputFormat::Name) => {
            return Ok(Some(
                items
                    .iter()
                    .map(|r| r.reference())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ))
        }
        Some(OutputFormat::Wide) | None => return Ok(None),
    };

    let mut value = if cmd.name.is_some() && items.len() == 1 {
        serde_json::to_value(items[0].as_ref())
    } else {
        serde_json::to_value(ResourceList::new("List", items.to_vec()))
    }
    .map_err(|e| CommandError::Internal(e.to_string()))?;
    strip_internal(&mut value);

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&value).map_err(|e| CommandError::Internal(e.to_string()))?,
        _ => serde_yaml::to_string(&value).map_err(|e| CommandError::Internal(e.to_string()))?,
    };
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_internal_only_touches_container_statuses() {
        let pod = json!({
            "kind": "Pod",
            "metadata": {"annotations": {"fileSystem": "kept"}},
            "status": {"containerStatuses": [{"name": "app", "fileSystem": {"root": {}}}]}
        });
        let mut list = json!({"kind": "List", "items": [pod.clone(), {"data": {"fileSystem": "ext4"}}]});
        strip_internal(&mut list);

        let stripped = &list["items"][0];
        assert_eq!(stripped["metadata"]["annotations"]["fileSystem"], "kept");
        assert_eq!(stripped["status"]["containerStatuses"][0]["name"], "app");
        assert!(stripped["status"]["containerStatuses"][0].get("fileSystem").is_none());
        assert_eq!(list["items"][1]["data"]["fileSystem"], "ext4");

        let mut single = pod;
        strip_internal(&mut single);
        assert!(single["status"]["containerStatuses"][0].get("fileSystem").is_none());
    }
}
