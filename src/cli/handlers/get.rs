//! `get` - list or show resources

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::{no_resources, not_found, render_structured, select};
use crate::cli::display::{format_config_map_list, format_namespace_list, format_pod_list, format_secret_list};
use crate::cli::executor::{CommandContext, CommandError, CommandResult};
use crate::cli::parser::{Action, OutputFormat, ParseError, ParsedCommand, ResourceType};
use crate::cluster::configmap::ConfigMap;
use crate::cluster::pod::Pod;
use crate::cluster::resources::Object;
use crate::cluster::secret::Secret;
use crate::cluster::state::{ClusterStateData, StoredResource};

pub fn run(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let resource = cmd.resource.ok_or(ParseError::MissingResource(Action::Get))?;
    let wide = cmd.flags.output == Some(OutputFormat::Wide);
    let show_ns = cmd.flags.all_namespaces && cmd.name.is_none();

    match resource {
        ResourceType::Pods => list::<Pod>(ctx, cmd, |items| format_pod_list(items, ctx.now, wide, show_ns)),
        ResourceType::ConfigMaps => list::<ConfigMap>(ctx, cmd, |items| format_config_map_list(items, ctx.now, show_ns)),
        ResourceType::Secrets => list::<Secret>(ctx, cmd, |items| format_secret_list(items, ctx.now, show_ns)),
        ResourceType::Namespaces => namespaces(ctx, cmd),
        other => match &cmd.name {
            Some(name) => Err(not_found(other, name)),
            None if other == ResourceType::Nodes => Ok("No resources found".to_string()),
            None => Ok(no_resources(ctx, cmd)),
        },
    }
}

fn list<R>(ctx: &CommandContext<'_>, cmd: &ParsedCommand, table: impl Fn(&[&R]) -> String) -> CommandResult<String>
where
    R: StoredResource + Serialize,
{
    let items = select::<R>(ctx, cmd)?;
    if items.is_empty() {
        return Ok(no_resources(ctx, cmd));
    }
    if let Some(text) = render_structured(cmd, &items)? {
        return Ok(text);
    }
    let refs: Vec<&R> = items.iter().map(Arc::as_ref).collect();
    Ok(table(&refs))
}

/// Oldest creation timestamp per namespace, across all kinds
pub(crate) fn namespace_ages(state: &ClusterStateData) -> BTreeMap<String, DateTime<Utc>> {
    let mut ages: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();
    let metas = state
        .pods
        .items
        .iter()
        .map(|p| p.metadata())
        .chain(state.config_maps.items.iter().map(|c| c.metadata()))
        .chain(state.secrets.items.iter().map(|s| s.metadata()));
    for meta in metas {
        ages.entry(meta.namespace.clone())
            .and_modify(|t| *t = (*t).min(meta.creation_timestamp))
            .or_insert(meta.creation_timestamp);
    }
    ages
}

fn namespaces(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let state = ctx.store.snapshot();
    let ages = namespace_ages(&state);
    let mut names = state.namespaces();
    if let Some(name) = &cmd.name {
        if !names.contains(name) {
            return Err(not_found(ResourceType::Namespaces, name));
        }
        names = vec![name.clone()];
    }

    match cmd.flags.output {
        Some(OutputFormat::Name) => Ok(names
            .iter()
            .map(|n| format!("namespace/{}", n))
            .collect::<Vec<_>>()
            .join("\n")),
        Some(format @ (OutputFormat::Yaml | OutputFormat::Json)) => {
            let items: Vec<_> = names
                .iter()
                .map(|n| {
                    json!({
                        "apiVersion": "v1",
                        "kind": "Namespace",
                        "metadata": { "name": n },
                        "status": { "phase": "Active" },
                    })
                })
                .collect();
            let value = match (&cmd.name, items.as_slice()) {
                (Some(_), [one]) => one.clone(),
                _ => json!({ "apiVersion": "v1", "kind": "List", "items": items }),
            };
            let text = if format == OutputFormat::Json {
                serde_json::to_string_pretty(&value).map_err(|e| CommandError::Internal(e.to_string()))?
            } else {
                serde_yaml::to_string(&value).map_err(|e| CommandError::Internal(e.to_string()))?
            };
            Ok(text)
        }
        _ => {
            let rows: Vec<(String, Option<DateTime<Utc>>)> = names
                .into_iter()
                .map(|n| {
                    let age = ages.get(&n).copied();
                    (n, age)
                })
                .collect();
            Ok(format_namespace_list(&rows, ctx.now))
        }
    }
}
