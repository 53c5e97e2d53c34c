//! `describe` - detailed view of resources with their recorded events

use chrono::{DateTime, Utc};

use super::get::namespace_ages;
use super::{not_found, resource_events, select};
use crate::cli::display::{
    format_config_map_detail, format_events, format_pod_detail, format_secret_detail,
};
use crate::cli::executor::{CommandContext, CommandResult};
use crate::cli::parser::{Action, ParseError, ParsedCommand, ResourceType};
use crate::cluster::configmap::ConfigMap;
use crate::cluster::events::ClusterEvent;
use crate::cluster::filters;
use crate::cluster::pod::Pod;
use crate::cluster::resources::{Object, ResourceKind};
use crate::cluster::secret::Secret;
use crate::cluster::state::StoredResource;

pub fn run(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let resource = cmd.resource.ok_or(ParseError::MissingResource(Action::Describe))?;
    match resource {
        ResourceType::Pods => details::<Pod>(ctx, cmd, format_pod_detail),
        ResourceType::ConfigMaps => details::<ConfigMap>(ctx, cmd, format_config_map_detail),
        ResourceType::Secrets => details::<Secret>(ctx, cmd, format_secret_detail),
        ResourceType::Namespaces => namespace(ctx, cmd),
        other => match &cmd.name {
            Some(name) => Err(not_found(other, name)),
            None => Ok(super::no_resources(ctx, cmd)),
        },
    }
}

fn details<R: StoredResource>(
    ctx: &CommandContext<'_>,
    cmd: &ParsedCommand,
    render: fn(&R, &[ClusterEvent], DateTime<Utc>) -> String,
) -> CommandResult<String> {
    let items = select::<R>(ctx, cmd)?;
    if items.is_empty() {
        return Ok(super::no_resources(ctx, cmd));
    }
    let blocks: Vec<String> = items
        .iter()
        .map(|item| {
            let events = resource_events(ctx, R::KIND, item.name(), item.namespace());
            render(item, &events, ctx.now).trim_end().to_string()
        })
        .collect();
    Ok(blocks.join("\n\n"))
}

fn namespace(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let state = ctx.store.snapshot();
    let ages = namespace_ages(&state);
    let names: Vec<String> = match &cmd.name {
        Some(name) if state.namespaces().contains(name) => vec![name.clone()],
        Some(name) => return Err(not_found(ResourceType::Namespaces, name)),
        None => state.namespaces(),
    };

    let blocks: Vec<String> = names
        .iter()
        .map(|name| {
            let count = |kind: ResourceKind| match kind {
                ResourceKind::Pod => state.pods.items.iter().filter(|p| p.namespace() == name).count(),
                ResourceKind::ConfigMap => state
                    .config_maps
                    .items
                    .iter()
                    .filter(|c| c.namespace() == name)
                    .count(),
                ResourceKind::Secret => state.secrets.items.iter().filter(|s| s.namespace() == name).count(),
            };
            let mut lines = vec![
                format!("{:<14}{}", "Name:", name),
                format!("{:<14}{}", "Status:", "Active"),
            ];
            if let Some(created) = ages.get(name) {
                lines.push(format!("{:<14}{}", "Created:", created.to_rfc2822()));
            }
            lines.push("Resources:".to_string());
            for kind in ResourceKind::ALL {
                lines.push(format!("  {:<12}{}", format!("{}:", kind.plural()), count(kind)));
            }
            let history = ctx.bus.get_history_filtered(&filters::by_namespace(name.clone()));
            lines.push(format_events(&history, ctx.now).trim_end().to_string());
            lines.join("\n")
        })
        .collect();
    Ok(blocks.join("\n\n"))
}
