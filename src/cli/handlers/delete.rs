//! `delete` - remove resources by name, selector, manifest or namespace

use std::sync::Arc;

use super::{filter_by_selector, not_found, read_manifests};
use crate::cli::executor::{CommandContext, CommandError, CommandResult};
use crate::cli::parser::{Action, ParseError, ParsedCommand, ResourceType};
use crate::cluster::configmap::ConfigMap;
use crate::cluster::events::{EventPayload, ResourceChange};
use crate::cluster::pod::Pod;
use crate::cluster::resources::{Object, Resource, BUILTIN_NAMESPACES};
use crate::cluster::secret::Secret;
use crate::cluster::state::StoredResource;

pub fn run(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    if let Some(path) = &cmd.flags.filename {
        return from_manifests(ctx, path);
    }

    let resource = cmd.resource.ok_or(ParseError::MissingResource(Action::Delete))?;
    if cmd.name.is_none() && cmd.selector.is_none() {
        return Err(CommandError::invalid(
            "resource(s) were provided, but no name was specified",
        ));
    }

    match resource {
        ResourceType::Pods => delete_matching::<Pod>(ctx, cmd),
        ResourceType::ConfigMaps => delete_matching::<ConfigMap>(ctx, cmd),
        ResourceType::Secrets => delete_matching::<Secret>(ctx, cmd),
        ResourceType::Namespaces => match &cmd.name {
            Some(name) => delete_namespace(ctx, name),
            None => Ok("No resources found".to_string()),
        },
        other => match &cmd.name {
            Some(name) => Err(not_found(other, name)),
            None => Ok(super::no_resources(ctx, cmd)),
        },
    }
}

fn deleted_line<R: Object>(resource: &R) -> String {
    format!("{} \"{}\" deleted", R::KIND.singular(), resource.name())
}

fn commit_delete<R>(ctx: &CommandContext<'_>, resource: Arc<R>) -> String
where
    R: StoredResource,
    ResourceChange<R>: Into<EventPayload>,
{
    let line = deleted_line(resource.as_ref());
    ctx.commit(ResourceChange::Deleted { resource });
    line
}

fn delete_matching<R>(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String>
where
    R: StoredResource,
    ResourceChange<R>: Into<EventPayload>,
{
    let targets = match &cmd.name {
        Some(name) => vec![ctx.store.find::<R>(name, &ctx.namespace)?],
        None => filter_by_selector(ctx.store.list::<R>(Some(ctx.namespace.as_str())), cmd.selector.as_ref()),
    };
    if targets.is_empty() {
        return Ok(super::no_resources(ctx, cmd));
    }
    let lines: Vec<String> = targets.into_iter().map(|r| commit_delete(ctx, r)).collect();
    Ok(lines.join("\n"))
}

/// Every object of the file must exist before anything is deleted
fn from_manifests(ctx: &CommandContext<'_>, path: &str) -> CommandResult<String> {
    let manifests = read_manifests(ctx, path)?;

    enum Target {
        Pod(Arc<Pod>),
        ConfigMap(Arc<ConfigMap>),
        Secret(Arc<Secret>),
    }

    let mut targets = Vec::with_capacity(manifests.len());
    for (manifest, namespace) in &manifests {
        let name = &manifest.resource.metadata().name;
        let target = match &manifest.resource {
            Resource::Pod(_) => Target::Pod(ctx.store.find(name, namespace)?),
            Resource::ConfigMap(_) => Target::ConfigMap(ctx.store.find(name, namespace)?),
            Resource::Secret(_) => Target::Secret(ctx.store.find(name, namespace)?),
        };
        targets.push(target);
    }

    let lines: Vec<String> = targets
        .into_iter()
        .map(|t| match t {
            Target::Pod(r) => commit_delete(ctx, r),
            Target::ConfigMap(r) => commit_delete(ctx, r),
            Target::Secret(r) => commit_delete(ctx, r),
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Remove a namespace by deleting everything in it, one event per resource
fn delete_namespace(ctx: &CommandContext<'_>, name: &str) -> CommandResult<String> {
    if BUILTIN_NAMESPACES.contains(&name) {
        return Err(CommandError::Forbidden(format!(
            "namespaces \"{}\" is forbidden: this namespace may not be deleted",
            name
        )));
    }
    let state = ctx.store.snapshot();
    if !state.namespaces().iter().any(|n| n == name) {
        return Err(not_found(ResourceType::Namespaces, name));
    }

    for pod in ctx.store.list::<Pod>(Some(name)) {
        commit_delete(ctx, pod);
    }
    for cm in ctx.store.list::<ConfigMap>(Some(name)) {
        commit_delete(ctx, cm);
    }
    for secret in ctx.store.list::<Secret>(Some(name)) {
        commit_delete(ctx, secret);
    }
    Ok(format!("namespace \"{}\" deleted", name))
}
