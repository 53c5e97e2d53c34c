//! `label` and `annotate`

use std::sync::Arc;

use super::select;
use crate::cli::executor::{CommandContext, CommandError, CommandResult};
use crate::cli::parser::{Action, ParseError, ParsedCommand, ResourceType};
use crate::cluster::configmap::ConfigMap;
use crate::cluster::events::{EventPayload, ResourceChange};
use crate::cluster::pod::Pod;
use crate::cluster::resources::{apply_key_changes, KeyChanges, KeyValues, Object};
use crate::cluster::secret::Secret;
use crate::cluster::state::StoredResource;

/// Which metadata map a command edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Labels,
    Annotations,
}

impl Target {
    fn noun(self) -> &'static str {
        match self {
            Target::Labels => "label",
            Target::Annotations => "annotation",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Target::Labels => "labeled",
            Target::Annotations => "annotated",
        }
    }

    fn current(self, resource: &impl Object) -> Option<&KeyValues> {
        let meta = resource.metadata();
        match self {
            Target::Labels => meta.labels.as_ref(),
            Target::Annotations => meta.annotations.as_ref(),
        }
    }
}

pub fn run(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let (target, changes) = match cmd.action {
        Action::Annotate => (Target::Annotations, cmd.annotation_changes.as_ref()),
        _ => (Target::Labels, cmd.label_changes.as_ref()),
    };
    let changes = match changes {
        Some(c) if !c.is_empty() => c,
        _ => {
            return Err(CommandError::invalid(format!(
                "at least one {} update is required",
                target.noun()
            )))
        }
    };
    let resource = cmd.resource.ok_or(ParseError::MissingResource(cmd.action))?;
    if cmd.name.is_none() && cmd.selector.is_none() {
        return Err(CommandError::invalid("resource(s) were provided, but no name was specified"));
    }

    match resource {
        ResourceType::Pods => edit::<Pod>(ctx, cmd, target, changes),
        ResourceType::ConfigMaps => edit::<ConfigMap>(ctx, cmd, target, changes),
        ResourceType::Secrets => edit::<Secret>(ctx, cmd, target, changes),
        other => match &cmd.name {
            Some(name) => Err(super::not_found(other, name)),
            None => Ok(super::no_resources(ctx, cmd)),
        },
    }
}

fn edit<R>(ctx: &CommandContext<'_>, cmd: &ParsedCommand, target: Target, changes: &KeyChanges) -> CommandResult<String>
where
    R: StoredResource,
    ResourceChange<R>: Into<EventPayload>,
{
    let items = select::<R>(ctx, cmd)?;
    if items.is_empty() {
        return Ok(super::no_resources(ctx, cmd));
    }

    // Every object is checked before any change is recorded
    for item in &items {
        check_overwrite(item.as_ref(), target, changes, cmd.flags.overwrite)?;
    }

    let lines = items
        .into_iter()
        .map(|item| commit_edit(ctx, item, target, changes))
        .collect::<Vec<_>>();
    Ok(lines.join("\n"))
}

fn check_overwrite(resource: &impl Object, target: Target, changes: &KeyChanges, overwrite: bool) -> CommandResult<()> {
    if overwrite {
        return Ok(());
    }
    let current = target.current(resource);
    // Setting a key that exists needs --overwrite, even to the same value
    for (key, value) in changes {
        let (Some(_), Some(existing)) = (value, current.and_then(|c| c.get(key))) else {
            continue;
        };
        return Err(CommandError::invalid(format!(
            "'{}' already has a value ({}), and --overwrite is false",
            key, existing
        )));
    }
    Ok(())
}

fn commit_edit<R>(ctx: &CommandContext<'_>, previous: Arc<R>, target: Target, changes: &KeyChanges) -> String
where
    R: StoredResource,
    ResourceChange<R>: Into<EventPayload>,
{
    let reference = previous.reference();
    let current = target.current(previous.as_ref()).cloned();
    let updated = apply_key_changes(current.as_ref(), changes);
    if updated == current {
        return format!("{} not {}", reference, target.verb());
    }

    let change = match target {
        Target::Labels => ResourceChange::labeled(previous, updated, changes.clone()),
        Target::Annotations => ResourceChange::annotated(previous, updated, changes.clone()),
    };
    ctx.commit(change);
    format!("{} {}", reference, target.verb())
}
