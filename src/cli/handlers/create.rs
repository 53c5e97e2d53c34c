//! `create` and `apply`
//!
//! Both validate every object first and commit only when all of them are
//! acceptable, one event per object. Pods are reconciled before their
//! `Created`/`Updated` event, so the event carries the pod's final status.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use super::read_manifests;
use crate::cli::executor::{CommandContext, CommandError, CommandResult};
use crate::cli::parser::{Action, ParseError, ParsedCommand, ResourceType, SecretSubtype};
use crate::cluster::configmap::ConfigMap;
use crate::cluster::events::{EventPayload, ResourceChange};
use crate::cluster::resources::{ObjectMeta, Resource};
use crate::cluster::secret::{encode_value, Secret, SecretType, DOCKER_CONFIG_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY};
use crate::cluster::state::StoredResource;
use crate::config::manifest::{validate_key, validate_name, validate_namespace};
use crate::filesystem::VirtualFileSystem;

const DEFAULT_DOCKER_SERVER: &str = "https://index.docker.io/v1/";

/// A validated change, ready to commit
enum Step {
    Commit(EventPayload, String),
    Unchanged(String),
}

impl Step {
    fn finish(self, ctx: &CommandContext<'_>) -> String {
        match self {
            Step::Commit(payload, line) => {
                ctx.commit(payload);
                line
            }
            Step::Unchanged(line) => line,
        }
    }
}

fn commit_all(ctx: &CommandContext<'_>, steps: Vec<Step>) -> String {
    steps
        .into_iter()
        .map(|s| s.finish(ctx))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pods get their init containers run; other kinds are stored as given
fn prepare(ctx: &CommandContext<'_>, resource: Resource) -> Resource {
    match resource {
        Resource::Pod(pod) => Resource::Pod(ctx.reconciler.reconcile(&pod)),
        other => other,
    }
}

// ============================================================================
// create
// ============================================================================

pub fn run_create(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    if let Some(path) = &cmd.flags.filename {
        let manifests = read_manifests(ctx, path)?;
        let mut steps = Vec::with_capacity(manifests.len());
        for (manifest, namespace) in manifests {
            let resource = manifest.resource.in_namespace(&namespace);
            steps.push(plan_create(ctx, prepare(ctx, resource))?);
        }
        return Ok(commit_all(ctx, steps));
    }

    let resource = cmd.resource.ok_or(ParseError::MissingResource(Action::Create))?;
    let name = cmd.name.as_deref().ok_or(ParseError::MissingName)?;
    validate_name(name)?;
    validate_namespace(&ctx.namespace)?;
    let meta = ObjectMeta::new(name, ctx.namespace.clone()).with_creation_timestamp(ctx.now);

    let created = match resource {
        ResourceType::ConfigMaps => {
            let data = literals(&cmd.flags.from_literal)?;
            let data = if data.is_empty() {
                None
            } else {
                Some(data.into_iter().collect())
            };
            Resource::ConfigMap(ConfigMap::from_parts(meta, data))
        }
        ResourceType::Secrets => {
            let subtype = cmd
                .secret_subtype
                .ok_or_else(|| CommandError::invalid("secret type is required (generic, tls, docker-registry)"))?;
            Resource::Secret(secret_from_flags(ctx, cmd, subtype, meta)?)
        }
        other => {
            return Err(CommandError::invalid(format!(
                "creating {} from the command line is not supported; use -f FILE",
                other
            )))
        }
    };

    let step = plan_create(ctx, created)?;
    Ok(step.finish(ctx))
}

fn plan_create(ctx: &CommandContext<'_>, resource: Resource) -> CommandResult<Step> {
    match resource {
        Resource::Pod(r) => create_step(ctx, r),
        Resource::ConfigMap(r) => create_step(ctx, r),
        Resource::Secret(r) => create_step(ctx, r),
    }
}

fn create_step<R>(ctx: &CommandContext<'_>, resource: R) -> CommandResult<Step>
where
    R: StoredResource,
    ResourceChange<R>: Into<EventPayload>,
{
    if ctx.store.find::<R>(resource.name(), resource.namespace()).is_ok() {
        return Err(CommandError::AlreadyExists(format!(
            "{} \"{}\" already exists",
            R::KIND.plural(),
            resource.name()
        )));
    }
    let line = format!("{} created", resource.reference());
    let change = ResourceChange::Created {
        resource: Arc::new(resource),
    };
    Ok(Step::Commit(change.into(), line))
}

/// `key=value` pairs from `--from-literal`, in order given
fn literals(raw: &[String]) -> CommandResult<Vec<(String, String)>> {
    let mut seen = BTreeMap::new();
    let mut pairs = Vec::with_capacity(raw.len());
    for literal in raw {
        let (key, value) = literal.split_once('=').ok_or_else(|| {
            CommandError::invalid(format!("invalid literal source {}, expected key=value", literal))
        })?;
        validate_key("data", key)?;
        if seen.insert(key.to_string(), ()).is_some() {
            return Err(CommandError::invalid(format!(
                "cannot add key {}, another key by that name already exists",
                key
            )));
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

fn read_local_file(ctx: &CommandContext<'_>, path: &str) -> CommandResult<String> {
    let resolved = VirtualFileSystem::resolve(&ctx.config.working_dir, path)?;
    Ok(ctx.fs.read().read_file(&resolved)?)
}

fn secret_from_flags(
    ctx: &CommandContext<'_>,
    cmd: &ParsedCommand,
    subtype: SecretSubtype,
    meta: ObjectMeta,
) -> CommandResult<Secret> {
    let flags = &cmd.flags;
    match subtype {
        SecretSubtype::Generic => Ok(Secret::from_literals(meta, &literals(&flags.from_literal)?)),
        SecretSubtype::Tls => {
            let (cert_path, key_path) = match (&flags.cert, &flags.key) {
                (Some(c), Some(k)) => (c, k),
                _ => return Err(CommandError::invalid("--cert and --key must both be specified")),
            };
            let cert = encode_value(&read_local_file(ctx, cert_path)?);
            let key = encode_value(&read_local_file(ctx, key_path)?);
            let data = BTreeMap::from([
                (TLS_CERT_KEY.to_string(), cert.clone()),
                (TLS_PRIVATE_KEY.to_string(), key.clone()),
            ]);
            Ok(Secret::from_parts(meta, SecretType::Tls { cert, key }, Some(data)))
        }
        SecretSubtype::DockerRegistry => {
            let (username, password) = match (&flags.docker_username, &flags.docker_password) {
                (Some(u), Some(p)) => (u, p),
                _ => {
                    return Err(CommandError::invalid(
                        "--docker-username and --docker-password are required",
                    ))
                }
            };
            let server = flags.docker_server.as_deref().unwrap_or(DEFAULT_DOCKER_SERVER);
            let mut entry = json!({
                "username": username,
                "password": password,
                "auth": encode_value(&format!("{}:{}", username, password)),
            });
            if let Some(email) = &flags.docker_email {
                entry["email"] = json!(email);
            }
            let config = json!({ "auths": { server: entry } });
            let encoded = encode_value(&config.to_string());
            let data = BTreeMap::from([(DOCKER_CONFIG_KEY.to_string(), encoded.clone())]);
            Ok(Secret::from_parts(
                meta,
                SecretType::DockerConfigJson {
                    docker_config_json: encoded,
                },
                Some(data),
            ))
        }
    }
}

// ============================================================================
// apply
// ============================================================================

pub fn run_apply(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let path = cmd
        .flags
        .filename
        .as_deref()
        .ok_or_else(|| CommandError::invalid("must specify one of -f and -k"))?;
    let manifests = read_manifests(ctx, path)?;
    let steps: Vec<Step> = manifests
        .into_iter()
        .map(|(manifest, namespace)| {
            let resource = prepare(ctx, manifest.resource.in_namespace(&namespace));
            match resource {
                Resource::Pod(r) => apply_step(ctx, r),
                Resource::ConfigMap(r) => apply_step(ctx, r),
                Resource::Secret(r) => apply_step(ctx, r),
            }
        })
        .collect();
    Ok(commit_all(ctx, steps))
}

/// Create when absent; otherwise update in place, keeping the identity
/// (uid, creation time) of the stored object
fn apply_step<R>(ctx: &CommandContext<'_>, resource: R) -> Step
where
    R: StoredResource,
    ResourceChange<R>: Into<EventPayload>,
{
    let reference = resource.reference();
    let Ok(previous) = ctx.store.find::<R>(resource.name(), resource.namespace()) else {
        let change = ResourceChange::Created {
            resource: Arc::new(resource),
        };
        return Step::Commit(change.into(), format!("{} created", reference));
    };

    if previous.same_definition(&resource) {
        return Step::Unchanged(format!("{} unchanged", reference));
    }

    let meta = ObjectMeta {
        uid: previous.metadata().uid,
        creation_timestamp: previous.metadata().creation_timestamp,
        ..resource.metadata().clone()
    };
    let change = ResourceChange::Updated {
        resource: Arc::new(resource.with_metadata(meta)),
        previous,
    };
    Step::Commit(change.into(), format!("{} configured", reference))
}
