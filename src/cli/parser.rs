//! Command interpreter - one command line to a [`ParsedCommand`]
//!
//! Pure: the same line always yields the same command or the same error,
//! and nothing here reads cluster state.

use std::fmt;

use clap::error::{ContextKind, ErrorKind};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::cluster::resources::{KeyChanges, KeyValues, ResourceKind};
use crate::config::manifest::validate_key;

/// Errors raised while interpreting a command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("error: command is empty")]
    Empty,

    #[error("error: commands must start with \"{0}\"")]
    MissingToolName(String),

    #[error("error: an action is required (one of: {})", Action::NAMES.join(", "))]
    MissingAction,

    #[error("error: unknown action \"{action}\" for \"{tool}\"")]
    UnknownAction { action: String, tool: String },

    #[error("error: you must specify the type of resource to {0}")]
    MissingResource(Action),

    #[error("error: the server doesn't have a resource type \"{0}\"")]
    UnknownResource(String),

    #[error("error: flag needs an argument: {0}")]
    FlagNeedsArgument(String),

    #[error("error: unknown flag: {0}")]
    UnknownFlag(String),

    #[error("error: a resource name is required")]
    MissingName,

    #[error("error: {0}")]
    InvalidArgument(String),

    #[error("error: {0}")]
    Tokenize(#[from] shell_words::ParseError),
}

/// What a command does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Describe,
    Delete,
    Apply,
    Create,
    Label,
    Annotate,
    Exec,
    Logs,
}

impl Action {
    pub const NAMES: [&'static str; 9] = [
        "get", "describe", "delete", "apply", "create", "label", "annotate", "exec", "logs",
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "get" => Action::Get,
            "describe" => Action::Describe,
            "delete" => Action::Delete,
            "apply" => Action::Apply,
            "create" => Action::Create,
            "label" => Action::Label,
            "annotate" => Action::Annotate,
            "exec" => Action::Exec,
            "logs" => Action::Logs,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Describe => "describe",
            Action::Delete => "delete",
            Action::Apply => "apply",
            Action::Create => "create",
            Action::Label => "label",
            Action::Annotate => "annotate",
            Action::Exec => "exec",
            Action::Logs => "logs",
        }
    }

    /// Whether the action changes cluster state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Action::Delete | Action::Apply | Action::Create | Action::Label | Action::Annotate
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource type named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Pods,
    ConfigMaps,
    Secrets,
    Deployments,
    Services,
    Namespaces,
    Nodes,
}

impl ResourceType {
    /// Accepts canonical plurals, singulars and short aliases
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token.to_ascii_lowercase().as_str() {
            "pods" | "pod" | "po" => ResourceType::Pods,
            "configmaps" | "configmap" | "cm" => ResourceType::ConfigMaps,
            "secrets" | "secret" => ResourceType::Secrets,
            "deployments" | "deployment" | "deploy" => ResourceType::Deployments,
            "services" | "service" | "svc" => ResourceType::Services,
            "namespaces" | "namespace" | "ns" => ResourceType::Namespaces,
            "nodes" | "node" | "no" => ResourceType::Nodes,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Pods => "pods",
            ResourceType::ConfigMaps => "configmaps",
            ResourceType::Secrets => "secrets",
            ResourceType::Deployments => "deployments",
            ResourceType::Services => "services",
            ResourceType::Namespaces => "namespaces",
            ResourceType::Nodes => "nodes",
        }
    }

    /// The stored kind, for types the store holds
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            ResourceType::Pods => Some(ResourceKind::Pod),
            ResourceType::ConfigMaps => Some(ResourceKind::ConfigMap),
            ResourceType::Secrets => Some(ResourceKind::Secret),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `-o` output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
    Wide,
    Name,
}

impl OutputFormat {
    fn from_token(token: &str) -> Result<Self, ParseError> {
        match token {
            "yaml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            "wide" => Ok(OutputFormat::Wide),
            "name" => Ok(OutputFormat::Name),
            other => Err(ParseError::InvalidArgument(format!(
                "unable to match a printer suitable for the output format \"{}\", allowed formats are: json,name,wide,yaml",
                other
            ))),
        }
    }
}

/// Subtype token of `create secret`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSubtype {
    Generic,
    Tls,
    DockerRegistry,
}

impl SecretSubtype {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "generic" => Some(SecretSubtype::Generic),
            "tls" => Some(SecretSubtype::Tls),
            "docker-registry" => Some(SecretSubtype::DockerRegistry),
            _ => None,
        }
    }
}

/// Flags that are not promoted to their own [`ParsedCommand`] field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    pub filename: Option<String>,
    pub output: Option<OutputFormat>,
    pub container: Option<String>,
    /// Raw `--tail` value; validated by `logs`
    pub tail: Option<String>,
    pub follow: bool,
    pub all_namespaces: bool,
    pub overwrite: bool,
    pub stdin: bool,
    pub tty: bool,
    pub from_literal: Vec<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub docker_server: Option<String>,
    pub docker_username: Option<String>,
    pub docker_password: Option<String>,
    pub docker_email: Option<String>,
}

/// A fully interpreted command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub action: Action,
    /// Absent only for `create`/`apply`/`delete` driven by `-f`
    pub resource: Option<ResourceType>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub flags: Flags,
    pub selector: Option<KeyValues>,
    pub label_changes: Option<KeyChanges>,
    pub annotation_changes: Option<KeyChanges>,
    pub exec_command: Option<Vec<String>>,
    pub secret_subtype: Option<SecretSubtype>,
}

impl ParsedCommand {
    fn new(action: Action) -> Self {
        Self {
            action,
            resource: None,
            name: None,
            namespace: None,
            flags: Flags::default(),
            selector: None,
            label_changes: None,
            annotation_changes: None,
            exec_command: None,
            secret_subtype: None,
        }
    }
}

// ============================================================================
// Argument definitions
// ============================================================================

#[derive(Parser, Debug)]
#[command(disable_help_subcommand = true)]
struct CommandLine {
    #[command(subcommand)]
    action: ActionArgs,
}

#[derive(Subcommand, Debug)]
enum ActionArgs {
    Get(GetArgs),
    Describe(TargetArgs),
    Delete(FileArgs),
    Apply(FileArgs),
    Create(CreateArgs),
    Label(EditArgs),
    Annotate(EditArgs),
    Exec(ExecArgs),
    Logs(LogsArgs),
}

/// Namespace and selection flags shared by every action
#[derive(Args, Debug)]
struct ScopeArgs {
    #[arg(short = 'n', long)]
    namespace: Option<String>,

    /// `k=v,k2=v2`
    #[arg(short = 'l', long)]
    selector: Option<String>,

    #[arg(short = 'A', long)]
    all_namespaces: bool,
}

#[derive(Args, Debug)]
struct TargetArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    targets: Vec<String>,
}

#[derive(Args, Debug)]
struct GetArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(short = 'o', long)]
    output: Option<String>,

    targets: Vec<String>,
}

#[derive(Args, Debug)]
struct FileArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(short = 'f', long)]
    filename: Option<String>,

    targets: Vec<String>,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[command(flatten)]
    file: FileArgs,

    #[arg(long)]
    from_literal: Vec<String>,

    #[arg(long)]
    cert: Option<String>,

    #[arg(long)]
    key: Option<String>,

    #[arg(long)]
    docker_server: Option<String>,

    #[arg(long)]
    docker_username: Option<String>,

    #[arg(long)]
    docker_password: Option<String>,

    #[arg(long)]
    docker_email: Option<String>,
}

#[derive(Args, Debug)]
struct EditArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(long)]
    overwrite: bool,

    /// Resource, name and `key=value` / `key-` changes
    targets: Vec<String>,
}

#[derive(Args, Debug)]
struct ExecArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(short = 'c', long)]
    container: Option<String>,

    #[arg(short = 'i', long)]
    stdin: bool,

    #[arg(short = 't', long)]
    tty: bool,

    pod: Option<String>,

    /// Everything after the pod name, or after `--`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Args, Debug)]
struct LogsArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(short = 'c', long)]
    container: Option<String>,

    /// `-f` here is `--follow`, not `--filename`
    #[arg(short = 'f', long)]
    follow: bool,

    /// Validated by the `logs` handler
    #[arg(long, allow_hyphen_values = true)]
    tail: Option<String>,

    targets: Vec<String>,
}

impl From<clap::Error> for ParseError {
    fn from(err: clap::Error) -> Self {
        let arg = err
            .get(ContextKind::InvalidArg)
            .map(|v| v.to_string())
            .and_then(|v| v.split_whitespace().next().map(str::to_string));
        match (err.kind(), arg) {
            (ErrorKind::UnknownArgument, Some(arg)) => ParseError::UnknownFlag(arg),
            (ErrorKind::InvalidValue | ErrorKind::NoEquals, Some(arg)) => ParseError::FlagNeedsArgument(arg),
            _ => {
                let rendered = err.to_string();
                let first = rendered.lines().next().unwrap_or_default();
                ParseError::InvalidArgument(first.trim_start_matches("error: ").to_string())
            }
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Interpret one command line. `tool_name` is the word every command
/// must start with (usually `kubectl`).
pub fn parse(line: &str, tool_name: &str) -> Result<ParsedCommand, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let tokens = shell_words::split(line)?;

    match tokens.first() {
        Some(t) if t == tool_name => {}
        _ => return Err(ParseError::MissingToolName(tool_name.to_string())),
    }
    let action_token = tokens.get(1).ok_or(ParseError::MissingAction)?;
    if Action::from_token(action_token).is_none() {
        return Err(ParseError::UnknownAction {
            action: action_token.clone(),
            tool: tool_name.to_string(),
        });
    }

    let line = CommandLine::try_parse_from(&tokens)?;
    let (mut cmd, positionals, trailing) = match line.action {
        ActionArgs::Get(args) => {
            let mut cmd = scoped(Action::Get, args.scope)?;
            cmd.flags.output = args.output.as_deref().map(OutputFormat::from_token).transpose()?;
            (cmd, args.targets, None)
        }
        ActionArgs::Describe(args) => (scoped(Action::Describe, args.scope)?, args.targets, None),
        ActionArgs::Delete(args) => with_file(Action::Delete, args)?,
        ActionArgs::Apply(args) => with_file(Action::Apply, args)?,
        ActionArgs::Create(args) => {
            let (mut cmd, targets, trailing) = with_file(Action::Create, args.file)?;
            let flags = &mut cmd.flags;
            flags.from_literal = args.from_literal;
            flags.cert = args.cert;
            flags.key = args.key;
            flags.docker_server = args.docker_server;
            flags.docker_username = args.docker_username;
            flags.docker_password = args.docker_password;
            flags.docker_email = args.docker_email;
            (cmd, targets, trailing)
        }
        ActionArgs::Label(args) => edit(Action::Label, args)?,
        ActionArgs::Annotate(args) => edit(Action::Annotate, args)?,
        ActionArgs::Exec(args) => {
            let mut cmd = scoped(Action::Exec, args.scope)?;
            cmd.flags.container = args.container;
            cmd.flags.stdin = args.stdin;
            cmd.flags.tty = args.tty;
            (cmd, args.pod.into_iter().collect(), Some(args.command))
        }
        ActionArgs::Logs(args) => {
            let mut cmd = scoped(Action::Logs, args.scope)?;
            cmd.flags.container = args.container;
            cmd.flags.follow = args.follow;
            cmd.flags.tail = args.tail;
            (cmd, args.targets, None)
        }
    };

    interpret_positionals(&mut cmd, positionals, trailing)?;
    Ok(cmd)
}

type Interpreted = (ParsedCommand, Vec<String>, Option<Vec<String>>);

fn scoped(action: Action, scope: ScopeArgs) -> Result<ParsedCommand, ParseError> {
    let mut cmd = ParsedCommand::new(action);
    cmd.namespace = scope.namespace;
    cmd.selector = scope.selector.as_deref().map(parse_selector).transpose()?;
    cmd.flags.all_namespaces = scope.all_namespaces;
    Ok(cmd)
}

fn with_file(action: Action, args: FileArgs) -> Result<Interpreted, ParseError> {
    let mut cmd = scoped(action, args.scope)?;
    cmd.flags.filename = args.filename;
    Ok((cmd, args.targets, None))
}

fn edit(action: Action, args: EditArgs) -> Result<Interpreted, ParseError> {
    let mut cmd = scoped(action, args.scope)?;
    cmd.flags.overwrite = args.overwrite;
    Ok((cmd, args.targets, None))
}

/// Parse `k=v,k2=v2` into a map
pub fn parse_selector(raw: &str) -> Result<KeyValues, ParseError> {
    let mut selector = KeyValues::new();
    for part in raw.split(',').filter(|p| !p.is_empty()) {
        let (k, v) = part
            .split_once("==")
            .or_else(|| part.split_once('='))
            .ok_or_else(|| ParseError::InvalidArgument(format!("invalid selector \"{}\"", raw)))?;
        if k.is_empty() {
            return Err(ParseError::InvalidArgument(format!("invalid selector \"{}\"", raw)));
        }
        selector.insert(k.to_string(), v.to_string());
    }
    Ok(selector)
}

/// Parse trailing `key=value` / `key-` tokens of `label` and `annotate`
fn parse_changes(tokens: &[String], what: &str) -> Result<KeyChanges, ParseError> {
    let mut changes = KeyChanges::new();
    for token in tokens {
        let (key, value) = if let Some((k, v)) = token.split_once('=') {
            (k, Some(v.to_string()))
        } else if let Some(k) = token.strip_suffix('-') {
            (k, None)
        } else {
            return Err(ParseError::InvalidArgument(format!(
                "at least one {} update is required, got \"{}\"",
                what, token
            )));
        };
        validate_key(what, key)
            .map_err(|_| ParseError::InvalidArgument(format!("invalid {} key \"{}\"", what, key)))?;
        changes.insert(key.to_string(), value);
    }
    Ok(changes)
}

/// Split `TYPE/NAME` when the first token has that form
fn split_type_name(token: &str) -> Result<Option<(ResourceType, String)>, ParseError> {
    match token.split_once('/') {
        Some((t, n)) => {
            let rt = ResourceType::from_token(t).ok_or_else(|| ParseError::UnknownResource(t.to_string()))?;
            if n.is_empty() {
                return Err(ParseError::MissingName);
            }
            Ok(Some((rt, n.to_string())))
        }
        None => Ok(None),
    }
}

fn unexpected(token: &str) -> ParseError {
    ParseError::InvalidArgument(format!("unexpected argument \"{}\"", token))
}

fn interpret_positionals(
    cmd: &mut ParsedCommand,
    positionals: Vec<String>,
    trailing: Option<Vec<String>>,
) -> Result<(), ParseError> {
    let mut pos = positionals.into_iter();

    match cmd.action {
        Action::Exec | Action::Logs => {
            let first = pos.next().ok_or(ParseError::MissingName)?;
            cmd.resource = Some(ResourceType::Pods);
            cmd.name = Some(match split_type_name(&first)? {
                Some((ResourceType::Pods, name)) => name,
                Some((other, _)) => {
                    return Err(ParseError::InvalidArgument(format!(
                        "cannot {} into {}",
                        cmd.action, other
                    )))
                }
                None => first,
            });
            let rest: Vec<String> = pos.collect();
            if cmd.action == Action::Logs {
                if let Some(extra) = rest.first().or(trailing.as_ref().and_then(|t| t.first())) {
                    return Err(unexpected(extra));
                }
            } else {
                let command = match trailing {
                    Some(t) => t,
                    None => rest,
                };
                if command.is_empty() {
                    return Err(ParseError::InvalidArgument(
                        "you must specify at least one command for the container".to_string(),
                    ));
                }
                cmd.exec_command = Some(command);
            }
            return Ok(());
        }
        _ => {}
    }

    if let Some(extra) = trailing.as_ref().and_then(|t| t.first()) {
        return Err(unexpected(extra));
    }

    let by_file = cmd.flags.filename.is_some();
    if cmd.action == Action::Apply {
        if !by_file {
            return Err(ParseError::InvalidArgument("must specify -f to apply".to_string()));
        }
        if let Some(extra) = pos.next() {
            return Err(unexpected(&extra));
        }
        return Ok(());
    }

    let Some(first) = pos.next() else {
        if by_file && matches!(cmd.action, Action::Create | Action::Delete) {
            return Ok(());
        }
        return Err(ParseError::MissingResource(cmd.action));
    };
    if by_file && matches!(cmd.action, Action::Create | Action::Delete) {
        return Err(unexpected(&first));
    }

    match split_type_name(&first)? {
        Some((rt, name)) => {
            cmd.resource = Some(rt);
            cmd.name = Some(name);
        }
        None => {
            let rt = ResourceType::from_token(&first).ok_or(ParseError::UnknownResource(first))?;
            cmd.resource = Some(rt);
            if cmd.action == Action::Create && rt == ResourceType::Secrets {
                let sub = pos.next().ok_or_else(|| {
                    ParseError::InvalidArgument(
                        "create secret requires a type: generic, tls or docker-registry".to_string(),
                    )
                })?;
                cmd.secret_subtype = Some(SecretSubtype::from_token(&sub).ok_or_else(|| {
                    ParseError::InvalidArgument(format!(
                        "unknown secret type \"{}\", expected generic, tls or docker-registry",
                        sub
                    ))
                })?);
            }
            cmd.name = pos.next();
        }
    }

    let mut rest: Vec<String> = pos.collect();
    match cmd.action {
        Action::Label | Action::Annotate => {
            // With -l the first change may have landed in the name slot
            if cmd.name.as_deref().is_some_and(|n| n.contains('=') || n.ends_with('-')) {
                if let Some(change) = cmd.name.take() {
                    rest.insert(0, change);
                }
            }
            if cmd.name.is_none() && cmd.selector.is_none() {
                return Err(ParseError::MissingName);
            }
            if cmd.action == Action::Label {
                cmd.label_changes = Some(parse_changes(&rest, "label")?);
            } else {
                cmd.annotation_changes = Some(parse_changes(&rest, "annotation")?);
            }
        }
        Action::Create => {
            if cmd.name.is_none() {
                return Err(ParseError::MissingName);
            }
            if let Some(extra) = rest.first() {
                return Err(unexpected(extra));
            }
        }
        Action::Describe | Action::Delete | Action::Get => {
            if let Some(extra) = rest.first() {
                return Err(unexpected(extra));
            }
        }
        Action::Apply | Action::Exec | Action::Logs => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(line: &str) -> Result<ParsedCommand, ParseError> {
        parse(line, "kubectl")
    }

    #[test]
    fn test_get_with_alias_and_namespace() {
        let cmd = p("kubectl get po -n kube-system").unwrap();
        assert_eq!(cmd.action, Action::Get);
        assert_eq!(cmd.resource, Some(ResourceType::Pods));
        assert_eq!(cmd.namespace.as_deref(), Some("kube-system"));
        assert_eq!(cmd.name, None);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let line = "kubectl get pods nginx --namespace=default -o yaml";
        assert_eq!(p(line), p(line));
        let cmd = p(line).unwrap();
        assert_eq!(cmd.name.as_deref(), Some("nginx"));
        assert_eq!(cmd.flags.output, Some(OutputFormat::Yaml));
    }

    #[test]
    fn test_aliases() {
        for (token, expected) in [
            ("deploy", ResourceType::Deployments),
            ("svc", ResourceType::Services),
            ("ns", ResourceType::Namespaces),
            ("cm", ResourceType::ConfigMaps),
            ("secret", ResourceType::Secrets),
            ("no", ResourceType::Nodes),
        ] {
            let cmd = p(&format!("kubectl get {}", token)).unwrap();
            assert_eq!(cmd.resource, Some(expected));
        }
    }

    #[test]
    fn test_errors() {
        assert_eq!(p("   "), Err(ParseError::Empty));
        assert!(p("   ").unwrap_err().to_string().contains("command is empty"));
        assert!(p("docker ps").unwrap_err().to_string().contains("kubectl"));
        assert!(p("kubectl frobnicate pods").unwrap_err().to_string().contains("action"));
        assert!(p("kubectl get widgets").unwrap_err().to_string().contains("resource type"));
        assert!(p("kubectl get").unwrap_err().to_string().contains("resource"));
        assert!(p("kubectl get pods -n").unwrap_err().to_string().contains("flag"));
        assert!(p("kubectl get pods --bogus").unwrap_err().to_string().contains("unknown flag"));
        assert!(p("kubectl get pods \"unterminated").is_err());
    }

    #[test]
    fn test_type_slash_name() {
        let cmd = p("kubectl describe pod/nginx").unwrap();
        assert_eq!(cmd.resource, Some(ResourceType::Pods));
        assert_eq!(cmd.name.as_deref(), Some("nginx"));
    }

    #[test]
    fn test_label_changes() {
        let cmd = p("kubectl label pods nginx tier=web url=a=b env- --overwrite").unwrap();
        let changes = cmd.label_changes.unwrap();
        assert_eq!(changes.get("tier"), Some(&Some("web".to_string())));
        assert_eq!(changes.get("url"), Some(&Some("a=b".to_string())));
        assert_eq!(changes.get("env"), Some(&None));
        assert!(cmd.flags.overwrite);
    }

    #[test]
    fn test_annotate_without_changes() {
        let cmd = p("kubectl annotate cm app-config").unwrap();
        assert_eq!(cmd.annotation_changes, Some(KeyChanges::new()));
        assert_eq!(p("kubectl label pods"), Err(ParseError::MissingName));
    }

    #[test]
    fn test_label_by_selector() {
        let cmd = p("kubectl label pods -l app=web tier=frontend").unwrap();
        assert_eq!(cmd.name, None);
        let changes = cmd.label_changes.unwrap();
        assert_eq!(changes.get("tier"), Some(&Some("frontend".to_string())));
    }

    #[test]
    fn test_exec_with_separator() {
        let cmd = p("kubectl exec -it nginx -- ls -la /etc").unwrap();
        assert!(cmd.flags.stdin && cmd.flags.tty);
        assert_eq!(cmd.name.as_deref(), Some("nginx"));
        assert_eq!(
            cmd.exec_command,
            Some(vec!["ls".to_string(), "-la".to_string(), "/etc".to_string()])
        );
    }

    #[test]
    fn test_exec_without_separator() {
        let cmd = p("kubectl exec nginx -n default env").unwrap();
        assert_eq!(cmd.namespace.as_deref(), Some("default"));
        assert_eq!(cmd.exec_command, Some(vec!["env".to_string()]));

        let cmd = p("kubectl exec nginx ls -la").unwrap();
        assert_eq!(cmd.exec_command, Some(vec!["ls".to_string(), "-la".to_string()]));
    }

    #[test]
    fn test_exec_and_logs_need_name() {
        assert!(p("kubectl logs").unwrap_err().to_string().contains("a resource name is required"));
        assert!(p("kubectl exec -it").unwrap_err().to_string().contains("a resource name is required"));
    }

    #[test]
    fn test_logs_flags() {
        let cmd = p("kubectl logs nginx -f --tail 5 -c nginx").unwrap();
        assert!(cmd.flags.follow);
        assert_eq!(cmd.flags.tail.as_deref(), Some("5"));
        assert_eq!(cmd.flags.container.as_deref(), Some("nginx"));
        assert_eq!(cmd.flags.filename, None);
    }

    #[test]
    fn test_filename_flag() {
        let cmd = p("kubectl apply -f /manifests/pod.yaml").unwrap();
        assert_eq!(cmd.resource, None);
        assert_eq!(cmd.flags.filename.as_deref(), Some("/manifests/pod.yaml"));
        assert!(p("kubectl apply").is_err());
        assert!(p("kubectl create -f").unwrap_err().to_string().contains("flag"));
    }

    #[test]
    fn test_create_secret_subtype() {
        let cmd = p("kubectl create secret generic creds --from-literal=user=admin --from-literal pass=x").unwrap();
        assert_eq!(cmd.secret_subtype, Some(SecretSubtype::Generic));
        assert_eq!(cmd.name.as_deref(), Some("creds"));
        assert_eq!(cmd.flags.from_literal, vec!["user=admin", "pass=x"]);
        assert!(p("kubectl create secret magic creds").is_err());
        assert_eq!(p("kubectl create configmap"), Err(ParseError::MissingName));
    }

    #[test]
    fn test_selector() {
        let cmd = p("kubectl get pods -l app=nginx,tier=web -A").unwrap();
        let selector = cmd.selector.unwrap();
        assert_eq!(selector.get("app").map(String::as_str), Some("nginx"));
        assert_eq!(selector.len(), 2);
        assert!(cmd.flags.all_namespaces);
        assert!(p("kubectl get pods -l app").is_err());
    }

    #[test]
    fn test_custom_tool_name() {
        assert!(parse("k get pods", "k").is_ok());
        assert!(parse("kubectl get pods", "k").is_err());
    }

    #[test]
    fn test_quoted_values() {
        let cmd = p(r#"kubectl annotate pod web note="hello world" 'team=a b'"#).unwrap();
        let changes = cmd.annotation_changes.unwrap();
        assert_eq!(changes.get("note"), Some(&Some("hello world".to_string())));
        assert_eq!(changes.get("team"), Some(&Some("a b".to_string())));
    }

    #[test]
    fn test_short_f_depends_on_action() {
        let cmd = p("kubectl delete -f web.yaml").unwrap();
        assert_eq!(cmd.flags.filename.as_deref(), Some("web.yaml"));
        assert!(!cmd.flags.follow);

        let cmd = p("kubectl logs web -f").unwrap();
        assert!(cmd.flags.follow);
        assert_eq!(cmd.flags.filename, None);
    }

    #[test]
    fn test_flags_outside_their_action() {
        assert_eq!(p("kubectl get pods --overwrite"), Err(ParseError::UnknownFlag("--overwrite".to_string())));
        assert!(p("kubectl describe pods -o yaml").unwrap_err().to_string().contains("unknown flag"));
    }

    #[test]
    fn test_inline_and_negative_values() {
        let cmd = p("kubectl logs web --tail=-2 -nteam").unwrap();
        assert_eq!(cmd.flags.tail.as_deref(), Some("-2"));
        assert_eq!(cmd.namespace.as_deref(), Some("team"));
    }

    #[test]
    fn test_missing_flag_value_names_flag() {
        assert_eq!(
            p("kubectl get pods -n"),
            Err(ParseError::FlagNeedsArgument("--namespace".to_string()))
        );
    }

    #[test]
    fn test_invalid_output() {
        assert!(p("kubectl get pods -o table").unwrap_err().to_string().contains("output format"));
    }
}
