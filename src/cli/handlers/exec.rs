//! `exec` - run a command in a container
//!
//! Nothing is executed. A handful of commands get simulated output based
//! on the pod spec and the container's filesystem snapshot; anything else
//! echoes back what would have run.

use crate::cli::display::env_value_display;
use crate::cli::executor::{CommandContext, CommandError, CommandResult};
use crate::cli::parser::{ParseError, ParsedCommand};
use crate::cluster::pod::{Container, ContainerType, Pod, PodPhase};
use crate::cluster::resources::Object;
use crate::filesystem::{FsError, VirtualFileSystem};

pub fn run(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let name = cmd.name.as_deref().ok_or(ParseError::MissingName)?;
    let pod = ctx.store.find::<Pod>(name, &ctx.namespace)?;

    match pod.phase() {
        PodPhase::Running => {}
        phase @ (PodPhase::Succeeded | PodPhase::Failed) => {
            return Err(CommandError::invalid(format!(
                "cannot exec into a container in a completed pod; current phase is {}",
                phase
            )))
        }
        phase => {
            return Err(CommandError::invalid(format!(
                "unable to upgrade connection: pod is not running (phase {})",
                phase
            )))
        }
    }

    let container = pod.container(cmd.flags.container.as_deref()).ok_or_else(|| {
        CommandError::invalid(format!(
            "container {} is not valid for pod {}",
            cmd.flags.container.as_deref().unwrap_or_default(),
            pod.name()
        ))
    })?;
    let command = cmd.exec_command.as_deref().unwrap_or_default();
    let Some((program, args)) = command.split_first() else {
        return Err(CommandError::invalid("you must specify at least one command for the container"));
    };

    let fs = pod
        .container_status(&container.name, ContainerType::Regular)
        .and_then(|s| s.file_system.clone())
        .unwrap_or_else(VirtualFileSystem::container_base);

    simulate(&pod, container, &fs, program, args)
}

fn simulate(
    pod: &Pod,
    container: &Container,
    fs: &VirtualFileSystem,
    program: &str,
    args: &[String],
) -> CommandResult<String> {
    match program {
        "sh" | "bash" | "/bin/sh" | "/bin/bash" if args.is_empty() => Ok(format!(
            "Connected to {}/{} ({}). Interactive shells are simulated; pass a command after -- instead.",
            pod.name(),
            container.name,
            container.image
        )),
        "env" => Ok(environment(pod, container).join("\n")),
        "pwd" => Ok("/".to_string()),
        "whoami" => Ok("root".to_string()),
        "hostname" => Ok(pod.name().to_string()),
        "echo" => Ok(args.join(" ")),
        "ls" => list(fs, args),
        "cat" => cat(fs, args),
        _ => Ok(format!(
            "Executed '{}' in container {} (simulated output)",
            std::iter::once(program.to_string())
                .chain(args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" "),
            container.name
        )),
    }
}

/// Standard variables, then the container's own. References to config
/// maps and secrets are shown as placeholders.
fn environment(pod: &Pod, container: &Container) -> Vec<String> {
    let mut vars = vec![
        "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
        format!("HOSTNAME={}", pod.name()),
        "HOME=/root".to_string(),
        "KUBERNETES_SERVICE_HOST=10.96.0.1".to_string(),
        "KUBERNETES_SERVICE_PORT=443".to_string(),
    ];
    vars.extend(
        container
            .env
            .iter()
            .flatten()
            .map(|var| format!("{}={}", var.name, env_value_display(var))),
    );
    vars
}

fn list(fs: &VirtualFileSystem, args: &[String]) -> CommandResult<String> {
    let paths: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with('-'))
        .collect();
    let path = paths.first().copied().unwrap_or("/");
    let resolved = VirtualFileSystem::resolve("/", path)?;

    if fs.is_file(&resolved) {
        return Ok(path.to_string());
    }
    match fs.list_directory(&resolved) {
        Ok(entries) => Ok(entries
            .into_iter()
            .map(|e| e.name)
            .collect::<Vec<_>>()
            .join("\n")),
        Err(FsError::NotFound(_)) => Err(CommandError::Execution {
            exit_code: 2,
            message: format!("ls: cannot access '{}': No such file or directory", path),
        }),
        Err(e) => Err(CommandError::Execution {
            exit_code: 2,
            message: format!("ls: {}", e),
        }),
    }
}

fn cat(fs: &VirtualFileSystem, args: &[String]) -> CommandResult<String> {
    if args.is_empty() {
        return Ok(String::new());
    }
    let mut out = String::new();
    for path in args {
        let resolved = VirtualFileSystem::resolve("/", path)?;
        match fs.read_file(&resolved) {
            Ok(content) => out.push_str(&content),
            Err(FsError::IsADirectory(_)) => {
                return Err(CommandError::Execution {
                    exit_code: 1,
                    message: format!("cat: {}: Is a directory", path),
                })
            }
            Err(_) => {
                return Err(CommandError::Execution {
                    exit_code: 1,
                    message: format!("cat: {}: No such file or directory", path),
                })
            }
        }
    }
    Ok(out)
}
