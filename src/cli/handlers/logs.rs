//! `logs` - print a container's log lines

use crate::cli::executor::{CommandContext, CommandError, CommandResult};
use crate::cli::parser::{ParseError, ParsedCommand};
use crate::cluster::pod::{ContainerState, ContainerType, Pod};
use crate::cluster::resources::Object;
use crate::runtime::logs::generate_logs;

/// Appended by `--follow`; nothing is streamed
pub const FOLLOW_MARKER: &str = "[following logs: no new entries]";

/// Parse `--tail`. Only positive integers are accepted.
fn parse_tail(raw: &str) -> CommandResult<usize> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::invalid(format!(
            "invalid argument \"{}\" for \"--tail\" flag: must be a positive integer",
            raw
        ))),
    }
}

pub fn run(ctx: &CommandContext<'_>, cmd: &ParsedCommand) -> CommandResult<String> {
    let tail = cmd.flags.tail.as_deref().map(parse_tail).transpose()?;
    let name = cmd.name.as_deref().ok_or(ParseError::MissingName)?;
    let pod = ctx.store.find::<Pod>(name, &ctx.namespace)?;

    let requested = cmd.flags.container.as_deref();
    let (container, container_type) = match pod.container(requested) {
        Some(c) => (c, ContainerType::Regular),
        None => match requested.and_then(|n| pod.init_containers().iter().find(|c| c.name == n)) {
            Some(c) => (c, ContainerType::Init),
            None => {
                return Err(CommandError::BadRequest(format!(
                    "container {} is not valid for pod {}",
                    requested.unwrap_or_default(),
                    pod.name()
                )))
            }
        },
    };

    if let Some(ContainerState::Waiting { reason }) = pod
        .container_status(&container.name, container_type)
        .map(|s| &s.state)
    {
        return Err(CommandError::BadRequest(format!(
            "container \"{}\" in pod \"{}\" is waiting to start: {}",
            container.name,
            pod.name(),
            reason
        )));
    }

    let mut lines = match &pod.status.logs {
        Some(stored) => stored.clone(),
        None => generate_logs(&pod, container),
    };
    if let Some(n) = tail {
        let skip = lines.len().saturating_sub(n);
        lines.drain(..skip);
    }
    if cmd.flags.follow {
        lines.push(FOLLOW_MARKER.to_string());
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tail() {
        assert_eq!(parse_tail("3"), Ok(3));
        assert!(parse_tail("0").is_err());
        assert!(parse_tail("-2").is_err());
        assert!(parse_tail("ten").is_err());
    }
}
