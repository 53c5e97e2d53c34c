//! Container runtime - "executes" a container command against its
//! filesystem snapshot
//!
//! Nothing is really executed. [`SimulatedRuntime`] understands a small
//! shell subset, enough for typical init container scripts that write
//! config files or check for their presence:
//!
//! ```text
//! sh -c 'mkdir -p /work && echo ready > /work/status; test -f /work/status'
//! ```
//!
//! Statements are separated by `;` or `&&`. Commands it does not know
//! succeed without side effects.

use thiserror::Error;
use tracing::trace;

use crate::cluster::pod::Container;
use crate::filesystem::{FsError, VirtualFileSystem};
use crate::shell::split_script;

/// A container command that exited non-zero
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("container \"{container}\" exited with code {exit_code}: {message}")]
pub struct ExecutionFailure {
    pub container: String,
    pub exit_code: i32,
    pub message: String,
}

/// Runs a container to completion
pub trait ContainerRuntime: Send + Sync {
    /// Run `container` against `fs`, returning the filesystem it leaves
    /// behind
    fn run(&self, container: &Container, fs: VirtualFileSystem) -> Result<VirtualFileSystem, ExecutionFailure>;
}

/// The built-in shell-subset interpreter
#[derive(Debug, Clone, Default)]
pub struct SimulatedRuntime;

const SHELLS: &[&str] = &["sh", "/bin/sh", "bash", "/bin/bash", "ash", "/bin/ash"];

/// Result of one statement: exit code and stderr text
type Status = (i32, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    Always,
    OnSuccess,
}

enum Redirect {
    Truncate(String),
    Append(String),
}

impl ContainerRuntime for SimulatedRuntime {
    fn run(&self, container: &Container, fs: VirtualFileSystem) -> Result<VirtualFileSystem, ExecutionFailure> {
        let command = container.full_command();
        let failure = |exit_code: i32, message: String| ExecutionFailure {
            container: container.name.clone(),
            exit_code,
            message,
        };

        let script = match command.split_first() {
            None => return Ok(fs),
            Some((shell, rest)) if SHELLS.contains(&shell.as_str()) => match rest {
                [flag, script, ..] if flag == "-c" => script.clone(),
                _ => return Ok(fs),
            },
            // Quoted, so operator characters in the words stay literal
            Some(_) => shell_words::join(&command),
        };

        let words = split_script(&script).map_err(|e| failure(2, format!("sh: syntax error: {}", e)))?;
        let mut fs = fs;
        let (code, message) = run_script(&words, &mut fs);
        trace!(container = %container.name, exit_code = code, "Simulated container finished");
        if code == 0 {
            Ok(fs)
        } else {
            Err(failure(code, message))
        }
    }
}

fn run_script(words: &[String], fs: &mut VirtualFileSystem) -> Status {
    let mut status: Status = (0, String::new());
    let mut connector = Connector::Always;
    let mut statement: Vec<String> = Vec::new();

    let mut pending = words.iter();
    loop {
        let word = pending.next();
        let boundary = match word.map(String::as_str) {
            Some(";") => Some(Connector::Always),
            Some("&&") => Some(Connector::OnSuccess),
            None => Some(Connector::Always),
            Some(_) => None,
        };
        match boundary {
            None => {
                if let Some(w) = word {
                    statement.push(w.clone());
                }
            }
            Some(next) => {
                if !statement.is_empty() {
                    let skip = connector == Connector::OnSuccess && status.0 != 0;
                    if !skip {
                        if let Some(code) = exit_code(&statement) {
                            return (code, format!("exit {}", code));
                        }
                        status = run_statement(&statement, fs);
                    }
                    statement.clear();
                }
                connector = next;
                if word.is_none() {
                    return status;
                }
            }
        }
    }
}

/// `exit N` terminates the whole script
fn exit_code(statement: &[String]) -> Option<i32> {
    match statement {
        [cmd] if cmd == "exit" => Some(0),
        [cmd, code, ..] if cmd == "exit" => Some(code.parse().unwrap_or(2)),
        _ => None,
    }
}

fn split_redirect(statement: &[String]) -> Result<(Vec<String>, Option<Redirect>), String> {
    let mut args = Vec::new();
    let mut redirect = None;
    let mut iter = statement.iter();
    while let Some(word) = iter.next() {
        match word.as_str() {
            ">" | ">>" => {
                let target = iter
                    .next()
                    .ok_or_else(|| "sh: syntax error: missing redirect target".to_string())?;
                redirect = Some(if word == ">" {
                    Redirect::Truncate(target.clone())
                } else {
                    Redirect::Append(target.clone())
                });
            }
            _ => args.push(word.clone()),
        }
    }
    Ok((args, redirect))
}

fn path(p: &str) -> Result<String, FsError> {
    VirtualFileSystem::resolve("/", p)
}

fn fs_status(cmd: &str, result: Result<(), FsError>) -> Status {
    match result {
        Ok(()) => (0, String::new()),
        Err(e) => (1, format!("{}: {}", cmd, e)),
    }
}

fn run_statement(statement: &[String], fs: &mut VirtualFileSystem) -> Status {
    let (args, redirect) = match split_redirect(statement) {
        Ok(parts) => parts,
        Err(message) => return (2, message),
    };
    let Some((cmd, rest)) = args.split_first() else {
        return (0, String::new());
    };

    let mut stdout = String::new();
    let status: Status = match cmd.as_str() {
        "true" | ":" | "sleep" => (0, String::new()),
        "false" => (1, String::new()),
        "echo" => {
            let (newline, words) = match rest.first().map(String::as_str) {
                Some("-n") => (false, &rest[1..]),
                _ => (true, rest),
            };
            stdout.push_str(&words.join(" "));
            if newline {
                stdout.push('\n');
            }
            (0, String::new())
        }
        "printf" => {
            if let Some(format) = rest.first() {
                stdout.push_str(&format.replace("\\n", "\n").replace("\\t", "\t"));
            }
            (0, String::new())
        }
        "cat" => {
            let mut status = (0, String::new());
            for p in rest {
                match path(p).and_then(|p| fs.read_file(&p)) {
                    Ok(content) => stdout.push_str(&content),
                    Err(e) => {
                        status = (1, format!("cat: {}", e));
                        break;
                    }
                }
            }
            status
        }
        "mkdir" => {
            let recursive = rest.iter().any(|a| a == "-p");
            let result = rest
                .iter()
                .filter(|a| !a.starts_with('-'))
                .try_for_each(|p| fs.create_directory(&path(p)?, recursive));
            fs_status("mkdir", result)
        }
        "touch" => {
            let result = rest.iter().try_for_each(|p| {
                let p = path(p)?;
                if fs.exists(&p) {
                    Ok(())
                } else {
                    fs.create_file(&p, "")
                }
            });
            fs_status("touch", result)
        }
        "cp" => match rest {
            [src, dst] => {
                let result = path(src)
                    .and_then(|s| fs.read_file(&s))
                    .and_then(|content| {
                        let mut target = path(dst)?;
                        if fs.is_dir(&target) {
                            let file = src.rsplit('/').next().unwrap_or(src.as_str());
                            target = format!("{}/{}", target.trim_end_matches('/'), file);
                        }
                        fs.create_file(&target, &content)
                    });
                fs_status("cp", result)
            }
            _ => (1, "cp: missing file operand".to_string()),
        },
        "test" => evaluate_test(rest, fs),
        "[" => match rest.split_last() {
            Some((last, inner)) if last == "]" => evaluate_test(inner, fs),
            _ => (2, "[: missing ']'".to_string()),
        },
        _ => (0, String::new()),
    };

    if status.0 != 0 {
        return status;
    }
    match redirect {
        None => status,
        Some(Redirect::Truncate(target)) => {
            fs_status("sh", path(&target).and_then(|p| fs.create_file(&p, &stdout)))
        }
        Some(Redirect::Append(target)) => {
            fs_status("sh", path(&target).and_then(|p| fs.append_file(&p, &stdout)))
        }
    }
}

fn evaluate_test(args: &[String], fs: &VirtualFileSystem) -> Status {
    let truth = match args {
        [op, p] if op == "-f" => path(p).map(|p| fs.is_file(&p)).unwrap_or(false),
        [op, p] if op == "-d" => path(p).map(|p| fs.is_dir(&p)).unwrap_or(false),
        [op, p] if op == "-e" => path(p).map(|p| fs.exists(&p)).unwrap_or(false),
        [op, s] if op == "-z" => s.is_empty(),
        [op, s] if op == "-n" => !s.is_empty(),
        [a, op, b] if op == "=" || op == "==" => a == b,
        [a, op, b] if op == "!=" => a != b,
        [s] => !s.is_empty(),
        [] => false,
        _ => return (2, "test: unsupported expression".to_string()),
    };
    if truth {
        (0, String::new())
    } else {
        (1, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> Result<VirtualFileSystem, ExecutionFailure> {
        let container = Container::new("init", "busybox").with_command(&["sh", "-c", script]);
        SimulatedRuntime.run(&container, VirtualFileSystem::container_base())
    }

    #[test]
    fn test_echo_redirect_writes_file() {
        let fs = run("mkdir -p /work/conf && echo 'port=80' > /work/conf/app.cfg; echo more >> /work/conf/app.cfg").unwrap();
        assert_eq!(fs.read_file("/work/conf/app.cfg").unwrap(), "port=80\nmore\n");
    }

    #[test]
    fn test_exit_code_propagates() {
        let err = run("echo start; exit 3").unwrap_err();
        assert_eq!(err.exit_code, 3);
        assert_eq!(err.container, "init");
    }

    #[test]
    fn test_false_fails_and_and_chain_skips() {
        assert_eq!(run("false").unwrap_err().exit_code, 1);
        let fs = run("false && touch /tmp/skipped; true").unwrap();
        assert!(!fs.exists("/tmp/skipped"));
    }

    #[test]
    fn test_test_builtin() {
        assert!(run("test -d /etc").is_ok());
        assert!(run("[ -f /etc/passwd ]").is_ok());
        assert_eq!(run("test -f /missing").unwrap_err().exit_code, 1);
        assert_eq!(run("[ -f /etc/passwd").unwrap_err().exit_code, 2);
    }

    #[test]
    fn test_cat_missing_file_fails() {
        let err = run("cat /nope").unwrap_err();
        assert!(err.message.contains("No such file"));
    }

    #[test]
    fn test_cp_into_directory() {
        let fs = run("echo hi > /tmp/a; mkdir /data; cp /tmp/a /data").unwrap();
        assert_eq!(fs.read_file("/data/a").unwrap(), "hi\n");
    }

    #[test]
    fn test_non_shell_command() {
        let container = Container::new("init", "busybox").with_command(&["false"]);
        assert!(SimulatedRuntime
            .run(&container, VirtualFileSystem::new())
            .is_err());

        let container = Container::new("init", "busybox").with_command(&["nslookup", "db"]);
        assert!(SimulatedRuntime.run(&container, VirtualFileSystem::new()).is_ok());
    }

    #[test]
    fn test_non_shell_arguments_are_not_scripts() {
        let container = Container::new("init", "busybox").with_command(&["touch", "/tmp/a;b", "/tmp/it's"]);
        let fs = SimulatedRuntime
            .run(&container, VirtualFileSystem::container_base())
            .unwrap();
        assert!(fs.is_file("/tmp/a;b"));
        assert!(fs.is_file("/tmp/it's"));
        assert!(!fs.exists("/tmp/a"));
    }

    #[test]
    fn test_no_command_succeeds() {
        let container = Container::new("init", "busybox");
        let fs = SimulatedRuntime
            .run(&container, VirtualFileSystem::container_base())
            .unwrap();
        assert!(fs.is_dir("/tmp"));
    }
}
