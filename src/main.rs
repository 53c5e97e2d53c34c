use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use kubesim::cli::Cli;
use kubesim::config::{expand_path, load_config, load_config_from};
use kubesim::session::MANIFEST_DIR;
use kubesim::ClusterSession;

const PROMPT: &str = "kubesim> ";

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            load_config_from(&path).with_context(|| format!("loading config {}", path.display()))?
        }
        None => load_config().context("loading config")?,
    };
    if cli.empty {
        config.seed_cluster = false;
    }

    let session = ClusterSession::new(config);

    let state_path = cli
        .state
        .as_ref()
        .map(|p| expand_path(&p.to_string_lossy()));
    if let Some(path) = state_path.as_ref().filter(|p| p.exists()) {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading state {}", path.display()))?;
        session
            .import_json(&json)
            .with_context(|| format!("importing state {}", path.display()))?;
        info!(path = %path.display(), "Loaded cluster state");
    }

    if let Some(dir) = &cli.manifests {
        let dir = expand_path(&dir.to_string_lossy());
        let copied = copy_manifests(&session, &dir, &dir)?;
        info!(files = copied, dir = %dir.display(), "Copied manifests into {}", MANIFEST_DIR);
    }

    let code = match &cli.command {
        Some(line) => run_line(&session, line),
        None => repl(&session)?,
    };

    if let Some(path) = &state_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = session.export_json()?;
        std::fs::write(path, json).with_context(|| format!("writing state {}", path.display()))?;
        info!(path = %path.display(), "Saved cluster state");
    }
    Ok(code)
}

/// Copy every file under `dir` into the virtual filesystem, keeping
/// paths relative to `root`
fn copy_manifests(session: &ClusterSession, root: &Path, dir: &Path) -> Result<usize> {
    let mut copied = 0;
    let entries = std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            copied += copy_manifests(session, root, &path)?;
            continue;
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let target = format!("{}/{}", MANIFEST_DIR, relative.to_string_lossy());
        session.add_file(&target, &content)?;
        copied += 1;
    }
    Ok(copied)
}

/// Print the outcome of one command. Returns the exit code.
fn run_line(session: &ClusterSession, line: &str) -> i32 {
    match session.execute(line) {
        Ok(out) => {
            if !out.is_empty() {
                println!("{}", out);
            }
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn repl(session: &ClusterSession) -> Result<i32> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    print!("{}", PROMPT);
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "exit" | "quit" => break,
            "history" => println!("{}", session.format_history()),
            command => {
                run_line(session, command);
            }
        }
        print!("{}", PROMPT);
        stdout.flush()?;
    }
    println!();
    Ok(0)
}
