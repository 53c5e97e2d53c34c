//! CLI module for kubesim
//!
//! Two layers:
//! - `Cli` - the host binary's own arguments (clap)
//! - `parser`/`executor`/`handlers` - the simulated kubectl command
//!   surface, driven one line at a time

use clap::{ArgAction, Parser};
use std::path::PathBuf;

pub mod display;
pub mod executor;
pub mod handlers;
pub mod parser;

pub use display::{format_event_history, format_table};
pub use executor::{CommandContext, CommandError, CommandResult, Executor, ExecutorConfig};
pub use parser::{parse, Action, OutputFormat, ParseError, ParsedCommand, ResourceType};

#[derive(Parser, Debug)]
#[command(name = "kubesim")]
#[command(about = "An event-sourced Kubernetes control plane simulator")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file (default: ~/.kubesim/config)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cluster snapshot (JSON) to load on start and save on exit
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Directory whose files are copied into the simulator under /manifests
    #[arg(long, value_name = "DIR")]
    pub manifests: Option<PathBuf>,

    /// Run a single command line and exit
    #[arg(short, long, value_name = "LINE")]
    pub command: Option<String>,

    /// Start with an empty cluster instead of the seeded one
    #[arg(long)]
    pub empty: bool,
}
