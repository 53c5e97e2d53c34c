//! Command executor - parse, dispatch to a handler, commit events
//!
//! Read-only handlers query the store. Mutating handlers validate first,
//! then [`CommandContext::commit`] one event per change. In
//! [`DispatchMode::Events`] the event goes through the bus and the store's
//! reducers apply it before `emit` returns; in [`DispatchMode::Direct`]
//! the store applies the same reducer itself. Both leave identical state.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::handlers;
use super::parser::{self, Action, ParseError, ParsedCommand};
use crate::cluster::bus::EventBus;
use crate::cluster::events::{ClusterEvent, EventMetadata, EventPayload};
use crate::cluster::state::{ClusterStore, StoreError};
use crate::config::manifest::ManifestError;
use crate::config::settings::{DispatchMode, SimulatorConfig};
use crate::config::LoadError;
use crate::filesystem::{FsError, SharedFileSystem};
use crate::runtime::container::ExecutionFailure;
use crate::runtime::reconciler::InitContainerReconciler;

/// Errors that can occur during command execution. `Display` is the text
/// the user sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Error from server (NotFound): {0}")]
    NotFound(String),

    #[error("Error from server (AlreadyExists): {0}")]
    AlreadyExists(String),

    #[error("Error from server (BadRequest): {0}")]
    BadRequest(String),

    #[error("Error from server (Forbidden): {0}")]
    Forbidden(String),

    #[error("error: {0}")]
    InvalidRequest(String),

    #[error("{message}\ncommand terminated with exit code {exit_code}")]
    Execution { exit_code: i32, message: String },

    #[error("error: {0}")]
    Validation(#[from] ManifestError),

    #[error("error: {0}")]
    File(#[from] FsError),

    #[error("Error from server (InternalError): {0}")]
    Internal(String),
}

impl CommandError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CommandError::InvalidRequest(message.into())
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => CommandError::NotFound(err.to_string()),
            StoreError::Snapshot(message) => CommandError::Internal(message),
        }
    }
}

impl From<LoadError> for CommandError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::File(e) => CommandError::File(e),
            LoadError::Manifest(e) => CommandError::Validation(e),
        }
    }
}

impl From<ExecutionFailure> for CommandError {
    fn from(failure: ExecutionFailure) -> Self {
        CommandError::Execution {
            exit_code: failure.exit_code,
            message: failure.message,
        }
    }
}

/// Result type for handlers
pub type CommandResult<T> = Result<T, CommandError>;

/// Executor settings, usually derived from [`SimulatorConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub tool_name: String,
    pub default_namespace: String,
    pub event_source: String,
    pub dispatch: DispatchMode,
    pub working_dir: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&SimulatorConfig::default())
    }
}

impl From<&SimulatorConfig> for ExecutorConfig {
    fn from(config: &SimulatorConfig) -> Self {
        Self {
            tool_name: config.tool_name.clone(),
            default_namespace: config.default_namespace.clone(),
            event_source: config.event_source.clone(),
            dispatch: config.dispatch,
            working_dir: config.working_dir.clone(),
        }
    }
}

/// Runs command lines against one simulated cluster
#[derive(Clone)]
pub struct Executor {
    store: ClusterStore,
    bus: EventBus,
    fs: SharedFileSystem,
    reconciler: InitContainerReconciler,
    config: ExecutorConfig,
}

/// Everything a handler needs for one command
pub struct CommandContext<'a> {
    pub store: &'a ClusterStore,
    pub bus: &'a EventBus,
    pub fs: &'a SharedFileSystem,
    pub reconciler: &'a InitContainerReconciler,
    pub config: &'a ExecutorConfig,
    /// Namespace from `-n`, or the configured default
    pub namespace: String,
    /// Whether `-n` was given
    pub explicit_namespace: bool,
    pub correlation_id: Uuid,
    pub now: DateTime<Utc>,
}

impl CommandContext<'_> {
    /// Record one change. Returns once the store reflects it.
    pub fn commit(&self, payload: impl Into<EventPayload>) {
        let event = ClusterEvent::new(
            payload,
            EventMetadata::new(self.config.event_source.clone(), self.correlation_id),
        );
        debug!(
            event_type = %event.event_type,
            namespace = %event.namespace(),
            name = %event.resource_name(),
            correlation_id = %self.correlation_id,
            "Committing event"
        );
        match self.config.dispatch {
            DispatchMode::Events => self.bus.emit(event),
            DispatchMode::Direct => self.store.apply_event(&event),
        }
    }
}

impl Executor {
    /// The store must already be attached to `bus` when dispatching
    /// through events.
    pub fn new(
        store: ClusterStore,
        bus: EventBus,
        fs: SharedFileSystem,
        reconciler: InitContainerReconciler,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            bus,
            fs,
            reconciler,
            config,
        }
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn file_system(&self) -> &SharedFileSystem {
        &self.fs
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one command line, returning the text to show
    pub fn execute(&self, line: &str) -> Result<String, String> {
        self.run(line).map_err(|e| e.to_string())
    }

    /// Typed variant of [`Executor::execute`]
    pub fn run(&self, line: &str) -> CommandResult<String> {
        let cmd = parser::parse(line, &self.config.tool_name)?;
        self.dispatch(&cmd)
            .map(|out| out.trim_end().to_string())
    }

    /// Run an already parsed command
    pub fn dispatch(&self, cmd: &ParsedCommand) -> CommandResult<String> {
        let ctx = CommandContext {
            store: &self.store,
            bus: &self.bus,
            fs: &self.fs,
            reconciler: &self.reconciler,
            config: &self.config,
            namespace: cmd
                .namespace
                .clone()
                .unwrap_or_else(|| self.config.default_namespace.clone()),
            explicit_namespace: cmd.namespace.is_some(),
            correlation_id: Uuid::new_v4(),
            now: Utc::now(),
        };
        debug!(
            action = %cmd.action,
            resource = ?cmd.resource,
            name = ?cmd.name,
            namespace = %ctx.namespace,
            "Dispatching command"
        );

        let result = match cmd.action {
            Action::Get => handlers::get::run(&ctx, cmd),
            Action::Describe => handlers::describe::run(&ctx, cmd),
            Action::Delete => handlers::delete::run(&ctx, cmd),
            Action::Create => handlers::create::run_create(&ctx, cmd),
            Action::Apply => handlers::create::run_apply(&ctx, cmd),
            Action::Label | Action::Annotate => handlers::label::run(&ctx, cmd),
            Action::Exec => handlers::exec::run(&ctx, cmd),
            Action::Logs => handlers::logs::run(&ctx, cmd),
        };

        if cmd.action.is_mutating() {
            match &result {
                Ok(_) => info!(action = %cmd.action, correlation_id = %ctx.correlation_id, "Command applied"),
                Err(e) => debug!(action = %cmd.action, error = %e, "Command rejected"),
            }
        }
        result
    }
}
