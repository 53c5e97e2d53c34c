//! One simulated cluster, wired up
//!
//! A session owns the store, the bus the store listens on, the virtual
//! filesystem manifests are read from, and the executor that ties them
//! together. Everything a front end needs goes through here.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cli::display::format_event_history;
use crate::cli::executor::{CommandResult, Executor, ExecutorConfig};
use crate::cluster::bus::{BusConfig, EventBus};
use crate::cluster::events::ClusterEvent;
use crate::cluster::seed::default_state;
use crate::cluster::state::{ClusterStateData, ClusterStore, StoreBinding, StoreError};
use crate::config::settings::{DispatchMode, SimulatorConfig};
use crate::filesystem::{FsError, SharedFileSystem, VirtualFileSystem};
use crate::runtime::reconciler::InitContainerReconciler;

/// Where `--manifests` files land
pub const MANIFEST_DIR: &str = "/manifests";

pub struct ClusterSession {
    config: SimulatorConfig,
    executor: Executor,
    binding: Option<StoreBinding>,
}

impl ClusterSession {
    /// A session with the initial state the config asks for
    pub fn new(config: SimulatorConfig) -> Self {
        let state = if config.seed_cluster {
            default_state(Utc::now())
        } else {
            ClusterStateData::default()
        };
        Self::with_state(config, state)
    }

    pub fn with_state(config: SimulatorConfig, state: ClusterStateData) -> Self {
        Self::with_reconciler(config, state, InitContainerReconciler::default())
    }

    /// Full constructor; lets callers plug in their own registry/runtime
    pub fn with_reconciler(
        config: SimulatorConfig,
        state: ClusterStateData,
        reconciler: InitContainerReconciler,
    ) -> Self {
        let store = ClusterStore::with_state(state);
        let bus = EventBus::with_config(BusConfig {
            enable_history: config.history.enabled,
            max_history_size: config.history.max_size,
        });
        let binding = match config.dispatch {
            DispatchMode::Events => Some(store.attach(&bus)),
            DispatchMode::Direct => None,
        };

        let mut fs = VirtualFileSystem::new();
        for dir in [config.working_dir.as_str(), MANIFEST_DIR] {
            if let Err(e) = fs.create_directory(dir, true) {
                debug!(dir, error = %e, "Skipping session directory");
            }
        }
        let fs: SharedFileSystem = Arc::new(RwLock::new(fs));

        let executor = Executor::new(store, bus, fs, reconciler, ExecutorConfig::from(&config));
        info!(
            resources = executor.store().snapshot().resource_count(),
            dispatch = ?config.dispatch,
            "Cluster session ready"
        );
        Self {
            config,
            executor,
            binding,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn store(&self) -> &ClusterStore {
        self.executor.store()
    }

    pub fn bus(&self) -> &EventBus {
        self.executor.bus()
    }

    /// Run one command line; `Err` carries the message to show
    pub fn execute(&self, line: &str) -> Result<String, String> {
        self.executor.execute(line)
    }

    /// Typed variant of [`ClusterSession::execute`]
    pub fn run(&self, line: &str) -> CommandResult<String> {
        self.executor.run(line)
    }

    pub fn history(&self) -> Vec<ClusterEvent> {
        self.bus().get_history()
    }

    /// The event log as printed by the REPL's `history` command
    pub fn format_history(&self) -> String {
        format_event_history(&self.history())
    }

    /// Place a file in the virtual filesystem, creating parent directories
    pub fn add_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        let path = VirtualFileSystem::resolve(&self.config.working_dir, path)?;
        let mut fs = self.executor.file_system().write();
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !parent.is_empty() {
                fs.create_directory(parent, true)?;
            }
        }
        fs.create_file(&path, content)
    }

    pub fn export_json(&self) -> Result<String, StoreError> {
        self.store().to_json()
    }

    /// Replace the cluster state. Bus history is left as is.
    pub fn import_json(&self, json: &str) -> Result<(), StoreError> {
        let state = ClusterStore::from_json(json)?.export_state();
        self.store().import_state(state);
        Ok(())
    }

    /// Stop the store from following the bus. Later commands in event
    /// mode are then recorded but no longer change state.
    pub fn detach(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.detach();
        }
    }
}

impl Default for ClusterSession {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}
