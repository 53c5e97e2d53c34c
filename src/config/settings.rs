use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cluster::DEFAULT_NAMESPACE;

/// Default config file location: ~/.kubesim/config
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kubesim")
        .join("config")
}

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Errors that can occur while loading or saving the simulator config
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to write config: {0}")]
    WriteError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// How mutating commands reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Emit an event; the store's reducers apply it
    #[default]
    Events,
    /// Apply the reducer to the store without going through the bus
    Direct,
}

/// Event history settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_history")]
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: default_max_history(),
        }
    }
}

/// The complete simulator configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Name commands must start with
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Namespace used when a command has no `-n`
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    #[serde(default)]
    pub history: HistoryConfig,

    /// Start from the seeded demo cluster instead of an empty one
    #[serde(default = "default_true")]
    pub seed_cluster: bool,

    /// `source` recorded on every emitted event
    #[serde(default = "default_tool_name")]
    pub event_source: String,

    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Working directory inside the virtual filesystem
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
            default_namespace: default_namespace(),
            history: HistoryConfig::default(),
            seed_cluster: true,
            event_source: default_tool_name(),
            dispatch: DispatchMode::default(),
            working_dir: default_working_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    1000
}

fn default_tool_name() -> String {
    "kubectl".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_working_dir() -> String {
    "/workspace".to_string()
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse config from YAML string
pub fn parse_config(content: &str) -> Result<SimulatorConfig, ConfigError> {
    let config: SimulatorConfig =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Serialize config to YAML string
pub fn serialize_config(config: &SimulatorConfig) -> Result<String, ConfigError> {
    serde_yaml::to_string(config).map_err(|e| ConfigError::WriteError(e.to_string()))
}

/// Reject values the simulator cannot run with
pub fn validate_config(config: &SimulatorConfig) -> Result<(), ConfigError> {
    if config.tool_name.trim().is_empty() || config.tool_name.contains(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!(
            "tool_name must be a single word, got {:?}",
            config.tool_name
        )));
    }
    if config.default_namespace.is_empty() {
        return Err(ConfigError::Invalid("default_namespace must not be empty".to_string()));
    }
    if config.history.enabled && config.history.max_size == 0 {
        return Err(ConfigError::Invalid(
            "history.max_size must be positive when history is enabled".to_string(),
        ));
    }
    if !config.working_dir.starts_with('/') {
        return Err(ConfigError::Invalid(format!(
            "working_dir must be absolute, got {:?}",
            config.working_dir
        )));
    }
    Ok(())
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load config from the default location
pub fn load_config() -> Result<SimulatorConfig, ConfigError> {
    load_config_from(&default_config_path())
}

/// Load config from a specific path. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<SimulatorConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(SimulatorConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Save config to a specific path
pub fn save_config_to(config: &SimulatorConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serialize_config(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.tool_name, "kubectl");
        assert_eq!(config.default_namespace, "default");
        assert!(config.history.enabled);
        assert_eq!(config.history.max_size, 1000);
        assert_eq!(config.dispatch, DispatchMode::Events);
        assert!(config.seed_cluster);
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
tool_name: k
dispatch: direct
history:
  max_size: 5
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.tool_name, "k");
        assert_eq!(config.dispatch, DispatchMode::Direct);
        assert_eq!(config.history.max_size, 5);
        assert!(config.history.enabled);
        assert_eq!(config.event_source, "kubectl");
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        assert!(matches!(parse_config("tool_name: \"my tool\""), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            parse_config("history:\n  max_size: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(parse_config("working_dir: relative"), Err(ConfigError::Invalid(_))));
        assert!(matches!(parse_config("dispatch: [1]"), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&dir.path().join("absent")).unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config");
        let config = SimulatorConfig {
            seed_cluster: false,
            ..Default::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_expand_path() {
        let expanded = expand_path("/tmp/state.json");
        assert_eq!(expanded, PathBuf::from("/tmp/state.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/x"), home.join("x"));
        }
    }
}
