pub mod manifest;
pub mod settings;

pub use manifest::{parse_manifest, parse_manifests, Manifest, ManifestError};
pub use settings::{
    default_config_path, expand_path, load_config, load_config_from, parse_config, save_config_to,
    serialize_config, ConfigError, DispatchMode, HistoryConfig, SimulatorConfig,
};

use thiserror::Error;

use crate::filesystem::{FsError, VirtualFileSystem};

/// Errors for reading a manifest file (separate from pure parsing errors)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{0}")]
    File(#[from] FsError),

    #[error("{0}")]
    Manifest(#[from] ManifestError),
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Read a manifest file from the virtual filesystem and parse every
/// document in it. Relative paths resolve against `cwd`.
pub fn load_manifest_file(
    fs: &VirtualFileSystem,
    cwd: &str,
    path: &str,
) -> Result<Vec<Manifest>, LoadError> {
    let resolved = VirtualFileSystem::resolve(cwd, path)?;
    let content = fs.read_file(&resolved)?;
    Ok(parse_manifests(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_manifest_file() {
        let mut fs = VirtualFileSystem::new();
        fs.create_directory("/workspace", true).unwrap();
        fs.create_file(
            "/workspace/cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\ndata:\n  a: b\n",
        )
        .unwrap();

        let manifests = load_manifest_file(&fs, "/workspace", "cm.yaml").unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].resource.metadata().name, "cfg");
    }

    #[test]
    fn test_load_missing_file() {
        let fs = VirtualFileSystem::new();
        let result = load_manifest_file(&fs, "/", "/nope.yaml");
        assert!(matches!(result, Err(LoadError::File(_))));
    }

    #[test]
    fn test_load_invalid_manifest() {
        let mut fs = VirtualFileSystem::new();
        fs.create_file("/bad.yaml", "kind: Pod\n").unwrap();
        let result = load_manifest_file(&fs, "/", "/bad.yaml");
        assert!(matches!(result, Err(LoadError::Manifest(_))));
    }
}
