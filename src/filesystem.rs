//! Virtual filesystem
//!
//! A small in-memory tree used for container root filesystems and for the
//! manifest files read by `create -f` / `apply -f`. Consumers only use the
//! narrow read/write contract: [`VirtualFileSystem::read_file`],
//! [`VirtualFileSystem::create_file`], [`VirtualFileSystem::create_directory`]
//! and [`VirtualFileSystem::list_directory`].
//!
//! The whole tree is a plain value: cloning it produces an independent
//! snapshot, which is how per-container filesystems are stored in pod status.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filesystem shared between the executor and the embedding application
pub type SharedFileSystem = Arc<RwLock<VirtualFileSystem>>;

/// Errors returned by filesystem operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("{0}: No such file or directory")]
    NotFound(String),

    #[error("{0}: Not a directory")]
    NotADirectory(String),

    #[error("{0}: Is a directory")]
    IsADirectory(String),

    #[error("{0}: File exists")]
    AlreadyExists(String),

    #[error("{0}: path must be absolute")]
    InvalidPath(String),
}

/// A node in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FsNode {
    File { content: String },
    Directory,
}

/// A directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// In-memory filesystem keyed by normalized absolute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFileSystem {
    nodes: BTreeMap<String, FsNode>,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem {
    /// Create an empty filesystem containing only `/`
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), FsNode::Directory);
        Self { nodes }
    }

    /// The base layout every simulated container starts from
    pub fn container_base() -> Self {
        let mut fs = Self::new();
        for dir in [
            "/bin", "/dev", "/etc", "/home", "/proc", "/root", "/sys", "/tmp", "/usr", "/var",
            "/var/log",
        ] {
            // Parents exist by construction
            let _ = fs.create_directory(dir, true);
        }
        let _ = fs.create_file("/etc/os-release", "NAME=\"Simulated Linux\"\nID=simulated\n");
        let _ = fs.create_file("/etc/passwd", "root:x:0:0:root:/root:/bin/sh\n");
        fs
    }

    /// Normalize an absolute path, resolving `.` and `..`
    pub fn normalize(path: &str) -> Result<String, FsError> {
        if !path.starts_with('/') {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                p => parts.push(p),
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }

    /// Resolve `path` against `cwd` when it is relative
    pub fn resolve(cwd: &str, path: &str) -> Result<String, FsError> {
        if path.starts_with('/') {
            Self::normalize(path)
        } else {
            Self::normalize(&format!("{}/{}", cwd.trim_end_matches('/'), path))
        }
    }

    fn parent_of(path: &str) -> Option<String> {
        if path == "/" {
            return None;
        }
        match path.rfind('/') {
            Some(0) => Some("/".to_string()),
            Some(idx) => Some(path[..idx].to_string()),
            None => None,
        }
    }

    fn require_parent_dir(&self, path: &str) -> Result<(), FsError> {
        if let Some(parent) = Self::parent_of(path) {
            match self.nodes.get(&parent) {
                Some(FsNode::Directory) => Ok(()),
                Some(FsNode::File { .. }) => Err(FsError::NotADirectory(parent)),
                None => Err(FsError::NotFound(parent)),
            }
        } else {
            Ok(())
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|p| self.nodes.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|p| matches!(self.nodes.get(&p), Some(FsNode::Directory)))
            .unwrap_or(false)
    }

    pub fn is_file(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|p| matches!(self.nodes.get(&p), Some(FsNode::File { .. })))
            .unwrap_or(false)
    }

    /// Read a file's content
    pub fn read_file(&self, path: &str) -> Result<String, FsError> {
        let path = Self::normalize(path)?;
        match self.nodes.get(&path) {
            Some(FsNode::File { content }) => Ok(content.clone()),
            Some(FsNode::Directory) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    /// Create or overwrite a file. The parent directory must exist.
    pub fn create_file(&mut self, path: &str, content: &str) -> Result<(), FsError> {
        let path = Self::normalize(path)?;
        if matches!(self.nodes.get(&path), Some(FsNode::Directory)) {
            return Err(FsError::IsADirectory(path));
        }
        self.require_parent_dir(&path)?;
        self.nodes.insert(
            path,
            FsNode::File {
                content: content.to_string(),
            },
        );
        Ok(())
    }

    /// Append to a file, creating it when absent
    pub fn append_file(&mut self, path: &str, content: &str) -> Result<(), FsError> {
        let normalized = Self::normalize(path)?;
        let existing = match self.nodes.get(&normalized) {
            Some(FsNode::File { content }) => content.clone(),
            Some(FsNode::Directory) => return Err(FsError::IsADirectory(normalized)),
            None => String::new(),
        };
        self.create_file(&normalized, &format!("{}{}", existing, content))
    }

    /// Create a directory. With `recursive`, missing parents are created and
    /// an existing directory is not an error.
    pub fn create_directory(&mut self, path: &str, recursive: bool) -> Result<(), FsError> {
        let path = Self::normalize(path)?;
        match self.nodes.get(&path) {
            Some(FsNode::Directory) if recursive => return Ok(()),
            Some(_) => return Err(FsError::AlreadyExists(path)),
            None => {}
        }
        if recursive {
            if let Some(parent) = Self::parent_of(&path) {
                self.create_directory(&parent, true)?;
            }
        } else {
            self.require_parent_dir(&path)?;
        }
        self.nodes.insert(path, FsNode::Directory);
        Ok(())
    }

    /// List the direct children of a directory, sorted by name
    pub fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let path = Self::normalize(path)?;
        match self.nodes.get(&path) {
            Some(FsNode::Directory) => {}
            Some(FsNode::File { .. }) => return Err(FsError::NotADirectory(path)),
            None => return Err(FsError::NotFound(path)),
        }
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        Ok(self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| !p[prefix.len()..].contains('/') && p.len() > prefix.len())
            .map(|(p, node)| DirEntry {
                name: p[prefix.len()..].to_string(),
                is_dir: matches!(node, FsNode::Directory),
            })
            .collect())
    }

    /// Number of files in the tree
    pub fn file_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n, FsNode::File { .. }))
            .count()
    }
}
