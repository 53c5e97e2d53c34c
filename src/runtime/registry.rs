//! Image registry - validates container image references
//!
//! The reconciler asks the registry whether an init container's image can
//! be pulled before running it. [`StaticRegistry`] knows a fixed set of
//! public images and trusts any reference that names a registry host.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Why an image cannot be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("couldn't parse image reference \"{0}\": invalid reference format")]
    InvalidReference(String),

    #[error("failed to pull image \"{0}\": repository does not exist or may require authorization")]
    NotFound(String),
}

impl ImageError {
    /// Waiting/terminated reason shown for the container
    pub fn reason(&self) -> &'static str {
        match self {
            ImageError::InvalidReference(_) => "InvalidImageName",
            ImageError::NotFound(_) => "ErrImagePull",
        }
    }
}

/// A parsed image reference: `[host[:port]/]repository[:tag][@digest]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub host: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

fn component_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("valid regex"))
}

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").expect("valid regex"))
}

fn digest_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^sha256:[a-f0-9]{64}$").expect("valid regex"))
}

fn host_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?(?::[0-9]+)?$").expect("valid regex")
    })
}

impl ImageReference {
    pub fn parse(image: &str) -> Result<Self, ImageError> {
        let invalid = || ImageError::InvalidReference(image.to_string());
        if image.is_empty() || image.trim() != image {
            return Err(invalid());
        }

        let (rest, digest) = match image.split_once('@') {
            Some((r, d)) => {
                if !digest_pattern().is_match(d) {
                    return Err(invalid());
                }
                (r, Some(d.to_string()))
            }
            None => (image, None),
        };

        let mut components: Vec<&str> = rest.split('/').collect();
        let host = if components.len() > 1 {
            let first = components[0];
            if first.contains('.') || first.contains(':') || first == "localhost" {
                if !host_pattern().is_match(first) {
                    return Err(invalid());
                }
                components.remove(0);
                Some(first.to_string())
            } else {
                None
            }
        } else {
            None
        };

        // A tag can only follow the last path component
        let last = components.pop().ok_or_else(invalid)?;
        let (last, tag) = match last.split_once(':') {
            Some((name, tag)) => {
                if !tag_pattern().is_match(tag) {
                    return Err(invalid());
                }
                (name, Some(tag.to_string()))
            }
            None => (last, None),
        };
        components.push(last);

        if components.iter().any(|c| !component_pattern().is_match(c)) {
            return Err(invalid());
        }

        Ok(Self {
            host,
            repository: components.join("/"),
            tag,
            digest,
        })
    }

    /// Repository without the implicit `library/` prefix of official images
    pub fn short_repository(&self) -> &str {
        self.repository
            .strip_prefix("library/")
            .unwrap_or(&self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "{}/", host)?;
        }
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Source of truth for whether an image can be pulled
pub trait ImageRegistry: Send + Sync {
    fn validate_image(&self, image: &str) -> Result<ImageReference, ImageError>;
}

/// Public images known to exist without a network lookup
pub const KNOWN_IMAGES: &[&str] = &[
    "alpine",
    "busybox",
    "centos",
    "debian",
    "fedora",
    "golang",
    "httpd",
    "memcached",
    "mongo",
    "mysql",
    "nginx",
    "node",
    "postgres",
    "python",
    "rabbitmq",
    "redis",
    "ubuntu",
    "coredns/coredns",
    "curlimages/curl",
    "bitnami/kubectl",
];

/// A registry backed by a fixed allow-list
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    known: BTreeSet<String>,
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new(KNOWN_IMAGES.iter().map(|s| s.to_string()))
    }
}

impl StaticRegistry {
    pub fn new(known: impl IntoIterator<Item = String>) -> Self {
        Self {
            known: known.into_iter().collect(),
        }
    }

    pub fn with_image(mut self, repository: impl Into<String>) -> Self {
        self.known.insert(repository.into());
        self
    }
}

impl ImageRegistry for StaticRegistry {
    fn validate_image(&self, image: &str) -> Result<ImageReference, ImageError> {
        let reference = ImageReference::parse(image)?;
        // Private registries are outside the simulation; trust them
        if reference.host.is_some() || self.known.contains(reference.short_repository()) {
            Ok(reference)
        } else {
            Err(ImageError::NotFound(image.to_string()))
        }
    }
}
