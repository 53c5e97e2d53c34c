//! Secret resource - confidential key/value data
//!
//! Data values are stored base64-encoded, as the API server stores them.
//! The secret type is a closed set of variants, some of which carry the
//! fields that type requires. Older snapshots and manifests give the type
//! as a plain string; those are normalized on deserialize.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::resources::{Object, ObjectMeta, ResourceKind, CORE_API_VERSION};

pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY: &str = "tls.key";
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind is always "Secret"
    pub kind: String,

    pub metadata: ObjectMeta,

    #[serde(rename = "type")]
    #[serde(default)]
    pub secret_type: SecretType,

    /// Base64-encoded values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

/// The type of a secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "name")]
pub enum SecretType {
    #[default]
    #[serde(rename = "Opaque")]
    Opaque,

    #[serde(rename = "kubernetes.io/service-account-token")]
    ServiceAccountToken {
        #[serde(rename = "serviceAccountName")]
        service_account_name: String,
    },

    #[serde(rename = "kubernetes.io/dockerconfigjson")]
    DockerConfigJson {
        #[serde(rename = "dockerConfigJson")]
        docker_config_json: String,
    },

    #[serde(rename = "kubernetes.io/tls")]
    Tls { cert: String, key: String },
}

impl SecretType {
    /// The type name as printed in the TYPE column
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Opaque => "Opaque",
            SecretType::ServiceAccountToken { .. } => "kubernetes.io/service-account-token",
            SecretType::DockerConfigJson { .. } => "kubernetes.io/dockerconfigjson",
            SecretType::Tls { .. } => "kubernetes.io/tls",
        }
    }

    /// Normalize a plain type name, pulling the type-specific fields out of
    /// the (base64-encoded) data. Returns `None` for unknown type names.
    pub fn from_legacy(name: &str, data: Option<&BTreeMap<String, String>>) -> Option<Self> {
        let field = |key: &str| {
            data.and_then(|d| d.get(key))
                .cloned()
                .unwrap_or_default()
        };
        match name {
            "" | "Opaque" => Some(SecretType::Opaque),
            "kubernetes.io/service-account-token" => Some(SecretType::ServiceAccountToken {
                service_account_name: String::new(),
            }),
            "kubernetes.io/dockerconfigjson" => Some(SecretType::DockerConfigJson {
                docker_config_json: field(DOCKER_CONFIG_KEY),
            }),
            "kubernetes.io/tls" => Some(SecretType::Tls {
                cert: field(TLS_CERT_KEY),
                key: field(TLS_PRIVATE_KEY),
            }),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecretTypeRepr {
    Legacy(String),
    Structured(StructuredSecretType),
}

#[derive(Deserialize)]
#[serde(tag = "name")]
enum StructuredSecretType {
    #[serde(rename = "Opaque")]
    Opaque,
    #[serde(rename = "kubernetes.io/service-account-token")]
    ServiceAccountToken {
        #[serde(rename = "serviceAccountName", default)]
        service_account_name: String,
    },
    #[serde(rename = "kubernetes.io/dockerconfigjson")]
    DockerConfigJson {
        #[serde(rename = "dockerConfigJson", default)]
        docker_config_json: String,
    },
    #[serde(rename = "kubernetes.io/tls")]
    Tls {
        #[serde(default)]
        cert: String,
        #[serde(default)]
        key: String,
    },
}

impl<'de> Deserialize<'de> for SecretType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match SecretTypeRepr::deserialize(deserializer)? {
            SecretTypeRepr::Legacy(name) => SecretType::from_legacy(&name, None).unwrap_or_else(|| {
                warn!(secret_type = %name, "unknown legacy secret type; treating as Opaque");
                SecretType::Opaque
            }),
            SecretTypeRepr::Structured(s) => match s {
                StructuredSecretType::Opaque => SecretType::Opaque,
                StructuredSecretType::ServiceAccountToken {
                    service_account_name,
                } => SecretType::ServiceAccountToken {
                    service_account_name,
                },
                StructuredSecretType::DockerConfigJson { docker_config_json } => {
                    SecretType::DockerConfigJson { docker_config_json }
                }
                StructuredSecretType::Tls { cert, key } => SecretType::Tls { cert, key },
            },
        })
    }
}

impl Secret {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::from_parts(ObjectMeta::new(name, namespace), SecretType::Opaque, None)
    }

    pub fn from_parts(
        metadata: ObjectMeta,
        secret_type: SecretType,
        data: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            api_version: CORE_API_VERSION.to_string(),
            kind: "Secret".to_string(),
            metadata,
            secret_type,
            data,
        }
    }

    /// Build an Opaque secret from plain-text values, encoding each one
    pub fn from_literals(metadata: ObjectMeta, literals: &[(String, String)]) -> Self {
        let data: BTreeMap<String, String> = literals
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect();
        let data = if data.is_empty() { None } else { Some(data) };
        Self::from_parts(metadata, SecretType::Opaque, data)
    }

    pub fn data_count(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }

    /// Decode one value. `None` when absent or not valid base64/UTF-8.
    pub fn decoded(&self, key: &str) -> Option<String> {
        let raw = self.data.as_ref()?.get(key)?;
        decode_value(raw)
    }

    /// Decoded size of each value, for `describe` output
    pub fn value_sizes(&self) -> Vec<(String, usize)> {
        self.data
            .iter()
            .flatten()
            .map(|(k, v)| {
                let len = BASE64.decode(v).map(|b| b.len()).unwrap_or(v.len());
                (k.clone(), len)
            })
            .collect()
    }
}

pub fn encode_value(plain: &str) -> String {
    BASE64.encode(plain.as_bytes())
}

pub fn decode_value(encoded: &str) -> Option<String> {
    BASE64
        .decode(encoded)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
}

impl Object for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn with_metadata(&self, metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    fn same_definition(&self, other: &Self) -> bool {
        self.secret_type == other.secret_type
            && self.data == other.data
            && self.metadata.labels == other.metadata.labels
            && self.metadata.annotations == other.metadata.annotations
    }
}
