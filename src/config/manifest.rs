//! Manifest parsing - YAML or JSON text to validated resources
//!
//! Pure functions, no I/O. Multi-document YAML (`---` separated) yields
//! one [`Manifest`] per non-empty document. JSON is accepted as the YAML
//! subset it is.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

use crate::cluster::configmap::ConfigMap;
use crate::cluster::pod::{Pod, PodSpec};
use crate::cluster::resources::{KeyValues, ObjectMeta, Resource, CORE_API_VERSION};
use crate::cluster::secret::{encode_value, Secret, SecretType, DOCKER_CONFIG_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY};

/// Annotation naming the service account of a token secret
pub const SERVICE_ACCOUNT_ANNOTATION: &str = "kubernetes.io/service-account.name";

/// Errors raised while parsing or validating a manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("error parsing manifest: {0}")]
    Parse(String),

    #[error("error validating data: {0} not set")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("no matches for kind \"{0}\" in version \"v1\"")]
    UnsupportedKind(String),

    #[error("no objects passed to create")]
    Empty,
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ManifestError {
    ManifestError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// A validated resource and the namespace its manifest named, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub resource: Resource,
    pub namespace: Option<String>,
}

// ============================================================================
// SBIO: Pure parsing functions (no I/O)
// ============================================================================

/// Parse a single-document manifest
pub fn parse_manifest(raw: &str) -> Result<Resource, ManifestError> {
    let mut manifests = parse_manifests(raw)?;
    if manifests.len() > 1 {
        return Err(ManifestError::Parse(format!(
            "expected one object, found {}",
            manifests.len()
        )));
    }
    Ok(manifests.remove(0).resource)
}

/// Parse every document in `raw`. Fails on the first invalid document.
pub fn parse_manifests(raw: &str) -> Result<Vec<Manifest>, ManifestError> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(raw) {
        let value = Value::deserialize(document).map_err(|e| ManifestError::Parse(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        manifests.push(validate_document(value)?);
    }
    if manifests.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(manifests)
}

fn dns_subdomain() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").expect("valid regex"))
}

fn dns_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"))
}

fn label_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-z0-9]([-a-z0-9.]*[a-z0-9])?/)?[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("valid regex")
    })
}

/// Validate a resource name (DNS-1123 subdomain)
pub fn validate_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty() || name.len() > 253 || !dns_subdomain().is_match(name) {
        return Err(invalid(
            "metadata.name",
            format!(
                "\"{}\": a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.'",
                name
            ),
        ));
    }
    Ok(())
}

/// Validate a namespace name (DNS-1123 label)
pub fn validate_namespace(namespace: &str) -> Result<(), ManifestError> {
    if namespace.is_empty() || namespace.len() > 63 || !dns_label().is_match(namespace) {
        return Err(invalid(
            "metadata.namespace",
            format!("\"{}\": a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-'", namespace),
        ));
    }
    Ok(())
}

/// Validate a label or annotation key (`[prefix/]name`)
pub fn validate_key(field: &str, key: &str) -> Result<(), ManifestError> {
    let name_len = key.rsplit('/').next().map(str::len).unwrap_or(0);
    if name_len > 63 || !label_key().is_match(key) {
        return Err(invalid(field, format!("\"{}\": invalid key", key)));
    }
    Ok(())
}

fn string_field(doc: &Value, field: &str) -> Result<String, ManifestError> {
    match doc.get(field) {
        None | Some(Value::Null) => Err(ManifestError::MissingField(field.to_string())),
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(invalid(field, "must be a non-empty string")),
    }
}

/// A map whose values must all be strings
fn string_map(value: Option<&Value>, field: &str) -> Result<Option<BTreeMap<String, String>>, ManifestError> {
    let mapping = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Mapping(m)) => m,
        Some(_) => return Err(invalid(field, "must be a map")),
    };
    let mut out = BTreeMap::new();
    for (k, v) in mapping {
        let key = k
            .as_str()
            .ok_or_else(|| invalid(field, "keys must be strings"))?;
        let val = v
            .as_str()
            .ok_or_else(|| invalid(format!("{}.{}", field, key), "value must be a string"))?;
        out.insert(key.to_string(), val.to_string());
    }
    Ok(Some(out))
}

fn metadata(doc: &Value) -> Result<(ObjectMeta, Option<String>), ManifestError> {
    let meta = match doc.get("metadata") {
        Some(m @ Value::Mapping(_)) => m,
        None | Some(Value::Null) => return Err(ManifestError::MissingField("metadata.name".to_string())),
        Some(_) => return Err(invalid("metadata", "must be a map")),
    };
    let name = string_field(meta, "name").map_err(|e| match e {
        ManifestError::MissingField(_) => ManifestError::MissingField("metadata.name".to_string()),
        other => other,
    })?;
    validate_name(&name)?;

    let namespace = match meta.get("namespace") {
        None | Some(Value::Null) => None,
        Some(Value::String(ns)) => {
            validate_namespace(ns)?;
            Some(ns.clone())
        }
        Some(_) => return Err(invalid("metadata.namespace", "must be a string")),
    };

    let labels: Option<KeyValues> = string_map(meta.get("labels"), "metadata.labels")?;
    for key in labels.iter().flat_map(|l| l.keys()) {
        validate_key("metadata.labels", key)?;
    }
    let annotations: Option<KeyValues> = string_map(meta.get("annotations"), "metadata.annotations")?;
    for key in annotations.iter().flat_map(|a| a.keys()) {
        validate_key("metadata.annotations", key)?;
    }

    let mut object_meta = ObjectMeta::new(
        name,
        namespace.clone().unwrap_or_else(|| crate::cluster::DEFAULT_NAMESPACE.to_string()),
    );
    object_meta.labels = labels.filter(|l| !l.is_empty());
    object_meta.annotations = annotations.filter(|a| !a.is_empty());
    Ok((object_meta, namespace))
}

fn validate_document(doc: Value) -> Result<Manifest, ManifestError> {
    if !doc.is_mapping() {
        return Err(ManifestError::Parse("expected an object".to_string()));
    }
    let api_version = string_field(&doc, "apiVersion");
    let kind = string_field(&doc, "kind");
    let (api_version, kind) = match (api_version, kind) {
        (Ok(a), Ok(k)) => (a, k),
        (Err(ManifestError::MissingField(_)), Err(ManifestError::MissingField(_))) => {
            return Err(ManifestError::MissingField("apiVersion, kind".to_string()))
        }
        (Err(e), _) | (_, Err(e)) => return Err(e),
    };

    if !matches!(kind.as_str(), "Pod" | "ConfigMap" | "Secret") {
        return Err(ManifestError::UnsupportedKind(kind));
    }
    if api_version != CORE_API_VERSION {
        return Err(invalid(
            "apiVersion",
            format!("\"{}\" is not a supported version for kind {}", api_version, kind),
        ));
    }

    let (meta, namespace) = metadata(&doc)?;
    let resource = match kind.as_str() {
        "Pod" => Resource::Pod(validate_pod(&doc, meta)?),
        "ConfigMap" => Resource::ConfigMap(validate_config_map(&doc, meta)?),
        _ => Resource::Secret(validate_secret(&doc, meta)?),
    };
    debug!(kind = %resource.kind(), name = %resource.metadata().name, "Validated manifest");
    Ok(Manifest { resource, namespace })
}

fn validate_pod(doc: &Value, meta: ObjectMeta) -> Result<Pod, ManifestError> {
    let spec_value = doc
        .get("spec")
        .ok_or_else(|| ManifestError::MissingField("spec".to_string()))?;
    let spec: PodSpec = serde_yaml::from_value(spec_value.clone())
        .map_err(|e| invalid("spec", e.to_string()))?;

    if spec.containers.is_empty() {
        return Err(invalid("spec.containers", "Required value"));
    }

    let mut seen = HashSet::new();
    let init = spec.init_containers.as_deref().unwrap_or(&[]);
    for (field, containers) in [("spec.initContainers", init), ("spec.containers", &spec.containers[..])] {
        for (i, c) in containers.iter().enumerate() {
            if c.name.is_empty() {
                return Err(invalid(format!("{}[{}].name", field, i), "Required value"));
            }
            if !dns_label().is_match(&c.name) {
                return Err(invalid(format!("{}[{}].name", field, i), format!("\"{}\": invalid container name", c.name)));
            }
            if !seen.insert(c.name.clone()) {
                return Err(invalid(format!("{}[{}].name", field, i), format!("Duplicate value: \"{}\"", c.name)));
            }
            if c.image.trim().is_empty() {
                return Err(invalid(format!("{}[{}].image", field, i), "Required value"));
            }
        }
    }

    let spec = PodSpec {
        init_containers: spec.init_containers.filter(|v| !v.is_empty()),
        containers: spec.containers,
    };
    Ok(Pod::from_parts(meta, spec))
}

fn validate_config_map(doc: &Value, meta: ObjectMeta) -> Result<ConfigMap, ManifestError> {
    let data = string_map(doc.get("data"), "data")?;
    for key in data.iter().flat_map(|d| d.keys()) {
        validate_data_key(key)?;
    }
    Ok(ConfigMap::from_parts(meta, data.filter(|d| !d.is_empty())))
}

fn validate_data_key(key: &str) -> Result<(), ManifestError> {
    let ok = !key.is_empty()
        && key.len() <= 253
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(invalid(format!("data[{}]", key), "a valid config key must consist of alphanumeric characters, '-', '_' or '.'"))
    }
}

fn validate_secret(doc: &Value, meta: ObjectMeta) -> Result<Secret, ManifestError> {
    let mut data = string_map(doc.get("data"), "data")?.unwrap_or_default();
    for (key, value) in &data {
        validate_data_key(key)?;
        if BASE64.decode(value).is_err() {
            return Err(invalid(format!("data[{}]", key), "illegal base64 data"));
        }
    }
    if let Some(plain) = string_map(doc.get("stringData"), "stringData")? {
        for (key, value) in plain {
            validate_data_key(&key)?;
            data.insert(key, encode_value(&value));
        }
    }

    let type_name = match doc.get("type") {
        None | Some(Value::Null) => "Opaque".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid("type", "must be a string")),
    };
    let data = if data.is_empty() { None } else { Some(data) };
    let mut secret_type = SecretType::from_legacy(&type_name, data.as_ref())
        .ok_or_else(|| invalid("type", format!("unsupported secret type \"{}\"", type_name)))?;

    match &mut secret_type {
        SecretType::Tls { .. } => {
            for key in [TLS_CERT_KEY, TLS_PRIVATE_KEY] {
                if !data.as_ref().is_some_and(|d| d.contains_key(key)) {
                    return Err(invalid(format!("data[{}]", key), "Required value"));
                }
            }
        }
        SecretType::DockerConfigJson { .. } => {
            if !data.as_ref().is_some_and(|d| d.contains_key(DOCKER_CONFIG_KEY)) {
                return Err(invalid(format!("data[{}]", DOCKER_CONFIG_KEY), "Required value"));
            }
        }
        SecretType::ServiceAccountToken {
            service_account_name,
        } => {
            *service_account_name = meta
                .annotations
                .as_ref()
                .and_then(|a| a.get(SERVICE_ACCOUNT_ANNOTATION))
                .cloned()
                .ok_or_else(|| {
                    invalid(
                        format!("metadata.annotations[{}]", SERVICE_ACCOUNT_ANNOTATION),
                        "Required value",
                    )
                })?;
        }
        SecretType::Opaque => {}
    }

    Ok(Secret::from_parts(meta, secret_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::resources::ResourceKind;

    const POD: &str = r#"
apiVersion: v1
kind: Pod
metadata:
  name: web
  namespace: prod
  labels:
    app: web
spec:
  initContainers:
    - name: setup
      image: busybox
      command: ["sh", "-c", "echo ok > /tmp/ok"]
  containers:
    - name: nginx
      image: nginx:1.25
      ports:
        - containerPort: 80
"#;

    #[test]
    fn test_parse_pod() {
        let manifests = parse_manifests(POD).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].namespace.as_deref(), Some("prod"));
        match &manifests[0].resource {
            Resource::Pod(pod) => {
                assert_eq!(pod.init_containers().len(), 1);
                assert_eq!(pod.metadata.label("app"), Some("web"));
                assert_eq!(pod.status.container_statuses.len(), 2);
            }
            other => panic!("expected a pod, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"cfg"},"data":{"a":"1"}}"#;
        let resource = parse_manifest(json).unwrap();
        assert_eq!(resource.kind(), ResourceKind::ConfigMap);
        assert_eq!(resource.metadata().namespace, "default");
    }

    #[test]
    fn test_multi_document() {
        let raw = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: b\nstringData:\n  token: abc\n";
        let manifests = parse_manifests(raw).unwrap();
        assert_eq!(manifests.len(), 2);
        match &manifests[1].resource {
            Resource::Secret(s) => assert_eq!(s.decoded("token").as_deref(), Some("abc")),
            _ => panic!("expected a secret"),
        }
        assert!(parse_manifest(raw).is_err());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            parse_manifest("metadata:\n  name: x\n").unwrap_err(),
            ManifestError::MissingField("apiVersion, kind".to_string())
        );
        assert_eq!(
            parse_manifest("apiVersion: v1\nkind: Pod\nspec: {}\n").unwrap_err(),
            ManifestError::MissingField("metadata.name".to_string())
        );
        assert_eq!(parse_manifest("").unwrap_err(), ManifestError::Empty);
    }

    #[test]
    fn test_unsupported_kind_and_version() {
        let err = parse_manifest("apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: x\n").unwrap_err();
        assert_eq!(err, ManifestError::UnsupportedKind("Deployment".to_string()));
        let err = parse_manifest("apiVersion: v2\nkind: Pod\nmetadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidValue { ref field, .. } if field == "apiVersion"));
    }

    #[test]
    fn test_pod_validation() {
        let no_containers = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: x\nspec:\n  containers: []\n";
        assert!(parse_manifest(no_containers).is_err());

        let dup = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: x\nspec:\n  initContainers:\n    - name: a\n      image: busybox\n  containers:\n    - name: a\n      image: nginx\n";
        let err = parse_manifest(dup).unwrap_err().to_string();
        assert!(err.contains("Duplicate value"));

        let bad_name = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: Web_1\nspec:\n  containers:\n    - name: a\n      image: nginx\n";
        assert!(parse_manifest(bad_name).is_err());
    }

    #[test]
    fn test_config_map_values_must_be_strings() {
        let raw = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\ndata:\n  port: 80\n";
        let err = parse_manifest(raw).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidValue { ref field, .. } if field == "data.port"));
    }

    #[test]
    fn test_secret_validation() {
        let bad_b64 = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\ndata:\n  k: '***'\n";
        assert!(parse_manifest(bad_b64).unwrap_err().to_string().contains("base64"));

        let tls_missing = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\ntype: kubernetes.io/tls\ndata:\n  tls.crt: Y2VydA==\n";
        assert!(parse_manifest(tls_missing).is_err());

        let tls = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\ntype: kubernetes.io/tls\ndata:\n  tls.crt: Y2VydA==\n  tls.key: a2V5\n";
        match parse_manifest(tls).unwrap() {
            Resource::Secret(s) => assert_eq!(
                s.secret_type,
                SecretType::Tls {
                    cert: "Y2VydA==".into(),
                    key: "a2V5".into()
                }
            ),
            _ => panic!("expected a secret"),
        }

        let unknown = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\ntype: example.com/custom\n";
        assert!(parse_manifest(unknown).is_err());
    }

    #[test]
    fn test_service_account_token_needs_annotation() {
        let raw = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: tok\n  annotations:\n    kubernetes.io/service-account.name: builder\ntype: kubernetes.io/service-account-token\n";
        match parse_manifest(raw).unwrap() {
            Resource::Secret(s) => assert_eq!(
                s.secret_type,
                SecretType::ServiceAccountToken {
                    service_account_name: "builder".into()
                }
            ),
            _ => panic!("expected a secret"),
        }
    }
}
