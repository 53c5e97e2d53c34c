//! ConfigMap resource - non-confidential key/value configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resources::{Object, ObjectMeta, ResourceKind, CORE_API_VERSION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMap {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind is always "ConfigMap"
    pub kind: String,

    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

impl ConfigMap {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::from_parts(ObjectMeta::new(name, namespace), None)
    }

    pub fn from_parts(metadata: ObjectMeta, data: Option<BTreeMap<String, String>>) -> Self {
        Self {
            api_version: CORE_API_VERSION.to_string(),
            kind: "ConfigMap".to_string(),
            metadata,
            data,
        }
    }

    pub fn with_data(mut self, data: BTreeMap<String, String>) -> Self {
        self.data = Some(data);
        self
    }

    /// Number of keys, as shown in the DATA column
    pub fn data_count(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.get(key)).map(String::as_str)
    }
}

impl Object for ConfigMap {
    const KIND: ResourceKind = ResourceKind::ConfigMap;

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
        self.data == other.data
            && self.metadata.labels == other.metadata.labels
            && self.metadata.annotations == other.metadata.annotations
    }
}
