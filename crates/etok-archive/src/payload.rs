//! Slugs wrapped as ConfigMap-shaped records.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::options::MAX_CONFIG_SIZE;

/// Key the slug is stored under in the record's binary data.
pub const DEFAULT_PAYLOAD_KEY: &str = "config.tar.gz";

#[derive(Clone, Debug)]
pub struct PayloadOptions {
    pub key: String,
    /// Record ceiling in bytes; `0` disables the check.
    pub max_record_size: u64,
    pub labels: BTreeMap<String, String>,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_PAYLOAD_KEY.to_owned(),
            max_record_size: MAX_CONFIG_SIZE,
            labels: BTreeMap::new(),
        }
    }
}

impl PayloadOptions {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn max_record_size(mut self, bytes: u64) -> Self {
        self.max_record_size = bytes;
        self
    }

    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }
}

/// Labels every record carries.
pub fn common_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_owned(), "etok".to_owned()),
        ("version".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
        ("component".to_owned(), "run".to_owned()),
    ])
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub name: String,
    pub namespace: String,
    pub key: String,
    pub labels: BTreeMap<String, String>,
    pub data: Vec<u8>,
}

impl Payload {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        data: Vec<u8>,
        options: &PayloadOptions,
    ) -> Result<Self> {
        let size = data.len() as u64;
        if options.max_record_size != 0 && size > options.max_record_size {
            return Err(Error::PayloadTooLarge {
                size,
                limit: options.max_record_size,
            });
        }

        let mut labels = common_labels();
        labels.extend(options.labels.clone());

        Ok(Self {
            name: name.into(),
            namespace: namespace.into(),
            key: options.key.clone(),
            labels,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A `v1/ConfigMap` JSON document with the slug base64-encoded.
    pub fn to_manifest(&self) -> Result<String> {
        let manifest = Manifest {
            api_version: "v1",
            kind: "ConfigMap",
            metadata: ObjectMeta {
                name: &self.name,
                namespace: &self.namespace,
                labels: &self.labels,
            },
            binary_data: BTreeMap::from([(self.key.as_str(), STANDARD.encode(&self.data))]),
        };
        Ok(serde_json::to_string_pretty(&manifest)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta<'a>,
    binary_data: BTreeMap<&'a str, String>,
}

#[derive(Serialize)]
struct ObjectMeta<'a> {
    name: &'a str,
    namespace: &'a str,
    labels: &'a BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_options_default() {
        let options = PayloadOptions::default();
        assert_eq!(options.key, "config.tar.gz");
        assert_eq!(options.max_record_size, 1024 * 1024);
        assert!(options.labels.is_empty());
    }

    #[test]
    fn payload_merges_labels() {
        let options = PayloadOptions::default()
            .label("workspace", "default")
            .label("command", "plan");
        let payload = Payload::new("run-12345", "default", vec![1, 2, 3], &options).unwrap();

        assert_eq!(payload.labels["app"], "etok");
        assert_eq!(payload.labels["component"], "run");
        assert_eq!(payload.labels["workspace"], "default");
        assert_eq!(payload.labels["command"], "plan");
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn payload_over_limit_fails() {
        let options = PayloadOptions::default().max_record_size(2);
        let err = Payload::new("run", "ns", vec![0; 3], &options).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { size: 3, limit: 2 }));
    }

    #[test]
    fn payload_limit_can_be_disabled() {
        let options = PayloadOptions::default().max_record_size(0);
        assert!(Payload::new("run", "ns", vec![0; 4096], &options).is_ok());
    }

    #[test]
    fn manifest_shape() {
        let options = PayloadOptions::default();
        let payload = Payload::new("run-1", "dev", b"slug".to_vec(), &options).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&payload.to_manifest().unwrap()).unwrap();

        assert_eq!(doc["apiVersion"], "v1");
        assert_eq!(doc["kind"], "ConfigMap");
        assert_eq!(doc["metadata"]["name"], "run-1");
        assert_eq!(doc["metadata"]["namespace"], "dev");
        assert_eq!(doc["metadata"]["labels"]["app"], "etok");
        assert_eq!(doc["binaryData"]["config.tar.gz"], "c2x1Zw==");
    }
}
