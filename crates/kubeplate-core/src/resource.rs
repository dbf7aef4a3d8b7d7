//! Rendered resource specifications

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::value::{Mapping, Value, lookup};

/// One rendered manifest, kept as a generic mapping
///
/// Conventionally carries `kind`, `apiVersion`, `metadata` and `spec`, but
/// nothing here requires them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSpec(Mapping);

impl ResourceSpec {
    pub fn new(mapping: Mapping) -> Self {
        Self(mapping)
    }

    /// Wrap a parsed document. Null becomes an empty spec; anything but a
    /// mapping is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(map) => Ok(Self(map)),
            other => Err(CoreError::UnexpectedType {
                expected: "mapping",
                found: other.type_name(),
            }),
        }
    }

    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_value(Value::from_yaml_str(yaml)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.0, key)
    }

    pub fn kind(&self) -> Option<&str> {
        self.get("kind").and_then(Value::as_str)
    }

    pub fn api_version(&self) -> Option<&str> {
        self.get("apiVersion").and_then(Value::as_str)
    }

    pub fn metadata(&self) -> Option<&Mapping> {
        self.get("metadata").and_then(Value::as_mapping)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata_str("name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace")
    }

    /// `metadata.labels`, with scalar values rendered as strings
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata()
            .and_then(|meta| lookup(meta, "labels"))
            .and_then(Value::as_mapping)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| Some((k.to_scalar_string()?, v.to_scalar_string()?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parsed `apiVersion`, if present
    pub fn group_version(&self) -> Option<Result<GroupVersion>> {
        self.api_version().map(GroupVersion::parse)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_mapping(self) -> Mapping {
        self.0
    }

    /// Serialize the manifest back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|meta| lookup(meta, key))
            .and_then(Value::as_str)
    }
}

impl From<Mapping> for ResourceSpec {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

/// A parsed `apiVersion`: `v1` is the core group, `apps/v1` is group `apps`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn parse(api_version: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidApiVersion {
            api_version: api_version.to_string(),
        };

        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) if !group.is_empty() && !version.contains('/') => {
                (group, version)
            }
            Some(_) => return Err(invalid()),
            None => ("", api_version),
        };

        if version.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            group: group.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}
