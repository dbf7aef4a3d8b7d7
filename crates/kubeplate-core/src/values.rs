//! The values tree templates see as `Values`
//!
//! Several values files and `--set` overrides are layered with [`Values::merge`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::value::{Mapping, Value, lookup};

/// Key under which the target namespace is injected before rendering
pub const NAMESPACE_KEY: &str = "namespace";

/// Values tree: the root mapping of a values document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub Mapping);

impl Values {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    /// Read and parse a YAML values file. Nothing is cached.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io(path.display().to_string(), e))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "loaded values file");
        Self::from_yaml(&content)
    }

    /// An empty or comment-only document is an empty tree
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_value(Value::from_yaml_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(Value::from_json_str(json)?)
    }

    /// Wrap a value tree, which must be a mapping (or null)
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Mapping(map) => Ok(Self(map)),
            other => Err(CoreError::InvalidValues {
                message: format!("root must be a mapping, found {}", other.type_name()),
            }),
        }
    }

    /// Layer `overlay` on top. Mappings merge key by key; any other value,
    /// sequences included, is replaced wholesale.
    pub fn merge(&mut self, overlay: &Values) {
        merge_mappings(&mut self.0, &overlay.0);
    }

    /// Insert a top-level key, replacing any previous value
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Inject the runtime namespace under [`NAMESPACE_KEY`]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.insert(NAMESPACE_KEY, namespace);
        self
    }

    /// Assign at a dotted path such as `image.tag`, creating mappings on the way
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::ValuesMerge {
                message: format!("invalid key path '{}'", path),
            });
        }
        set_nested(&mut self.0, &parts, value);
        Ok(())
    }

    /// Lookup by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = lookup(&self.0, parts.next()?)?;
        parts.try_fold(first, |current, part| current.get(part))
    }

    pub fn inner(&self) -> &Mapping {
        &self.0
    }

    pub fn into_inner(self) -> Mapping {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn merge_mappings(base: &mut Mapping, overlay: &Mapping) {
    for (key, overlay_value) in overlay {
        match base.get_mut(key) {
            Some(base_value) => deep_merge(base_value, overlay_value),
            None => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            merge_mappings(base_map, overlay_map);
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn set_nested(map: &mut Mapping, path: &[&str], new_value: Value) {
    let Some((key, remaining)) = path.split_first() else {
        return;
    };
    let key = Value::from(*key);

    if remaining.is_empty() {
        map.insert(key, new_value);
        return;
    }

    let entry = map.entry(key).or_insert_with(Value::mapping);
    if !matches!(entry, Value::Mapping(_)) {
        *entry = Value::mapping();
    }
    if let Value::Mapping(child) = entry {
        set_nested(child, remaining, new_value);
    }
}

/// Overrides given as `path=value`, applied in order
pub fn parse_set_values(assignments: &[String]) -> Result<Values> {
    let mut values = Values::new();

    for assignment in assignments {
        let Some((key, val)) = assignment.split_once('=') else {
            return Err(CoreError::ValuesMerge {
                message: format!("malformed override '{}', expected path=value", assignment),
            });
        };

        // Scalars follow YAML typing; brackets and braces are parsed as flow collections
        let value = if val.is_empty() {
            Value::from("")
        } else {
            match Value::from_yaml_str(val) {
                Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => v,
                Ok(v @ (Value::Sequence(_) | Value::Mapping(_)))
                    if val.starts_with('[') || val.starts_with('{') =>
                {
                    v
                }
                _ => Value::from(val),
            }
        };

        values.set(key, value)?;
    }

    Ok(values)
}
