//! Generic value tree shared by values documents and rendered manifests
//!
//! YAML mappings may use any scalar as a key (`1: one`, `true: yes`, `~: null`),
//! so a `Mapping` is keyed by `Value` rather than by `String`. Numbers are
//! normalised on the way in: a non-negative integer that fits in `i64` is
//! always stored as `Number::Int`, whichever format produced it, so trees
//! read from YAML, JSON and TOML compare equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::{CoreError, Result};

/// Ordered mapping with arbitrary scalar keys
pub type Mapping = IndexMap<Value, Value>;

/// A numeric scalar
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    /// Only used for integers above `i64::MAX`
    UInt(u64),
    Float(f64),
}

impl Number {
    /// Build a number from an unsigned integer, preferring `Int`
    pub fn from_u64(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(n) => Number::Int(n),
            Err(_) => Number::UInt(n),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(n) => Some(n),
            Number::UInt(_) => None,
            Number::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(n) => n as f64,
            Number::UInt(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::UInt(a), Number::UInt(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match *self {
            Number::Int(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Number::UInt(n) => {
                1u8.hash(state);
                n.hash(state);
            }
            Number::Float(f) => {
                2u8.hash(state);
                // 0.0 == -0.0 and every NaN equals every other NaN
                let bits = if f == 0.0 {
                    0
                } else if f.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    f.to_bits()
                };
                bits.hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::UInt(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

/// A dynamically typed value: the tagged union behind values trees and manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Empty mapping
    pub fn mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    /// Human readable name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a string key in a mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| lookup(map, key))
    }

    /// Scalar rendered as plain text; `None` for null and collections
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
        }
    }

    // =========================================================================
    // Format conversions
    // =========================================================================

    /// Parse a YAML document. Blank or comment-only input is `Null`.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        if is_blank_yaml(input) {
            return Ok(Value::Null);
        }
        Ok(serde_yaml::from_str(input)?)
    }

    /// Parse a YAML document whose root must be a mapping
    pub fn from_yaml_mapping(input: &str) -> Result<Mapping> {
        into_mapping(Self::from_yaml_str(input)?)
    }

    /// Parse a YAML document whose root must be a sequence
    pub fn from_yaml_sequence(input: &str) -> Result<Vec<Value>> {
        into_sequence(Self::from_yaml_str(input)?)
    }

    /// Serialize to YAML (with the trailing newline)
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a JSON document
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse a JSON document whose root must be an object
    pub fn from_json_mapping(input: &str) -> Result<Mapping> {
        into_mapping(Self::from_json_str(input)?)
    }

    /// Parse a JSON document whose root must be an array
    pub fn from_json_sequence(input: &str) -> Result<Vec<Value>> {
        into_sequence(Self::from_json_str(input)?)
    }

    /// Serialize to compact JSON. Fails on keys JSON cannot represent.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to TOML. The root must be a mapping with string keys.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Look up a string key in a mapping
pub fn lookup<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(&Value::String(key.to_string()))
}

fn into_mapping(value: Value) -> Result<Mapping> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        other => Err(CoreError::UnexpectedType {
            expected: "mapping",
            found: other.type_name(),
        }),
    }
}

fn into_sequence(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => Ok(seq),
        other => Err(CoreError::UnexpectedType {
            expected: "sequence",
            found: other.type_name(),
        }),
    }
}

/// True when a YAML text holds nothing but whitespace, comments and markers
fn is_blank_yaml(input: &str) -> bool {
    input.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "..."
    })
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => n.hash(state),
            Value::String(s) => s.hash(state),
            Value::Sequence(seq) => seq.hash(state),
            // mapping equality ignores order, so only the length is hashed
            Value::Mapping(map) => map.len().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Sequence(_) | Value::Mapping(_) => match serde_json::to_string(self) {
                Ok(json) => f.write_str(&json),
                Err(_) => write!(f, "<{}>", self.type_name()),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(Number::Int(n)) => serializer.serialize_i64(*n),
            Value::Number(Number::UInt(n)) => serializer.serialize_u64(*n),
            Value::Number(Number::Float(n)) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(seq) => {
                let mut out = serializer.serialize_seq(Some(seq.len()))?;
                for item in seq {
                    out.serialize_element(item)?;
                }
                out.end()
            }
            Value::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any YAML, JSON or TOML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(Number::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(Number::from_u64(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Number(Number::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
        let mut seq = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(item) = access.next_element()? {
            seq.push(item);
        }
        Ok(Value::Sequence(seq))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<Value, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Mapping(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::Int(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::Int(v.into()))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(Number::from_u64(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::Float(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}

impl From<Mapping> for Value {
    fn from(v: Mapping) -> Self {
        Value::Mapping(v)
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_non_string_keys() {
        let value = Value::from_yaml_str("1: one\ntrue: yes\nname: x\n").unwrap();
        let map = value.as_mapping().unwrap();

        assert_eq!(map.get(&Value::from(1)), Some(&Value::from("one")));
        assert_eq!(map.get(&Value::from(true)), Some(&Value::from("yes")));
        assert_eq!(value.get("name"), Some(&Value::from("x")));
    }

    #[test]
    fn test_blank_yaml_is_null() {
        assert_eq!(Value::from_yaml_str("").unwrap(), Value::Null);
        assert_eq!(Value::from_yaml_str("  \n\n").unwrap(), Value::Null);
        assert_eq!(Value::from_yaml_str("# only a comment\n").unwrap(), Value::Null);
    }

    #[test]
    fn test_numbers_normalised_across_formats() {
        let from_yaml = Value::from_yaml_str("port: 8080\nratio: 0.5").unwrap();
        let from_json = Value::from_json_str(r#"{"port": 8080, "ratio": 0.5}"#).unwrap();
        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.get("port").and_then(Value::as_i64), Some(8080));
    }

    #[test]
    fn test_mapping_equality_ignores_order() {
        let a = Value::from_yaml_str("a: 1\nb: 2").unwrap();
        let b = Value::from_json_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let original = Value::from_yaml_str(
            r#"
name: web
replicas: 3
enabled: true
ratio: 1.5
ports: [80, 443]
nothing: ~
nested:
  key: value
"#,
        )
        .unwrap();

        let text = original.to_yaml_string().unwrap();
        assert_eq!(Value::from_yaml_str(&text).unwrap(), original);
    }

    #[test]
    fn test_json_roundtrip() {
        let original: Value = [("a", Value::from("b")), ("n", Value::from(-4))]
            .into_iter()
            .collect();

        let text = original.to_json_string().unwrap();
        assert_eq!(text, r#"{"a":"b","n":-4}"#);
        assert_eq!(Value::from_json_str(&text).unwrap(), original);
    }

    #[test]
    fn test_json_rejects_sequence_keys() {
        let mut map = Mapping::new();
        map.insert(Value::Sequence(vec![Value::from(1)]), Value::from("x"));
        assert!(Value::Mapping(map).to_json_string().is_err());
    }

    #[test]
    fn test_toml_output() {
        let value: Value = [("a", "b")].into_iter().collect();
        assert_eq!(value.to_toml_string().unwrap(), "a = \"b\"\n");
    }

    #[test]
    fn test_toml_requires_table() {
        assert!(Value::from("scalar").to_toml_string().is_err());
    }

    #[test]
    fn test_from_yaml_mapping_rejects_sequence() {
        let err = Value::from_yaml_mapping("- a\n- b").unwrap_err();
        assert!(err.to_string().contains("expected mapping"));
    }

    #[test]
    fn test_from_json_sequence() {
        let seq = Value::from_json_sequence(r#"[1, "two"]"#).unwrap();
        assert_eq!(seq, vec![Value::from(1), Value::from("two")]);
    }

    #[test]
    fn test_large_unsigned_stays_unsigned() {
        let value = Value::from_json_str("18446744073709551615").unwrap();
        assert_eq!(value, Value::Number(Number::UInt(u64::MAX)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("x").to_string(), "x");
        assert_eq!(Value::from(3).to_string(), "3");
        let seq = Value::Sequence(vec![Value::from(1), Value::from(2)]);
        assert_eq!(seq.to_string(), "[1,2]");
    }
}
