//! Serialization converters available to templates
//!
//! These never abort a render. A value that cannot be encoded becomes an
//! empty string; text that cannot be decoded becomes a mapping holding only
//! an `Error` key, or a one-element list holding the error message.
//!
//! Decoding goes through [`kubeplate_core::Value`], so mappings keep
//! non-string keys (`1: one`) and their source order.

use kubeplate_core::Value as TreeValue;
use minijinja::Value;

/// Key of the mapping returned when decoding fails
pub const ERROR_KEY: &str = "Error";

/// Encode as YAML without the trailing newline
///
/// Usage: {{ toYaml(Values.resources) }} or {{ Values.resources | toYaml }}
pub fn to_yaml(value: Value) -> String {
    match serde_yaml::to_string(&value) {
        Ok(yaml) => {
            let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
            yaml.strip_suffix('\n').unwrap_or(yaml).to_string()
        }
        Err(e) => {
            tracing::debug!(error = %e, "toYaml failed");
            String::new()
        }
    }
}

/// Decode a YAML mapping
///
/// Usage: {{ fromYaml(Files().Get("defaults.yaml")).replicas }}
pub fn from_yaml(text: String) -> Value {
    decode_mapping(TreeValue::from_yaml_mapping(&text))
}

/// Decode a YAML sequence
pub fn from_yaml_array(text: String) -> Value {
    decode_sequence(TreeValue::from_yaml_sequence(&text))
}

/// Encode as compact JSON
pub fn to_json(value: Value) -> String {
    serde_json::to_string(&value).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "toJson failed");
        String::new()
    })
}

/// Decode a JSON object
pub fn from_json(text: String) -> Value {
    decode_mapping(TreeValue::from_json_mapping(&text))
}

/// Decode a JSON array
pub fn from_json_array(text: String) -> Value {
    decode_sequence(TreeValue::from_json_sequence(&text))
}

/// Encode as a TOML document, trailing newline included
///
/// Only mappings with string keys can be encoded.
pub fn to_toml(value: Value) -> String {
    toml::to_string(&value).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "toToml failed");
        String::new()
    })
}

fn decode_mapping(result: kubeplate_core::Result<kubeplate_core::Mapping>) -> Value {
    match result {
        Ok(map) => Value::from_serialize(TreeValue::Mapping(map)),
        Err(e) => Value::from_iter([(ERROR_KEY, e.to_string())]),
    }
}

fn decode_sequence(result: kubeplate_core::Result<Vec<TreeValue>>) -> Value {
    match result {
        Ok(seq) => Value::from_serialize(TreeValue::Sequence(seq)),
        Err(e) => Value::from(vec![Value::from(e.to_string())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::from_iter(pairs.iter().map(|(k, v)| (*k, v.clone())))
    }

    #[test]
    fn test_to_yaml_trims_newline() {
        let value = map(&[("a", Value::from("b")), ("n", Value::from(1))]);
        assert_eq!(to_yaml(value), "a: b\nn: 1");
        assert_eq!(to_yaml(Value::from("plain")), "plain");
    }

    #[test]
    fn test_from_yaml() {
        let value = from_yaml("image:\n  tag: v1\nreplicas: 2\n".to_string());
        let image = value.get_attr("image").unwrap();
        assert_eq!(image.get_attr("tag").unwrap().as_str(), Some("v1"));
        assert_eq!(value.get_attr("replicas").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_from_yaml_error_mapping() {
        let value = from_yaml("not: [valid".to_string());
        let keys: Vec<Value> = value.try_iter().unwrap().collect();
        assert_eq!(keys, vec![Value::from(ERROR_KEY)]);
        let message = value.get_attr(ERROR_KEY).unwrap();
        assert!(!message.as_str().unwrap().is_empty());
    }

    #[test]
    fn test_from_yaml_non_mapping_is_error() {
        let value = from_yaml("- a\n- b".to_string());
        assert!(!value.get_attr(ERROR_KEY).unwrap().is_undefined());
    }

    #[test]
    fn test_from_yaml_empty_is_empty_mapping() {
        let value = from_yaml(String::new());
        assert_eq!(value.len(), Some(0));
    }

    #[test]
    fn test_from_yaml_array() {
        let value = from_yaml_array("- a\n- 2".to_string());
        assert_eq!(value.len(), Some(2));

        let err = from_yaml_array("a: b".to_string());
        assert_eq!(err.len(), Some(1));
        assert!(err.get_item_by_index(0).unwrap().as_str().unwrap().contains("sequence"));
    }

    #[test]
    fn test_to_json() {
        let value = map(&[("a", Value::from(vec![Value::from(1), Value::from(2)]))]);
        assert_eq!(to_json(value), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_from_json() {
        let value = from_json(r#"{"a": {"b": true}}"#.to_string());
        let inner = value.get_attr("a").unwrap();
        assert!(inner.get_attr("b").unwrap().is_true());

        let err = from_json("{oops".to_string());
        assert!(err.get_attr(ERROR_KEY).unwrap().as_str().is_some());
    }

    #[test]
    fn test_from_json_array() {
        let value = from_json_array("[1, \"x\"]".to_string());
        assert_eq!(value.len(), Some(2));

        let err = from_json_array("{}".to_string());
        assert_eq!(err.len(), Some(1));
    }

    #[test]
    fn test_to_toml() {
        let value = map(&[("a", Value::from("b"))]);
        assert_eq!(to_toml(value), "a = \"b\"\n");
    }

    #[test]
    fn test_to_toml_failure_is_empty() {
        assert_eq!(to_toml(Value::from(vec![Value::from(1)])), "");
    }

    #[test]
    fn test_non_string_keys_survive_yaml_roundtrip() {
        let value = from_yaml("1: one\ntrue: t\n".to_string());
        assert_eq!(to_yaml(value), "1: one\ntrue: t");
    }
}
