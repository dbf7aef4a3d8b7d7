//! Template filters
//!
//! Text and collection helpers used in manifests. Most are also exposed as
//! functions by the registry in [`crate::functions`], so both
//! `{{ Values.name | quote }}` and `{{ quote(Values.name) }}` work.

use std::fmt::Write as _;

use base64::Engine as _;
use minijinja::value::ValueKind;
use minijinja::{Environment, Error, ErrorKind, Output, State, Value};

use crate::convert;

/// Every filter registered by [`register_filters`]
pub const FILTER_NAMES: &[&str] = &[
    "toYaml",
    "fromYaml",
    "fromYamlArray",
    "toJson",
    "fromJson",
    "fromJsonArray",
    "toToml",
    "b64enc",
    "b64dec",
    "quote",
    "squote",
    "indent",
    "nindent",
    "required",
    "empty",
    "hasKey",
    "keys",
    "merge",
    "sha256sum",
    "trunc",
    "trimPrefix",
    "trimSuffix",
    "snakecase",
    "kebabcase",
    "tostrings",
];

/// Register the filters on `env`, replacing MiniJinja builtins of the same name
pub fn register_filters(env: &mut Environment<'_>) {
    env.add_filter("toYaml", convert::to_yaml);
    env.add_filter("fromYaml", convert::from_yaml);
    env.add_filter("fromYamlArray", convert::from_yaml_array);
    env.add_filter("toJson", convert::to_json);
    env.add_filter("fromJson", convert::from_json);
    env.add_filter("fromJsonArray", convert::from_json_array);
    env.add_filter("toToml", convert::to_toml);
    env.add_filter("b64enc", b64enc);
    env.add_filter("b64dec", b64dec);
    env.add_filter("quote", quote);
    env.add_filter("squote", squote);
    env.add_filter("indent", indent);
    env.add_filter("nindent", nindent);
    env.add_filter("required", required);
    env.add_filter("empty", empty);
    env.add_filter("hasKey", has_key);
    env.add_filter("keys", keys);
    env.add_filter("merge", merge);
    env.add_filter("sha256sum", sha256sum);
    env.add_filter("trunc", trunc);
    env.add_filter("trimPrefix", trim_prefix);
    env.add_filter("trimSuffix", trim_suffix);
    env.add_filter("snakecase", snakecase);
    env.add_filter("kebabcase", kebabcase);
    env.add_filter("tostrings", tostrings);
}

/// String form of a value: strings as-is, booleans as `true`/`false`,
/// everything else displayed
pub(crate) fn text_of(value: &Value) -> String {
    match value.kind() {
        ValueKind::String => value.as_str().unwrap_or_default().to_string(),
        ValueKind::None | ValueKind::Undefined => String::new(),
        ValueKind::Bool => bool_text(value).to_string(),
        _ => value.to_string(),
    }
}

fn bool_text(value: &Value) -> &'static str {
    if value.is_true() { "true" } else { "false" }
}

/// Output formatter: `{{ flag }}` prints `true`, not MiniJinja's `True`
pub fn format_output(out: &mut Output, state: &State, value: &Value) -> Result<(), Error> {
    if value.kind() == ValueKind::Bool {
        out.write_str(bool_text(value))?;
        Ok(())
    } else {
        minijinja::escape_formatter(out, state, value)
    }
}

/// Base64 encode a string or byte value
///
/// Usage: {{ Files().GetBytes("cert.pem") | b64enc }}
pub fn b64enc(value: Value) -> String {
    let engine = &base64::engine::general_purpose::STANDARD;
    match value.as_bytes() {
        Some(bytes) if value.kind() == ValueKind::Bytes => engine.encode(bytes),
        _ => engine.encode(text_of(&value)),
    }
}

/// Decode standard base64 into UTF-8 text
pub fn b64dec(value: String) -> Result<String, Error> {
    let invalid = |what: &str, e: &dyn std::fmt::Display| {
        Error::new(ErrorKind::InvalidOperation, format!("b64dec: {}: {}", what, e))
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| invalid("not base64", &e))?;
    String::from_utf8(bytes).map_err(|e| invalid("not UTF-8", &e))
}

/// Double-quoted, with backslashes and `"` escaped
///
/// Usage: {{ Values.name | quote }}
pub fn quote(value: Value) -> String {
    let text = text_of(&value);
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Single-quoted YAML style, `'` doubled
pub fn squote(value: Value) -> String {
    format!("'{}'", text_of(&value).replace('\'', "''"))
}

/// Indent every non-empty line
///
/// Usage: {{ toYaml(Values.labels) | indent(4) }}
pub fn indent(value: Value, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text_of(&value)
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like `indent`, preceded by a newline
///
/// Usage:
/// ```jinja
/// metadata:
///   labels: {{- toYaml(Values.labels) | nindent(4) }}
/// ```
pub fn nindent(value: Value, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Fail the render when a value is missing or empty
///
/// Usage: {{ Values.image | required("image is required") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);

    if missing {
        let msg = message.unwrap_or_else(|| "required value is missing".to_string());
        Err(Error::new(ErrorKind::InvalidOperation, msg))
    } else {
        Ok(value)
    }
}

/// True for undefined, none, empty strings, zero, false and empty collections
///
/// Usage: {% if Values.tolerations | empty %}
pub fn empty(value: Value) -> bool {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => true,
        ValueKind::Bool | ValueKind::Number => !value.is_true(),
        _ => value.len().is_some_and(|len| len == 0),
    }
}

/// Check if a mapping has a key
///
/// Usage: {% if Values.ingress | hasKey("tls") %}
pub fn has_key(value: Value, key: String) -> bool {
    value.kind() == ValueKind::Map
        && value.get_attr(&key).is_ok_and(|v| !v.is_undefined())
}

/// Keys of a mapping, in order
pub fn keys(value: Value) -> Result<Vec<Value>, Error> {
    if value.kind() != ValueKind::Map {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "cannot get keys from non-mapping value",
        ));
    }
    Ok(value.try_iter()?.collect())
}

/// Deep merge two mappings, the argument winning on conflicts
///
/// Usage: {{ Values.defaults | merge(Values.overrides) | toYaml }}
pub fn merge(base: Value, overlay: Value) -> Value {
    if base.kind() != ValueKind::Map || overlay.kind() != ValueKind::Map {
        return overlay;
    }

    let mut merged: Vec<(Value, Value)> = entries(&base);
    for (key, overlay_value) in entries(&overlay) {
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = merge(existing.clone(), overlay_value),
            None => merged.push((key, overlay_value)),
        }
    }

    Value::from_iter(merged)
}

/// `(key, value)` pairs of a mapping
pub(crate) fn entries(map: &Value) -> Vec<(Value, Value)> {
    let Ok(keys) = map.try_iter() else {
        return Vec::new();
    };
    keys.filter_map(|key| {
        let value = map.get_item(&key).ok()?;
        Some((key, value))
    })
    .collect()
}

/// SHA256 hash of a string, hex encoded
///
/// Usage: {{ Files().Get("app.conf") | sha256sum }}
pub fn sha256sum(value: Value) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text_of(&value).as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Truncate a string to a maximum number of characters
///
/// Usage: {{ name | trunc(63) }}
pub fn trunc(value: Value, length: usize) -> String {
    text_of(&value).chars().take(length).collect()
}

pub fn trim_prefix(value: Value, prefix: String) -> String {
    let text = text_of(&value);
    match text.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.to_owned(),
        None => text,
    }
}

pub fn trim_suffix(value: Value, suffix: String) -> String {
    let text = text_of(&value);
    match text.strip_suffix(suffix.as_str()) {
        Some(rest) => rest.to_owned(),
        None => text,
    }
}

/// `myAppName` and `my-app name` both become `my_app_name`
///
/// Runs of capitals stay together, so `HTTPServer` becomes `httpserver`.
pub fn snakecase(value: String) -> String {
    words_joined(&value, '_')
}

/// As `snakecase`, joined with `-`
pub fn kebabcase(value: String) -> String {
    words_joined(&value, '-')
}

fn words_joined(value: &str, sep: char) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut after_upper = false;

    for c in value.chars() {
        match c {
            '-' | ' ' | '_' => {
                out.push(sep);
                after_upper = false;
            }
            c if c.is_uppercase() => {
                if !out.is_empty() && !after_upper {
                    out.push(sep);
                }
                out.extend(c.to_lowercase());
                after_upper = true;
            }
            c => {
                out.push(c);
                after_upper = false;
            }
        }
    }

    out
}

/// Convert each element of a list to a string
///
/// Usage: {{ Values.ports | tostrings | join(",") }}
pub fn tostrings(value: Value) -> Result<Vec<String>, Error> {
    Ok(value.try_iter()?.map(|v| text_of(&v)).collect())
}
