//! Function registry: global functions available in templates
//!
//! [`base_functions`] is the general purpose library, including the two
//! environment accessors `env` and `expandenv`. [`build_functions`] derives
//! the set actually given to templates: it removes the environment accessors
//! and adds the serialization converters, `Files()` and `include`.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use kubeplate_core::Files;
use minijinja::value::{Rest, ValueKind};
use minijinja::{Error, ErrorKind, State, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::EngineConfig;
use crate::convert;
use crate::files_object::FilesObject;
use crate::filters::{self, entries, text_of};
use crate::session::{RenderSession, SESSION_KEY};

/// Function name to callable template value
pub type FunctionMap = BTreeMap<String, Value>;

/// Functions removed from the base library before templates see it
pub const SANDBOXED_FUNCTIONS: &[&str] = &["env", "expandenv"];

/// Every function registered by [`build_functions`]
pub const FUNCTION_NAMES: &[&str] = &[
    "Files",
    "b64dec",
    "b64enc",
    "coalesce",
    "default",
    "dict",
    "dig",
    "empty",
    "fail",
    "fromJson",
    "fromJsonArray",
    "fromYaml",
    "fromYamlArray",
    "get",
    "hasKey",
    "include",
    "indent",
    "keys",
    "list",
    "lower",
    "merge",
    "nindent",
    "now",
    "printf",
    "quote",
    "set",
    "sha256sum",
    "squote",
    "ternary",
    "toJson",
    "toToml",
    "toYaml",
    "tofloat",
    "toint",
    "tostring",
    "trim",
    "trimPrefix",
    "trimSuffix",
    "trunc",
    "unset",
    "upper",
];

/// The general purpose library, environment accessors included
pub fn base_functions() -> FunctionMap {
    let mut map = FunctionMap::new();
    let mut add = |name: &str, f: Value| {
        map.insert(name.to_string(), f);
    };

    add("dict", Value::from_function(dict));
    add("list", Value::from_function(list));
    add("get", Value::from_function(get));
    add("set", Value::from_function(set));
    add("unset", Value::from_function(unset));
    add("dig", Value::from_function(dig));
    add("coalesce", Value::from_function(coalesce));
    add("ternary", Value::from_function(ternary));
    add("default", Value::from_function(default));
    add("empty", Value::from_function(filters::empty));
    add("fail", Value::from_function(fail));
    add("tostring", Value::from_function(tostring));
    add("toint", Value::from_function(toint));
    add("tofloat", Value::from_function(tofloat));
    add("printf", Value::from_function(printf));
    add("now", Value::from_function(now));
    add("b64enc", Value::from_function(filters::b64enc));
    add("b64dec", Value::from_function(filters::b64dec));
    add("sha256sum", Value::from_function(filters::sha256sum));
    add("quote", Value::from_function(filters::quote));
    add("squote", Value::from_function(filters::squote));
    add("indent", Value::from_function(filters::indent));
    add("nindent", Value::from_function(filters::nindent));
    add("trim", Value::from_function(trim));
    add("upper", Value::from_function(upper));
    add("lower", Value::from_function(lower));
    add("trunc", Value::from_function(filters::trunc));
    add("trimPrefix", Value::from_function(filters::trim_prefix));
    add("trimSuffix", Value::from_function(filters::trim_suffix));
    add("hasKey", Value::from_function(filters::has_key));
    add("keys", Value::from_function(filters::keys));
    add("merge", Value::from_function(filters::merge));
    add("env", Value::from_function(env));
    add("expandenv", Value::from_function(expandenv));

    map
}

/// The sandboxed function set given to templates
///
/// `Files()` is bound to `config.static_dir`; without one every read fails.
pub fn build_functions(config: &EngineConfig) -> FunctionMap {
    let mut map = base_functions();
    for name in SANDBOXED_FUNCTIONS {
        map.remove(*name);
    }

    let converters: [(&str, Value); 7] = [
        ("toYaml", Value::from_function(convert::to_yaml)),
        ("fromYaml", Value::from_function(convert::from_yaml)),
        ("fromYamlArray", Value::from_function(convert::from_yaml_array)),
        ("toJson", Value::from_function(convert::to_json)),
        ("fromJson", Value::from_function(convert::from_json)),
        ("fromJsonArray", Value::from_function(convert::from_json_array)),
        ("toToml", Value::from_function(convert::to_toml)),
    ];
    map.extend(converters.into_iter().map(|(name, f)| (name.to_string(), f)));

    let files = match &config.static_dir {
        Some(dir) => Files::in_dir(dir),
        None => Files::none(),
    };
    let files = Value::from_object(FilesObject::new(files));
    map.insert(
        "Files".to_string(),
        Value::from_function(move || files.clone()),
    );

    map.insert("include".to_string(), Value::from_function(include));

    map
}

/// Render a named template inline
///
/// Usage: {{ include("labels", Values) | nindent(4) }}
///
/// The sub-template sees the keys of `data` as variables when `data` is a
/// mapping, and `data` itself as `this`. Once a name is active more times
/// than the configured depth allows, further calls render nothing.
pub fn include(state: &State, name: String, data: Option<Value>) -> Result<String, Error> {
    let session = RenderSession::current(state)?;
    let Some(_guard) = session.enter(&name) else {
        tracing::debug!(
            template = %name,
            limit = session.max_depth(),
            "include depth limit reached, rendering nothing"
        );
        return Ok(String::new());
    };

    let template = state.env().get_template(&name)?;
    let data = data.unwrap_or_else(|| Value::from(()));

    let mut context = if data.kind() == ValueKind::Map {
        entries(&data)
    } else {
        Vec::new()
    };
    context.push((Value::from("this"), data));
    // Last, so a data key of the same name cannot replace it
    context.push((Value::from(SESSION_KEY), session.to_value()));

    template.render(Value::from_iter(context))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn expect_map(function: &str, value: &Value) -> Result<(), Error> {
    match value.kind() {
        ValueKind::Map => Ok(()),
        other => Err(invalid(format!("{function}: expected a dict, got {other}"))),
    }
}

/// Abort the render with `message`
///
/// Usage: {{ fail("image.tag must be set") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(invalid(message))
}

/// Dict built from alternating keys and values; later keys win
///
/// Usage: {{ dict("name", Values.name, "port", 80) }}
pub fn dict(args: Rest<Value>) -> Result<Value, Error> {
    if args.len() % 2 == 1 {
        return Err(invalid(format!(
            "dict: expected key/value pairs, got {} arguments",
            args.len()
        )));
    }

    let mut map = IndexMap::with_capacity(args.len() / 2);
    let mut args = args.0.into_iter();
    while let (Some(key), Some(value)) = (args.next(), args.next()) {
        map.insert(text_of(&key), value);
    }
    Ok(Value::from_iter(map))
}

pub fn list(args: Rest<Value>) -> Value {
    Value::from(args.0)
}

/// `obj[key]`, or `default` (undefined when omitted) if missing
///
/// Usage: {{ get(Values.ports, "http", 80) }}
pub fn get(obj: Value, key: String, default: Option<Value>) -> Value {
    obj.get_attr(&key)
        .ok()
        .filter(|found| !found.is_undefined())
        .or(default)
        .unwrap_or(Value::UNDEFINED)
}

/// Copy of a dict with one key set
///
/// Usage: {{ set(labels, "tier", "web") }}
pub fn set(dict: Value, key: String, val: Value) -> Result<Value, Error> {
    expect_map("set", &dict)?;

    let key = Value::from(key);
    let mut pairs = entries(&dict);
    if let Some(slot) = pairs.iter_mut().find(|(k, _)| *k == key) {
        slot.1 = val;
    } else {
        pairs.push((key, val));
    }
    Ok(Value::from_iter(pairs))
}

/// Copy of a dict without one key
pub fn unset(dict: Value, key: String) -> Result<Value, Error> {
    expect_map("unset", &dict)?;

    let key = Value::from(key);
    let mut pairs = entries(&dict);
    pairs.retain(|(k, _)| *k != key);
    Ok(Value::from_iter(pairs))
}

/// Walk nested keys, falling back to the last argument
///
/// Usage: {{ dig(Values, "ingress", "tls", "secretName", "none") }}
pub fn dig(dict: Value, keys_and_default: Rest<Value>) -> Result<Value, Error> {
    let (default, path) = keys_and_default
        .split_last()
        .filter(|(_, path)| !path.is_empty())
        .ok_or_else(|| invalid("dig: expected one or more keys followed by a default"))?;

    let found = path.iter().try_fold(dict, |node, key| {
        let child = match key.as_str() {
            Some(name) => node.get_attr(name),
            None => node.get_item(key),
        };
        child.ok().filter(|v| !v.is_undefined() && !v.is_none())
    });
    Ok(found.unwrap_or_else(|| default.clone()))
}

/// First value that is defined, not none and not an empty string
///
/// Usage: {{ coalesce(Values.name, Values.fullname, "app") }}
pub fn coalesce(args: Rest<Value>) -> Value {
    args.0
        .into_iter()
        .find(|arg| {
            !arg.is_undefined() && !arg.is_none() && arg.as_str().is_none_or(|s| !s.is_empty())
        })
        .unwrap_or(Value::UNDEFINED)
}

/// Usage: {{ ternary("on", "off", Values.enabled) }}
pub fn ternary(when_true: Value, when_false: Value, condition: Value) -> Value {
    match condition.is_true() {
        true => when_true,
        false => when_false,
    }
}

/// `value` unless it is empty, otherwise `fallback`
///
/// Usage: {{ default(Values.replicas, 1) }}
pub fn default(value: Value, fallback: Value) -> Value {
    if filters::empty(value.clone()) {
        fallback
    } else {
        value
    }
}

pub fn tostring(value: Value) -> String {
    text_of(&value)
}

/// Numeric conversion shared by `toint` and `tofloat`; strings are parsed
fn to_number<T>(value: Value, target: &str) -> Result<T, Error>
where
    T: std::str::FromStr + TryFrom<Value>,
{
    let converted = match value.as_str() {
        Some(text) => text.trim().parse::<T>().ok(),
        None => T::try_from(value.clone()).ok(),
    };
    converted.ok_or_else(|| {
        let shown = match value.as_str() {
            Some(text) => format!("'{text}'"),
            None => value.kind().to_string(),
        };
        invalid(format!("cannot convert {shown} to {target}"))
    })
}

pub fn toint(value: Value) -> Result<i64, Error> {
    to_number(value, "int")
}

pub fn tofloat(value: Value) -> Result<f64, Error> {
    to_number(value, "float")
}

/// UTC time as RFC 3339, second precision
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Go-style formatting with `%s %v %d %f %q` and `%%`
///
/// Usage: {{ printf("%s-%d", Values.name, Values.index) }}
pub fn printf(format: String, args: Rest<Value>) -> Result<String, Error> {
    let mut out = String::with_capacity(format.len());
    let mut pending = args.iter();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let verb = match chars.next() {
            None => {
                out.push('%');
                break;
            }
            Some('%') => {
                out.push('%');
                continue;
            }
            Some(verb) => verb,
        };
        let arg = pending
            .next()
            .ok_or_else(|| invalid(format!("printf: missing argument for %{verb}")))?;

        let formatted = match verb {
            'd' => i64::try_from(arg.clone()).map(|n| n.to_string()).ok(),
            'f' => f64::try_from(arg.clone()).map(|n| format!("{n:.6}")).ok(),
            'q' => Some(filters::quote(arg.clone())),
            _ => None,
        };
        out.push_str(&formatted.unwrap_or_else(|| text_of(arg)));
    }

    Ok(out)
}

pub fn trim(value: Value) -> String {
    text_of(&value).trim().to_string()
}

pub fn upper(value: Value) -> String {
    text_of(&value).to_uppercase()
}

pub fn lower(value: Value) -> String {
    text_of(&value).to_lowercase()
}

/// Value of a process environment variable, empty when unset
pub fn env(name: String) -> String {
    std::env::var(name).unwrap_or_default()
}

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("environment reference pattern is valid")
});

/// Replace `$VAR` and `${VAR}` with process environment values
pub fn expandenv(text: String) -> String {
    ENV_REFERENCE
        .replace_all(&text, |caps: &Captures| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|name| env(name.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::Environment;

    fn env_with(functions: FunctionMap) -> Environment<'static> {
        let mut env = Environment::new();
        for (name, f) in functions {
            env.add_global(name, f);
        }
        env
    }

    fn render(template: &str) -> String {
        env_with(build_functions(&EngineConfig::default()))
            .render_str(template, ())
            .unwrap()
    }

    #[test]
    fn test_function_names_match_registry() {
        let registered: Vec<String> = build_functions(&EngineConfig::default())
            .into_keys()
            .collect();
        let mut expected: Vec<&str> = FUNCTION_NAMES.to_vec();
        expected.sort_unstable();
        assert_eq!(registered, expected);
    }

    #[test]
    fn test_sandboxed_functions_removed() {
        let base = base_functions();
        let built = build_functions(&EngineConfig::default());
        for name in SANDBOXED_FUNCTIONS {
            assert!(base.contains_key(*name));
            assert!(!built.contains_key(*name));
        }

        let env = env_with(built);
        for template in [r#"{{ env("HOME") }}"#, r#"{{ expandenv("$HOME") }}"#] {
            let err = env.render_str(template, ()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnknownFunction);
        }
    }

    #[test]
    fn test_base_env_accessors() {
        let env = env_with(base_functions());
        let out = env
            .render_str(r#"{{ expandenv("${KUBEPLATE_SURELY_UNSET_VAR}x") }}"#, ())
            .unwrap();
        assert_eq!(out, "x");

        let path = std::env::var("PATH").unwrap_or_default();
        let out = env.render_str(r#"{{ env("PATH") }}"#, ()).unwrap();
        assert_eq!(out, path);
    }

    #[test]
    fn test_expandenv_forms() {
        assert_eq!(expandenv("no refs".to_string()), "no refs");
        assert_eq!(expandenv("$KUBEPLATE_SURELY_UNSET_VAR-a".to_string()), "-a");
    }

    #[test]
    fn test_dict_preserves_order() {
        let out = render(r#"{{ toJson(dict("b", 1, "a", 2)) }}"#);
        assert_eq!(out, r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn test_dict_odd_arguments() {
        let env = env_with(build_functions(&EngineConfig::default()));
        assert!(env.render_str(r#"{{ dict("a") }}"#, ()).is_err());
    }

    #[test]
    fn test_to_toml_of_dict() {
        assert_eq!(render(r#"{{ toToml(dict("a", "b")) }}"#), "a = \"b\"\n");
    }

    #[test]
    fn test_from_yaml_error_keys() {
        let out = render(r#"{{ fromYaml("not: [valid") | list | join(",") }}"#);
        assert_eq!(out, "Error");
    }

    #[test]
    fn test_list_and_ternary() {
        assert_eq!(render(r#"{{ list(1, "a") | length }}"#), "2");
        assert_eq!(render(r#"{{ ternary("yes", "no", true) }}"#), "yes");
        assert_eq!(render(r#"{{ ternary("yes", "no", 0) }}"#), "no");
    }

    #[test]
    fn test_get_set_unset() {
        assert_eq!(render(r#"{{ get(dict("a", 1), "a") }}"#), "1");
        assert_eq!(render(r#"{{ get(dict("a", 1), "b", "x") }}"#), "x");
        assert_eq!(
            render(r#"{{ toJson(set(dict("a", 1), "b", 2)) }}"#),
            r#"{"a":1,"b":2}"#
        );
        assert_eq!(
            render(r#"{{ toJson(set(dict("a", 1), "a", 3)) }}"#),
            r#"{"a":3}"#
        );
        assert_eq!(
            render(r#"{{ toJson(unset(dict("a", 1, "b", 2), "a")) }}"#),
            r#"{"b":2}"#
        );
    }

    #[test]
    fn test_dig() {
        let tree = r#"dict("a", dict("b", dict("c", "deep")))"#;
        assert_eq!(render(&format!(r#"{{{{ dig({}, "a", "b", "c", "none") }}}}"#, tree)), "deep");
        assert_eq!(render(&format!(r#"{{{{ dig({}, "a", "x", "none") }}}}"#, tree)), "none");

        let env = env_with(build_functions(&EngineConfig::default()));
        assert!(env.render_str(r#"{{ dig(dict(), "only-default") }}"#, ()).is_err());
    }

    #[test]
    fn test_now_is_utc_seconds() {
        let stamp = now();
        assert!(stamp.ends_with('Z'));
        assert_eq!(stamp.len(), "2026-01-01T00:00:00Z".len());
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn test_coalesce_and_default() {
        assert_eq!(render(r#"{{ coalesce("", none, "x") }}"#), "x");
        assert_eq!(render(r#"{{ default("", "fallback") }}"#), "fallback");
        assert_eq!(render(r#"{{ default("set", "fallback") }}"#), "set");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(render(r#"{{ toint("42") + 1 }}"#), "43");
        assert_eq!(render(r#"{{ tofloat("1.5") * 2 }}"#), "3.0");
        assert_eq!(render(r#"{{ tostring(12) ~ "x" }}"#), "12x");
        assert_eq!(toint(Value::from(7)).unwrap(), 7);
        assert!(toint(Value::from("nope")).is_err());
    }

    #[test]
    fn test_printf() {
        assert_eq!(
            printf("%s-%d".to_string(), Rest(vec![Value::from("web"), Value::from(3)])).unwrap(),
            "web-3"
        );
        assert_eq!(printf("100%%".to_string(), Rest(vec![])).unwrap(), "100%");
        assert_eq!(
            printf("%q".to_string(), Rest(vec![Value::from("a")])).unwrap(),
            "\"a\""
        );
        assert!(printf("%s %s".to_string(), Rest(vec![Value::from(1)])).is_err());
    }

    #[test]
    fn test_fail() {
        let env = env_with(build_functions(&EngineConfig::default()));
        let err = env.render_str(r#"{{ fail("stop here") }}"#, ()).unwrap_err();
        assert!(err.to_string().contains("stop here"));
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(render(r#"{{ upper("a") }}{{ lower("B") }}{{ trim("  c ") }}"#), "Abc");
        assert_eq!(render(r#"{{ quote(trimPrefix("v1", "v")) }}"#), "\"1\"");
        assert_eq!(render(r#"{{ b64dec(b64enc("x")) }}"#), "x");
    }

    #[test]
    fn test_files_without_static_dir() {
        let env = env_with(build_functions(&EngineConfig::default()));
        assert!(env.render_str(r#"{{ Files().Get("a.txt") }}"#, ()).is_err());
    }
}
