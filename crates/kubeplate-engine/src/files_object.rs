//! Static asset accessor returned by `Files()`
//!
//! # Usage in Templates
//!
//! ```jinja
//! {# Raw content #}
//! {{ Files().Get("nginx.conf") }}
//!
//! {# ConfigMap data: `nginx.conf: |-` followed by the content #}
//! data: {{- Files().GetConfig("nginx.conf") | nindent(2) }}
//!
//! {# Secret data, base64 encoded #}
//! data: {{- Files().GetSecret("tls.key") | nindent(2) }}
//!
//! {% for f in Files().Glob("scripts/*.sh") %}
//!   {{ f.name }}: {{ f.content | b64enc }}
//! {% endfor %}
//! ```
//!
//! Method names follow the Go-style capitalisation used in manifests; the
//! lowercase spellings are accepted too.

use std::sync::Arc;

use base64::Engine as _;
use kubeplate_core::files::{FileEntry, FileProvider, Files};
use minijinja::value::{Enumerator, Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind};

use crate::convert;

const METHODS: &str = "Get, GetConfig, GetSecret, GetBytes, Lines, Exists, Glob";

/// Template object over a [`Files`] handle
#[derive(Debug)]
pub struct FilesObject {
    files: Files,
}

impl FilesObject {
    pub fn new(files: Files) -> Self {
        Self { files }
    }

    pub fn from_provider(provider: impl FileProvider + 'static) -> Self {
        Self::new(Files::new(provider))
    }

    fn get(&self, path: &str) -> Result<String, Error> {
        self.files.get(path).map_err(read_error)
    }

    /// Single-key YAML mapping `{name: content}`
    fn as_config(&self, name: &str, content: String) -> String {
        convert::to_yaml(Value::from_iter([(name, content)]))
    }
}

impl Object for FilesObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &minijinja::State,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        let path = path_arg(args, method)?;

        match method {
            "Get" | "get" => Ok(Value::from(self.get(path)?)),

            "GetConfig" | "get_config" => {
                let content = self.get(path)?;
                Ok(Value::from(self.as_config(path, content)))
            }

            "GetSecret" | "get_secret" => {
                let bytes = self.files.get_bytes(path).map_err(read_error)?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                Ok(Value::from(self.as_config(path, encoded)))
            }

            "GetBytes" | "get_bytes" => {
                let bytes = self.files.get_bytes(path).map_err(read_error)?;
                Ok(Value::from_bytes(bytes))
            }

            "Lines" | "lines" => Ok(Value::from(self.files.lines(path).map_err(read_error)?)),

            "Exists" | "exists" => Ok(Value::from(self.files.exists(path))),

            "Glob" | "glob" => {
                let entries = self.files.glob(path).map_err(read_error)?;
                Ok(Value::from(
                    entries
                        .into_iter()
                        .map(|entry| Value::from_object(FileEntryObject(entry)))
                        .collect::<Vec<_>>(),
                ))
            }

            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("Files() has no method '{}'. Available methods: {}", method, METHODS),
            )),
        }
    }
}

fn read_error(err: kubeplate_core::CoreError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn path_arg<'a>(args: &'a [Value], method: &str) -> Result<&'a str, Error> {
    match args {
        [path] => path.as_str().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("Files().{}() requires a path string argument", method),
            )
        }),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("Files().{}() takes exactly one argument", method),
        )),
    }
}

/// Glob result: `path`, `name`, `content` and `size`
#[derive(Debug)]
struct FileEntryObject(FileEntry);

impl Object for FileEntryObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "path" => Some(Value::from(self.0.path.clone())),
            "name" => Some(Value::from(self.0.name.clone())),
            "content" => Some(Value::from(self.0.content.clone())),
            "size" => Some(Value::from(self.0.size)),
            _ => None,
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["path", "name", "content", "size"])
    }
}
