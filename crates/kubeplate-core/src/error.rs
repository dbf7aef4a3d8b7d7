//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid values document: {message}")]
    InvalidValues { message: String },

    #[error("values merge error: {message}")]
    ValuesMerge { message: String },

    #[error("cannot access '{path}': {message}")]
    FileAccess { path: String, message: String },

    #[error("{message}")]
    GlobPattern { message: String },

    #[error("invalid apiVersion '{api_version}'")]
    InvalidApiVersion { api_version: String },

    #[error("cannot resolve kind '{kind}': {message}")]
    Discovery { kind: String, message: String },
}

impl CoreError {
    /// Wrap an IO error with the path that caused it
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
