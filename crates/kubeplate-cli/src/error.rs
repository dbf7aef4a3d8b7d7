//! CLI error types with exit code handling
//!
//! Engine failures keep their diagnostics (source spans, suggestions) and
//! are mapped to an exit code by their category.

use kubeplate_engine::{EngineError, ErrorCategory};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Engine construction or rendering failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),

    /// Invalid command line input
    #[error("{message}")]
    #[diagnostic(code(kubeplate::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error while writing output
    #[error("{message}: {source}")]
    #[diagnostic(code(kubeplate::cli::io))]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(kubeplate::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Engine(err) => match err.category() {
                ErrorCategory::Io => exit_codes::IO_ERROR,
                ErrorCategory::Parse => exit_codes::PARSE_ERROR,
                ErrorCategory::Render => exit_codes::TEMPLATE_ERROR,
            },
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
