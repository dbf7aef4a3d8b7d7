//! Engine error types
//!
//! Every failure surfaced by the engine falls in one of three categories,
//! reported by [`EngineError::category`]: reading inputs (`Io`), parsing
//! templates, values or rendered documents (`Parse`), and executing a
//! template (`Render`).

use std::fmt;

use kubeplate_core::CoreError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::suggestions::{
    extract_quoted_name, extract_unknown_name, suggest_go_syntax, suggest_undefined_variable,
    suggest_unknown_filter, suggest_unknown_function,
};

/// Any failure while building an engine or rendering
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(kubeplate::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(kubeplate::values))]
    Values(#[from] CoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("invalid define block in {template}: {message}")]
    #[diagnostic(code(kubeplate::template::define))]
    Define { template: String, message: String },

    #[error("rendered document {index} is not a valid manifest: {message}")]
    #[diagnostic(code(kubeplate::document))]
    Document { index: usize, message: String },

    #[error("invalid engine configuration {path}: {message}")]
    #[diagnostic(code(kubeplate::config))]
    Config { path: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(kubeplate::render))]
    RenderThread { message: String },
}

/// Coarse error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// An input file could not be read
    Io,
    /// Template, values or rendered output is malformed
    Parse,
    /// Template execution failed
    Render,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Io => "io",
            Self::Parse => "parse",
            Self::Render => "render",
        })
    }
}

impl EngineError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } | Self::Values(CoreError::Io { .. }) => ErrorCategory::Io,
            Self::Values(_) | Self::Define { .. } | Self::Document { .. } | Self::Config { .. } => {
                ErrorCategory::Parse
            }
            Self::Template(err) if err.kind == TemplateErrorKind::SyntaxError => {
                ErrorCategory::Parse
            }
            Self::Template(_) | Self::RenderThread { .. } => ErrorCategory::Render,
        }
    }
}

/// What went wrong inside a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    TemplateNotFound,
    InvalidOperation,
    Other,
}

impl From<minijinja::ErrorKind> for TemplateErrorKind {
    fn from(kind: minijinja::ErrorKind) -> Self {
        use minijinja::ErrorKind as K;

        match kind {
            K::UndefinedError => Self::UndefinedVariable,
            K::UnknownFilter => Self::UnknownFilter,
            K::UnknownFunction => Self::UnknownFunction,
            K::SyntaxError => Self::SyntaxError,
            K::TemplateNotFound => Self::TemplateNotFound,
            K::InvalidOperation => Self::InvalidOperation,
            K::NonPrimitive | K::NonKey | K::UnknownMethod => Self::TypeError,
            _ => Self::Other,
        }
    }
}

/// A template failed to parse or render
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(kubeplate::template))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    /// Name of the template the error points into
    pub template: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Wrap a MiniJinja error raised while handling `name`, whose text is `source`
    pub fn from_minijinja(err: minijinja::Error, name: &str, source: &str) -> Self {
        let kind = TemplateErrorKind::from(err.kind());
        let expression = match kind {
            TemplateErrorKind::UndefinedVariable => failing_expression(&format!("{:#}", err)),
            _ => None,
        };

        let message = match (&expression, err.detail()) {
            (Some(expr), _) => format!("undefined variable `{}`", expr),
            (None, _) if kind == TemplateErrorKind::UndefinedVariable => {
                "undefined variable".to_string()
            }
            (None, Some(detail)) => format!("{}: {}", err.kind(), detail),
            (None, None) => err.kind().to_string(),
        };

        Self {
            message,
            kind,
            template: name.to_string(),
            src: NamedSource::new(name, source.to_string()),
            span: err.line().and_then(|line| line_span(source, line)),
            suggestion: hint(&err, kind, expression.as_deref()),
        }
    }

    /// Error that is not tied to any template text
    pub fn simple(kind: TemplateErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            template: String::new(),
            src: NamedSource::new("<none>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

/// Expression between `{{ }}` on the line MiniJinja marks with `>`
///
/// ```text
///    8 >   name: {{ Values.app.name }}
///      i            ^^^^^^^^^ undefined value
/// ```
///
/// Filters applied to the expression are dropped.
fn failing_expression(debug_display: &str) -> Option<String> {
    let marked = debug_display.lines().find(|line| {
        let line = line.trim_start();
        line.starts_with("> ") || line.contains(" > ")
    })?;

    let (_, after_open) = marked.split_once("{{")?;
    let (inside, _) = after_open.split_once("}}")?;
    let expr = inside.split('|').next().unwrap_or_default().trim();

    if expr.is_empty() {
        None
    } else {
        Some(expr.to_string())
    }
}

/// Byte span covering 1-based line `line` of `source`
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let start: usize = source
        .split_inclusive('\n')
        .take(line.checked_sub(1)?)
        .map(str::len)
        .sum();
    let text = source.get(start..)?.lines().next()?;
    Some(SourceSpan::new(start.into(), text.len()))
}

fn hint(err: &minijinja::Error, kind: TemplateErrorKind, expression: Option<&str>) -> Option<String> {
    let detail = err.detail().unwrap_or_default();

    match kind {
        TemplateErrorKind::UndefinedVariable => suggest_undefined_variable(expression?),
        TemplateErrorKind::UnknownFunction => suggest_unknown_function(extract_unknown_name(detail)?),
        TemplateErrorKind::UnknownFilter => suggest_unknown_filter(extract_unknown_name(detail)?),
        TemplateErrorKind::TemplateNotFound => {
            let name = extract_quoted_name(detail)?;
            Some(format!(
                "No template named `{name}`. Declare it with {{% define \"{name}\" %}}...{{% enddefine %}}"
            ))
        }
        TemplateErrorKind::SyntaxError => suggest_go_syntax(detail),
        _ => None,
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
