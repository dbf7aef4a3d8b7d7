//! Kubeplate Engine - MiniJinja rendering of parameterized manifests
//!
//! This crate turns a root template, an auxiliary template and a values
//! document into a list of resource specifications:
//! - Sandboxed function set (no process environment access)
//! - Named `define` blocks shared between both templates
//! - Depth-bounded recursive `include`
//! - `---` document splitting with all-or-nothing parsing
//! - Human-readable error messages with suggestions

pub mod config;
pub mod convert;
pub mod define;
pub mod engine;
pub mod error;
pub mod files_object;
pub mod filters;
pub mod functions;
pub mod session;
pub mod splitter;
pub mod suggestions;

pub use config::{DEFAULT_MAX_INCLUDE_DEPTH, EngineConfig};
pub use engine::{AUX_TEMPLATE, Engine, EngineBuilder, ROOT_TEMPLATE};
pub use error::{EngineError, ErrorCategory, Result, TemplateError, TemplateErrorKind};
pub use filters::FILTER_NAMES;
pub use functions::{FUNCTION_NAMES, FunctionMap, SANDBOXED_FUNCTIONS, base_functions, build_functions};
pub use session::RenderSession;
pub use splitter::{DOCUMENT_SEPARATOR, split_documents};
