//! Template engine based on MiniJinja
//!
//! An [`Engine`] owns one environment holding the root template, the
//! auxiliary template and every `define` block of both. It is immutable
//! after construction and can be shared between threads; all per-render
//! state lives in the [`RenderSession`] created by each render.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;

use kubeplate_core::{ResourceSpec, Values};
use minijinja::{Environment, UndefinedBehavior, Value};

use crate::config::EngineConfig;
use crate::define::split_defines;
use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions::build_functions;
use crate::session::{RenderSession, SESSION_KEY};
use crate::splitter::split_documents;

/// Name under which the root source is registered
pub const ROOT_TEMPLATE: &str = "root";

/// Name under which the auxiliary source is registered
pub const AUX_TEMPLATE: &str = "_helpers.tpl";

/// Render thread stack before any `include` nesting
const RENDER_STACK_BASE: usize = 16 * 1024 * 1024;

/// Render thread stack reserved per allowed `include` level
const RENDER_STACK_PER_INCLUDE: usize = 128 * 1024;

/// Stack for a render whose templates may nest `include` up to `max_depth`
///
/// Every nested `include` is a full template render on the native stack.
/// The size only covers one template name reaching the limit; mutually
/// recursive templates can nest deeper than that.
fn render_stack_size(max_depth: usize) -> usize {
    max_depth
        .saturating_add(1)
        .saturating_mul(RENDER_STACK_PER_INCLUDE)
        .saturating_add(RENDER_STACK_BASE)
}

/// Template engine builder
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    /// Directory served by `Files()`
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.static_dir = Some(dir.into());
        self
    }

    /// Active invocations allowed per template name before `include`
    /// starts rendering nothing
    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.config.max_include_depth = depth;
        self
    }

    /// Keep documents that parse to an empty mapping
    pub fn keep_empty_documents(mut self, keep: bool) -> Self {
        self.config.keep_empty_documents = keep;
        self
    }

    /// Replace every option with the ones from `config`
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine from the root and auxiliary sources
    pub fn build(self, root: &str, aux: &str) -> Result<Engine> {
        Engine::with_config(self.config, root, aux)
    }

    /// Build the engine from source files
    pub fn build_from_files(self, root: impl AsRef<Path>, aux: impl AsRef<Path>) -> Result<Engine> {
        let root = read_source(root.as_ref())?;
        let aux = read_source(aux.as_ref())?;
        self.build(&root, &aux)
    }
}

/// The template engine
#[derive(Debug)]
pub struct Engine {
    env: Environment<'static>,
    /// Source of every registered template, for error reports
    sources: HashMap<String, String>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine with default settings
    pub fn new(root: &str, aux: &str) -> Result<Self> {
        Self::builder().build(root, aux)
    }

    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine with default settings from source files
    pub fn from_files(root: impl AsRef<Path>, aux: impl AsRef<Path>) -> Result<Self> {
        Self::builder().build_from_files(root, aux)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Names of every registered template, sorted
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn with_config(config: EngineConfig, root: &str, aux: &str) -> Result<Self> {
        let mut env = Environment::new();

        if config.strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(UndefinedBehavior::Lenient);
        }
        env.set_keep_trailing_newline(true);
        env.set_formatter(filters::format_output);

        filters::register_filters(&mut env);
        for (name, function) in build_functions(&config) {
            env.add_global(name, function);
        }

        let mut engine = Self {
            env,
            sources: HashMap::new(),
            config,
        };

        // Root first, so its blocks win the name and aux duplicates are reported
        for (template, source) in [(ROOT_TEMPLATE, root), (AUX_TEMPLATE, aux)] {
            let split = split_defines(template, source)?;
            engine.add_template(template, split.body)?;

            for (name, body) in split.blocks {
                if engine.sources.contains_key(&name) {
                    return Err(EngineError::Define {
                        template: template.to_string(),
                        message: format!("template \"{}\" is defined more than once", name),
                    });
                }
                engine.add_template(&name, body)?;
            }
        }

        tracing::debug!(
            templates = engine.sources.len(),
            strict = engine.config.strict,
            "template engine ready"
        );

        Ok(engine)
    }

    fn add_template(&mut self, name: &str, source: String) -> Result<()> {
        self.env
            .add_template_owned(name.to_string(), source.clone())
            .map_err(|e| TemplateError::from_minijinja(e, name, &source))?;
        self.sources.insert(name.to_string(), source);
        Ok(())
    }

    /// Load a values document
    ///
    /// The file is read on every call.
    pub fn read_values(&self, path: impl AsRef<Path>) -> Result<Values> {
        Ok(Values::from_file(path)?)
    }

    /// Render the root template with the values read from `values_path`
    pub fn execute(&self, namespace: &str, values_path: impl AsRef<Path>) -> Result<Vec<ResourceSpec>> {
        let values = self.read_values(values_path)?;
        self.execute_values(namespace, values)
    }

    /// Render the root template with already loaded values
    ///
    /// Either every rendered document parses or an error is returned.
    pub fn execute_values(&self, namespace: &str, values: Values) -> Result<Vec<ResourceSpec>> {
        let rendered = self.render(namespace, values)?;
        let documents = split_documents(&rendered, self.config.keep_empty_documents)?;

        tracing::debug!(namespace, documents = documents.len(), "rendered manifests");
        Ok(documents)
    }

    /// Render the root template to the raw document stream
    ///
    /// The template runs on a dedicated thread whose stack is sized for the
    /// configured include depth, so callers need no special stack of their own.
    pub fn render(&self, namespace: &str, values: Values) -> Result<String> {
        let span = tracing::debug_span!("render", namespace);
        let values = values.with_namespace(namespace);
        let stack_size = render_stack_size(self.config.max_include_depth);

        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("kubeplate-render".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, || span.in_scope(|| self.render_root(&values)))
                .map_err(|e| EngineError::RenderThread {
                    message: format!(
                        "cannot start render thread with a {} byte stack: {}",
                        stack_size, e
                    ),
                })?;

            worker
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    fn render_root(&self, values: &Values) -> Result<String> {
        let session = RenderSession::new(self.config.max_include_depth);
        let context = Value::from_iter([
            ("Values", Value::from_serialize(values)),
            (SESSION_KEY, session.to_value()),
        ]);

        let template = self
            .env
            .get_template(ROOT_TEMPLATE)
            .map_err(|e| self.template_error(e))?;

        template.render(context).map_err(|e| self.template_error(e))
    }

    /// Map a MiniJinja error back to the source of the template it came from
    fn template_error(&self, err: minijinja::Error) -> EngineError {
        let name = err.name().unwrap_or(ROOT_TEMPLATE).to_string();
        let source = self.sources.get(&name).map(String::as_str).unwrap_or_default();
        TemplateError::from_minijinja(err, &name, source).into()
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| EngineError::io(path.display().to_string(), e))
}
