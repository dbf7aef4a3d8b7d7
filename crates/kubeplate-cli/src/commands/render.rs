//! Render command - render manifests from a root and auxiliary template

use std::path::{Path, PathBuf};

use clap::Args;
use kubeplate_core::{ResourceSpec, Values, parse_set_values};
use kubeplate_engine::{Engine, EngineConfig};

use crate::display;
use crate::error::{CliError, Result};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Root template
    pub root: PathBuf,

    /// Auxiliary template holding shared `define` blocks
    pub aux: PathBuf,

    /// Values file(s), merged in order
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Target namespace, available as `Values.namespace`
    #[arg(short, long, default_value = "default")]
    pub namespace: String,

    /// Set values on command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Directory served by `Files()`
    #[arg(long, env = "KUBEPLATE_STATIC_PATH")]
    pub static_dir: Option<PathBuf>,

    /// Engine configuration file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keep documents that render to an empty mapping
    #[arg(long)]
    pub keep_empty: bool,

    /// Print documents as a JSON array
    #[arg(long, conflicts_with = "output_dir")]
    pub json: bool,

    /// Write one file per document instead of printing
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl RenderArgs {
    /// Configuration file, overridden by command line flags
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };

        if let Some(dir) = &self.static_dir {
            config.static_dir = Some(dir.clone());
        }
        if self.keep_empty {
            config.keep_empty_documents = true;
        }

        Ok(config)
    }
}

pub fn run(args: RenderArgs) -> Result<()> {
    let overrides = parse_set_values(&args.set).map_err(|e| {
        CliError::usage(e.to_string(), "use --set key=value, e.g. --set image.tag=1.2")
    })?;
    let config = args.engine_config()?;
    let docs = render(config, &args.root, &args.aux, &args.values, &args.namespace, overrides)?;

    if let Some(dir) = &args.output_dir {
        let written = display::write_documents(dir, &docs)?;
        display::print_written(&written);
    } else if args.json {
        println!("{}", display::json_array(&docs)?);
    } else {
        print!("{}", display::yaml_stream(&docs)?);
    }

    Ok(())
}

fn render(
    config: EngineConfig,
    root: &Path,
    aux: &Path,
    values_files: &[PathBuf],
    namespace: &str,
    overrides: Values,
) -> Result<Vec<ResourceSpec>> {
    let engine = Engine::builder().config(config).build_from_files(root, aux)?;

    let mut values = Values::new();
    for path in values_files {
        values.merge(&engine.read_values(path)?);
    }
    values.merge(&overrides);

    tracing::debug!(
        root = %root.display(),
        values_files = values_files.len(),
        overrides = overrides.inner().len(),
        "rendering"
    );

    Ok(engine.execute_values(namespace, values)?)
}
