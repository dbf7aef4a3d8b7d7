//! Kubeplate CLI - render Kubernetes manifests from Jinja2 templates

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

use commands::render::RenderArgs;

/// Environment variable holding the log filter
const LOG_ENV: &str = "KUBEPLATE_LOG";

#[derive(Parser)]
#[command(name = "kubeplate")]
#[command(author = "Kubeplate Contributors")]
#[command(version)]
#[command(about = "Render Kubernetes manifests from Jinja2 templates", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render templates into manifests
    Render(RenderArgs),

    /// List the functions and filters available to templates
    Functions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init()
        .ok();
}

fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.debug);

    let result = match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Functions { json } => commands::functions::run(json),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "kubeplate", "render", "root.yaml", "aux.tpl", "-f", "values.yaml", "-n", "prod",
            "--set", "a=1", "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.namespace, "prod");
                assert_eq!(args.set, vec!["a=1"]);
                assert!(args.json);
            }
            Commands::Functions { .. } => panic!("expected render"),
        }
    }

    #[test]
    fn test_json_conflicts_with_output_dir() {
        let result = Cli::try_parse_from([
            "kubeplate", "render", "r", "a", "--json", "--output-dir", "out",
        ]);
        assert!(result.is_err());
    }
}
