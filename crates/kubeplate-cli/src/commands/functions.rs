//! Functions command - list what templates can call

use console::style;
use kubeplate_engine::{FILTER_NAMES, FUNCTION_NAMES, SANDBOXED_FUNCTIONS};
use serde_json::json;

use crate::error::{CliError, Result};

pub fn run(json: bool) -> Result<()> {
    if json {
        let listing = json!({
            "functions": FUNCTION_NAMES,
            "filters": FILTER_NAMES,
            "removed": SANDBOXED_FUNCTIONS,
        });
        let text = serde_json::to_string_pretty(&listing)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    println!("{}", style("Functions").cyan().bold());
    for name in FUNCTION_NAMES {
        println!("  {}", name);
    }

    println!();
    println!("{}", style("Filters").cyan().bold());
    for name in FILTER_NAMES {
        println!("  {}", name);
    }

    println!();
    println!(
        "{} {}",
        style("Not available (sandboxed):").yellow(),
        SANDBOXED_FUNCTIONS.join(", ")
    );

    Ok(())
}
