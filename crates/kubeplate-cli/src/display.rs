//! Display formatting for rendered documents

use std::fs;
use std::path::Path;

use console::style;
use kubeplate_core::ResourceSpec;
use kubeplate_engine::DOCUMENT_SEPARATOR;

use crate::error::{CliError, Result};
use crate::util::document_file_name;

/// Documents as one YAML stream separated by `---`
pub fn yaml_stream(docs: &[ResourceSpec]) -> Result<String> {
    let mut out = String::new();
    for (index, doc) in docs.iter().enumerate() {
        if index > 0 {
            out.push_str(DOCUMENT_SEPARATOR);
            out.push('\n');
        }
        out.push_str(&encode_yaml(index, doc)?);
    }
    Ok(out)
}

/// Documents as a pretty-printed JSON array
pub fn json_array(docs: &[ResourceSpec]) -> Result<String> {
    serde_json::to_string_pretty(docs)
        .map_err(|e| CliError::internal(format!("failed to encode documents as JSON: {}", e)))
}

/// Write one YAML file per document, returning the written paths
pub fn write_documents(dir: &Path, docs: &[ResourceSpec]) -> Result<Vec<String>> {
    fs::create_dir_all(dir)
        .map_err(|e| CliError::io(format!("failed to create {}", dir.display()), e))?;

    let mut written = Vec::with_capacity(docs.len());
    for (index, doc) in docs.iter().enumerate() {
        let path = dir.join(document_file_name(index, doc));
        fs::write(&path, encode_yaml(index, doc)?)
            .map_err(|e| CliError::io(format!("failed to write {}", path.display()), e))?;
        written.push(path.display().to_string());
    }
    Ok(written)
}

/// Styled summary line printed to stderr after writing files
pub fn print_written(paths: &[String]) {
    for path in paths {
        eprintln!("{} {}", style("wrote").green(), path);
    }
    eprintln!(
        "{} {} document(s)",
        style("rendered").green().bold(),
        paths.len()
    );
}

fn encode_yaml(index: usize, doc: &ResourceSpec) -> Result<String> {
    doc.to_yaml()
        .map_err(|e| CliError::internal(format!("failed to encode document {}: {}", index, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn docs() -> Vec<ResourceSpec> {
        vec![
            ResourceSpec::from_yaml("kind: Namespace\nmetadata:\n  name: demo").unwrap(),
            ResourceSpec::from_yaml("kind: ConfigMap").unwrap(),
        ]
    }

    #[test]
    fn test_yaml_stream() {
        insta::assert_snapshot!(yaml_stream(&docs()).unwrap(), @r"
        kind: Namespace
        metadata:
          name: demo
        ---
        kind: ConfigMap
        ");
    }

    #[test]
    fn test_json_array() {
        let json: serde_json::Value = serde_json::from_str(&json_array(&docs()).unwrap()).unwrap();
        assert_eq!(json[0]["metadata"]["name"], "demo");
        assert_eq!(json[1]["kind"], "ConfigMap");
    }

    #[test]
    fn test_write_documents() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        let written = write_documents(&out, &docs()).unwrap();

        assert_eq!(written.len(), 2);
        let first = fs::read_to_string(out.join("000-namespace-demo.yaml")).unwrap();
        assert!(first.contains("name: demo"));
        assert!(out.join("001-configmap.yaml").exists());
    }
}
