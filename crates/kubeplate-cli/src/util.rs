//! Shared utility functions for CLI commands

use kubeplate_core::ResourceSpec;

/// File name for the `index`th rendered document
///
/// Built from the kind and name when present: `000-deployment-web.yaml`.
#[must_use]
pub fn document_file_name(index: usize, doc: &ResourceSpec) -> String {
    let parts: Vec<String> = [doc.kind(), doc.name()]
        .into_iter()
        .flatten()
        .map(slug)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        format!("{:03}-document.yaml", index)
    } else {
        format!("{:03}-{}.yaml", index, parts.join("-"))
    }
}

/// Lowercase, with anything outside `[a-z0-9.]` collapsed to single dashes
#[must_use]
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("ConfigMap"), "configmap");
        assert_eq!(slug("my_app/v2"), "my-app-v2");
        assert_eq!(slug("--x--"), "x");
        assert_eq!(slug("app.conf"), "app.conf");
    }

    #[test]
    fn test_document_file_name() {
        let doc = ResourceSpec::from_yaml("kind: Deployment\nmetadata:\n  name: web").unwrap();
        assert_eq!(document_file_name(0, &doc), "000-deployment-web.yaml");

        let kind_only = ResourceSpec::from_yaml("kind: Namespace").unwrap();
        assert_eq!(document_file_name(12, &kind_only), "012-namespace.yaml");
    }

    #[test]
    fn test_document_file_name_fallback() {
        assert_eq!(document_file_name(3, &ResourceSpec::default()), "003-document.yaml");
    }
}
