//! Rendered stream to resource specifications

use kubeplate_core::{ResourceSpec, Value};

use crate::error::{EngineError, Result};

/// Literal text separating documents in the rendered stream
///
/// The stream is split on every occurrence, not only on separator lines,
/// so a `---` inside a scalar also ends a document.
pub const DOCUMENT_SEPARATOR: &str = "---";

/// Split a rendered stream and parse every segment as a YAML mapping
///
/// Either every segment parses or the call fails and nothing is returned.
/// Segments that parse to an empty mapping (blank, comments only) are
/// dropped unless `keep_empty` is set.
pub fn split_documents(rendered: &str, keep_empty: bool) -> Result<Vec<ResourceSpec>> {
    let mut documents = Vec::new();

    for (index, segment) in rendered.split(DOCUMENT_SEPARATOR).enumerate() {
        let spec = Value::from_yaml_str(segment)
            .and_then(ResourceSpec::from_value)
            .map_err(|e| EngineError::Document {
                index,
                message: e.to_string(),
            })?;

        if spec.is_empty() && !keep_empty {
            continue;
        }
        documents.push(spec);
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_split_two_documents() {
        let docs = split_documents("metadata:\n  name: demo\n---\nkind: Namespace\n", false).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name(), Some("demo"));
        assert_eq!(docs[1].kind(), Some("Namespace"));
    }

    #[test]
    fn test_empty_segments_dropped() {
        let docs = split_documents("---\nkind: A\n---\n# comment\n---\n", false).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_empty_segments_kept() {
        let docs = split_documents("---\nkind: A\n---\n# comment\n---\n", true).unwrap();
        assert_eq!(docs.len(), 4);
        assert!(docs[0].is_empty());
        assert_eq!(docs[1].kind(), Some("A"));
    }

    #[test]
    fn test_one_bad_segment_fails_all() {
        let err = split_documents("kind: A\n---\nkind: [broken\n---\nkind: C\n", false).unwrap_err();
        assert!(matches!(err, EngineError::Document { index: 1, .. }));
        assert_eq!(err.category(), ErrorCategory::Parse);
    }

    #[test]
    fn test_scalar_segment_rejected() {
        let err = split_documents("kind: A\n---\njust words\n", false).unwrap_err();
        assert!(matches!(err, EngineError::Document { index: 1, .. }));
    }

    #[test]
    fn test_separator_inside_scalar_splits() {
        let err = split_documents("note: \"a---b\"\n", false).unwrap_err();
        assert!(matches!(err, EngineError::Document { .. }));
    }

    #[test]
    fn test_empty_stream() {
        assert!(split_documents("", false).unwrap().is_empty());
        assert_eq!(split_documents("", true).unwrap().len(), 1);
    }
}
