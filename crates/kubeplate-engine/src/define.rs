//! Named sub-template blocks
//!
//! A template source may declare named sub-templates:
//!
//! ```jinja
//! {%- define "labels" -%}
//! app: {{ name }}
//! {%- enddefine %}
//! ```
//!
//! MiniJinja has no such statement, so blocks are cut out of the source
//! before it is compiled and each body is registered as its own template.
//! The `-` markers trim whitespace on that side of the tag, as they do for
//! regular Jinja tags.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EngineError, Result};

static DEFINE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{%(-?)\s*(?:define\s+(?:"([^"]*)"|'([^']*)')|(enddefine))\s*(-?)%\}"#)
        .expect("define tag pattern is valid")
});

/// A template source with its `define` blocks cut out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSource {
    /// What remains of the source
    pub body: String,
    /// `(name, body)` for every block, in source order
    pub blocks: Vec<(String, String)>,
}

struct OpenBlock {
    name: String,
    body_start: usize,
}

/// Cut the `define` blocks out of `source`
///
/// `template` names the source in error messages. Nested, unterminated or
/// unnamed blocks are errors; duplicate names are checked by the caller,
/// which sees every source.
pub fn split_defines(template: &str, source: &str) -> Result<SplitSource> {
    let error = |message: String| EngineError::Define {
        template: template.to_string(),
        message,
    };

    let mut body = String::with_capacity(source.len());
    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock> = None;
    let mut cursor = 0;
    let mut trim_next = false;

    for caps in DEFINE_TAG.captures_iter(source) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        let line = line_of(source, tag.start());
        let trim_before = !caps[1].is_empty();
        let trim_after = !caps[5].is_empty();

        if caps.get(4).is_some() {
            let Some(block) = open.take() else {
                return Err(error(format!("line {}: enddefine without define", line)));
            };
            let mut text = &source[block.body_start..tag.start()];
            if trim_before {
                text = text.trim_end();
            }
            if trim_next {
                text = text.trim_start();
            }
            blocks.push((block.name, text.to_string()));
        } else {
            if let Some(block) = &open {
                return Err(error(format!(
                    "line {}: define blocks cannot be nested (inside \"{}\")",
                    line, block.name
                )));
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            if name.trim().is_empty() {
                return Err(error(format!("line {}: define requires a name", line)));
            }

            let mut text = &source[cursor..tag.start()];
            if trim_before {
                text = text.trim_end();
            }
            if trim_next {
                text = text.trim_start();
            }
            body.push_str(text);

            open = Some(OpenBlock {
                name: name.to_string(),
                body_start: tag.end(),
            });
        }

        cursor = tag.end();
        trim_next = trim_after;
    }

    if let Some(block) = open {
        return Err(error(format!(
            "define \"{}\" is not closed with enddefine",
            block.name
        )));
    }

    let rest = &source[cursor..];
    body.push_str(if trim_next { rest.trim_start() } else { rest });

    Ok(SplitSource { body, blocks })
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}
