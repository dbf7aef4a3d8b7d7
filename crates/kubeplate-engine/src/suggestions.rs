//! Fuzzy matching and hints for template errors

use crate::filters::FILTER_NAMES;
use crate::functions::{FUNCTION_NAMES, SANDBOXED_FUNCTIONS};

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Closest candidates to `input`, best first
pub fn find_closest_matches<'a>(
    input: &str,
    candidates: &[&'a str],
    max_results: usize,
) -> Vec<&'a str> {
    let mut matches: Vec<(usize, &str)> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = strsim::levenshtein(input, candidate);
            (distance > 0 && distance <= MAX_SUGGESTION_DISTANCE).then_some((distance, candidate))
        })
        .collect();

    matches.sort_by_key(|(distance, _)| *distance);
    matches.truncate(max_results);
    matches.into_iter().map(|(_, candidate)| candidate).collect()
}

fn did_you_mean(matches: &[&str]) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    let names: Vec<String> = matches.iter().map(|m| format!("`{}`", m)).collect();
    Some(format!("Did you mean {}?", names.join(" or ")))
}

/// Hint for an undefined variable expression such as `values.image`
pub fn suggest_undefined_variable(expr: &str) -> Option<String> {
    let root = expr.split(['.', '[']).next().unwrap_or(expr);

    match root {
        "values" | "Value" | "value" => Some(format!(
            "Did you mean `Values{}`? The values tree is exposed as `Values`.",
            &expr[root.len()..]
        )),
        _ if expr.starts_with("Values.") => Some(
            "Key is not set in the values file. Use `| default(...)` for optional keys."
                .to_string(),
        ),
        _ => None,
    }
}

/// Hint for an unknown function
pub fn suggest_unknown_function(name: &str) -> Option<String> {
    if SANDBOXED_FUNCTIONS.contains(&name) {
        return Some(format!(
            "`{}` is disabled: templates cannot read the process environment.",
            name
        ));
    }
    did_you_mean(&find_closest_matches(name, FUNCTION_NAMES, 3))
}

/// Hint for an unknown filter
pub fn suggest_unknown_filter(name: &str) -> Option<String> {
    did_you_mean(&find_closest_matches(name, FILTER_NAMES, 3))
}

/// Hint for syntax errors caused by Go template habits
pub fn suggest_go_syntax(detail: &str) -> Option<String> {
    if detail.contains("`.`") {
        Some("Drop the leading dot: write `Values.key` instead of `.Values.key`.".to_string())
    } else if detail.contains('}') || detail.contains('%') {
        Some(
            "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements, `{# #}` for comments"
                .to_string(),
        )
    } else {
        None
    }
}

/// Name from a MiniJinja detail such as `filter toyml is unknown`
pub fn extract_unknown_name(detail: &str) -> Option<&str> {
    detail
        .strip_suffix(" is unknown")
        .unwrap_or(detail)
        .split_whitespace()
        .last()
}

/// First double-quoted name in a message
pub fn extract_quoted_name(msg: &str) -> Option<&str> {
    let start = msg.find('"')? + 1;
    let len = msg[start..].find('"')?;
    Some(&msg[start..start + len])
}
