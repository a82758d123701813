/*!
 * Post-processing of accepted responses.
 *
 * Best-effort normalization: strips numbering artifacts, runs a corrective
 * name-map pass, and trims whitespace. Never fails and never changes the
 * line count.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Leading numbering/bullet artifacts: "1. ", "01) ", "1、", "2． "
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\s*[.)、．]\s*").unwrap());

/// Runs of whitespace, collapsed to a single space
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Sanitize one line: drop a leading numbering pattern and normalize
/// whitespace. Internal punctuation is left unchanged.
pub fn sanitize_line(line: &str) -> String {
    let line = LEADING_NUMBER.replace(line, "");
    WHITESPACE_RUN.replace_all(line.trim(), " ").to_string()
}

/// Corrective name-map pass for a single line.
///
/// Providers are instructed to honor the map directly, so their output is
/// authoritative whenever the mapped value already appears. Substitution only
/// runs when the key occurred in the source line, the mapped value is absent
/// from the target, and the raw key leaked through untranslated.
pub fn apply_name_map(line: &str, source: &str, name_map: &BTreeMap<String, String>) -> String {
    let mut result = line.to_string();
    for (key, value) in name_map {
        if !source.contains(key.as_str()) {
            continue;
        }
        if result.contains(value.as_str()) {
            continue;
        }
        if result.contains(key.as_str()) {
            result = result.replace(key.as_str(), value.as_str());
        }
    }
    result
}

/// Sanitize an accepted chunk response.
///
/// `source_lines` must have the same length as `lines`; positions are paired
/// for the name-map pass.
pub fn sanitize(
    lines: &[String],
    source_lines: &[&str],
    name_map: &BTreeMap<String, String>,
) -> Vec<String> {
    lines
        .iter()
        .zip(source_lines)
        .map(|(line, source)| {
            let cleaned = sanitize_line(line);
            apply_name_map(&cleaned, source, name_map)
        })
        .collect()
}
