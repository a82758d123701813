/*!
 * Response contract validation.
 *
 * A provider response is untrusted until it passes, in order: JSON decoding
 * into an array of strings, an exact line-count check, and a residual
 * source-script scan. The first failing check classifies the rejection.
 * Accepted output is returned verbatim; sanitization is a separate stage and
 * must not happen here.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::RejectionReason;

/// CJK Unified Ideographs, the common range
static CJK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4E00}-\u{9FFF}]").unwrap());

/// Extended CJK coverage: Unified Ideographs, Extension A, Compatibility
/// Ideographs and Extension B
static CJK_EXTENDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{4E00}-\u{9FFF}\u{3400}-\u{4DBF}\u{F900}-\u{FAFF}\u{20000}-\u{2A6DF}]")
        .unwrap()
});

/// Opening or closing markdown code fence, optionally tagged (```json)
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[a-zA-Z]*\s*\n?|\n?```\s*$").unwrap());

/// Check whether text contains source-script (CJK) characters
pub fn contains_source_script(text: &str, strict: bool) -> bool {
    let pattern = if strict { &CJK_EXTENDED } else { &CJK };
    pattern.is_match(text)
}

/// Strip a surrounding markdown code fence, which providers sometimes wrap
/// around the array despite instructions
fn strip_code_fence(raw: &str) -> String {
    CODE_FENCE.replace_all(raw.trim(), "").trim().to_string()
}

/// Validate a raw provider response against the chunk's expected shape.
///
/// `source_lines` provides both the expected count and the empty-line
/// exception: a position whose source was blank accepts an empty output
/// regardless of the script check.
pub fn validate(
    raw: &str,
    source_lines: &[&str],
    strict: bool,
) -> Result<Vec<String>, RejectionReason> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(RejectionReason::Other);
    }

    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|_| RejectionReason::InvalidFormat)?;

    let array = value.as_array().ok_or(RejectionReason::InvalidFormat)?;
    let mut lines = Vec::with_capacity(array.len());
    for element in array {
        match element.as_str() {
            Some(s) => lines.push(s.to_string()),
            None => return Err(RejectionReason::InvalidFormat),
        }
    }

    if lines.len() != source_lines.len() {
        return Err(RejectionReason::WrongCount);
    }

    for (line, source) in lines.iter().zip(source_lines) {
        if source.trim().is_empty() && line.trim().is_empty() {
            continue;
        }
        if contains_source_script(line.trim(), strict) {
            return Err(RejectionReason::ResidualSourceScript);
        }
    }

    Ok(lines)
}
