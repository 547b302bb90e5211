//! Pattern matching
//!
//! Pure predicates deciding whether a page URL is allow-listed and whether
//! an element's visible text matches one of the configured labels.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::{Error, Result};

/// Collapse whitespace runs to a single space, trim and lower-case.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Compile a glob-style pattern into an anchored, case-insensitive regex.
///
/// Every regex metacharacter is escaped; `*` becomes "any run of characters".
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let body = pattern
        .trim()
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Returns true iff any non-blank pattern fully matches `url`.
///
/// An empty or all-blank pattern list never matches. Patterns that fail to
/// compile are logged and skipped.
pub fn matches_allowlist<S: AsRef<str>>(url: &str, patterns: &[S]) -> bool {
    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        if pattern.is_empty() {
            continue;
        }
        match compile_pattern(pattern) {
            Ok(re) if re.is_match(url) => return true,
            Ok(_) => {}
            Err(e) => warn!("Ignoring allowlist entry: {}", e),
        }
    }
    false
}

/// Returns true if `text` matches any of `labels`.
///
/// After normalization a label matches when the text equals it, starts with
/// `label + " "`, or contains it as a space-padded word run.
pub fn matches_label<S: AsRef<str>>(text: &str, labels: &[S]) -> bool {
    let text = normalize_text(text);
    if text.is_empty() {
        return false;
    }
    let padded_text = format!(" {} ", text);

    labels.iter().any(|label| {
        let label = normalize_text(label.as_ref());
        if label.is_empty() {
            return false;
        }
        text == label
            || text.starts_with(&format!("{} ", label))
            || padded_text.contains(&format!(" {} ", label))
    })
}
