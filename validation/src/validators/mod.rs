//! Per-category submission validators
//!
//! Each validator takes a sanitized payload and returns a
//! [`ValidationOutcome`]. Only a completely empty attempt is blocking for the
//! record and content categories; everything short of that is a warning.

pub mod content;
pub mod fields;
pub mod records;
pub mod text;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::category::TaskCategory;
use crate::outcome::ValidationOutcome;
use crate::sanitize::{is_blank_payload, Payload};

/// Length thresholds used by the text validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Minimum characters for content writing
    pub content_min_chars: usize,
    /// Minimum words for content writing
    pub content_min_words: usize,
    /// Content longer than this only draws a warning.
    ///
    /// Measured on the sanitized text, so a single field can never exceed
    /// the per-field cap; the warning is reached by the joined text of a
    /// multi-field submission.
    pub content_max_chars: usize,
    /// Minimum characters for a research write-up
    pub research_min_chars: usize,
    /// Minimum characters for a communication reply
    pub communication_min_chars: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            content_min_chars: 30,
            content_min_words: 10,
            content_max_chars: 10_000,
            research_min_chars: 100,
            communication_min_chars: 30,
        }
    }
}

/// Run the validator for `category` against a sanitized payload.
pub fn validate(
    category: &TaskCategory,
    payload: &Payload,
    limits: &ValidationLimits,
) -> ValidationOutcome {
    let outcome = match category {
        TaskCategory::DataEntry => records::validate_records(payload, records::DATA_ENTRY),
        TaskCategory::Organization => records::validate_records(payload, records::ORGANIZATION),
        TaskCategory::ContentWriting => {
            content::validate_content(&primary_text(payload, &["content", "text"]), limits)
        }
        TaskCategory::Research => text::validate_required_text(
            &primary_text(payload, &["research", "findings", "content"]),
            text::TextRule::research(limits),
        ),
        TaskCategory::Communication => text::validate_required_text(
            &primary_text(payload, &["message", "response", "content"]),
            text::TextRule::communication(limits),
        ),
        TaskCategory::Other(_) => validate_generic(payload),
    };

    debug!(
        category = %category,
        errors = outcome.errors.len(),
        warnings = outcome.warnings.len(),
        "Category validation finished"
    );

    outcome
}

/// Fallback for unknown categories: reject only a fully empty payload.
pub fn validate_generic(payload: &Payload) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::new();
    if is_blank_payload(payload) {
        outcome.error("Submission is empty: please fill in at least one field");
    }
    outcome
}

/// The free-text body of a submission.
///
/// Returns the first of `keys` holding non-blank text; otherwise joins every
/// non-blank top-level string value in key order.
pub fn primary_text(payload: &Payload, keys: &[&str]) -> String {
    for key in keys {
        if let Some(Value::String(s)) = payload.get(*key) {
            if !s.trim().is_empty() {
                return s.trim().to_string();
            }
        }
    }

    payload
        .values()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_primary_text_prefers_named_key() {
        let p = payload(json!({ "content": "main body", "notes": "aside" }));
        assert_eq!(primary_text(&p, &["content"]), "main body");
    }

    #[test]
    fn test_primary_text_falls_back_to_all_strings() {
        let p = payload(json!({ "a": "first", "b": "  ", "c": "second", "n": 4 }));
        assert_eq!(primary_text(&p, &["content"]), "first\nsecond");
    }

    #[test]
    fn test_generic_fallback() {
        let other = TaskCategory::Other("translation".into());
        let limits = ValidationLimits::default();
        assert!(!validate(&other, &payload(json!({ "x": "" })), &limits).valid);
        assert!(validate(&other, &payload(json!({ "x": "done" })), &limits).valid);
    }

    #[test]
    fn test_dispatch_research_uses_findings_key() {
        let limits = ValidationLimits::default();
        let p = payload(json!({ "findings": "a".repeat(120) }));
        assert!(validate(&TaskCategory::Research, &p, &limits).valid);
    }
}
