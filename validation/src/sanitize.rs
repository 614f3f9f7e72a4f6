//! Submission sanitizer
//!
//! Every string value is trimmed, stripped of `<` and `>` and truncated to a
//! fixed character cap. Nested mappings are sanitized recursively; other
//! values pass through untouched. Sanitizing never fails: oversized input is
//! clamped, not rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat key → value submission payload.
pub type Payload = Map<String, Value>;

/// Cap for task-submission field values
pub const SUBMISSION_FIELD_MAX: usize = 1000;
/// Cap for a worker name
pub const NAME_MAX: usize = 50;
/// Digits kept for a phone number
pub const PHONE_DIGITS: usize = 10;
/// Cap for an email address
pub const EMAIL_MAX: usize = 100;
/// Cap for a free-text biography
pub const BIO_MAX: usize = 500;

/// Trim, strip markup brackets and truncate to `max_chars` characters.
pub fn clean_text(value: &str, max_chars: usize) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(max_chars)
        .collect()
}

/// Sanitize a submission payload.
pub fn sanitize(raw: &Payload) -> Payload {
    raw.iter()
        .map(|(key, value)| (key.clone(), sanitize_value(value)))
        .collect()
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_text(s, SUBMISSION_FIELD_MAX)),
        Value::Object(nested) => Value::Object(sanitize(nested)),
        other => other.clone(),
    }
}

/// Dotted paths of string fields that [`sanitize`] will cut at the field cap.
pub fn truncated_fields(raw: &Payload) -> Vec<String> {
    let mut found = Vec::new();
    collect_truncated(raw, "", &mut found);
    found
}

fn collect_truncated(raw: &Payload, prefix: &str, found: &mut Vec<String>) {
    for (key, value) in raw {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::String(s) => {
                let kept = s.trim().chars().filter(|c| *c != '<' && *c != '>').count();
                if kept > SUBMISSION_FIELD_MAX {
                    found.push(path);
                }
            }
            Value::Object(nested) => collect_truncated(nested, &path, found),
            _ => {}
        }
    }
}

/// Whether every value in the payload is blank after sanitizing.
///
/// Nested mappings count as blank when all of their values are blank;
/// numbers and booleans always count as content.
pub fn is_blank_payload(payload: &Payload) -> bool {
    payload.values().all(is_blank_value)
}

fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(nested) => is_blank_payload(nested),
        Value::Array(items) => items.iter().all(is_blank_value),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Optional worker profile fields that travel with a trial submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Sanitize profile fields with their individual caps.
pub fn sanitize_profile(profile: &WorkerProfile) -> WorkerProfile {
    WorkerProfile {
        name: profile.name.as_deref().map(|n| clean_text(n, NAME_MAX)),
        phone: profile.phone.as_deref().map(sanitize_phone),
        email: profile
            .email
            .as_deref()
            .map(|e| clean_text(e, EMAIL_MAX).to_lowercase()),
        bio: profile.bio.as_deref().map(|b| clean_text(b, BIO_MAX)),
    }
}

/// Keep digits only, drop a `91` country code or `0` trunk prefix, cap at 10.
pub fn sanitize_phone(raw: &str) -> String {
    let digits = normalize_phone(raw);
    digits.chars().take(PHONE_DIGITS).collect()
}

/// Digits of a phone number with a leading `91` (12 digits) or `0` (11 digits) removed.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 12 && digits.starts_with("91") {
        digits[2..].to_string()
    } else if digits.len() == 11 && digits.starts_with('0') {
        digits[1..].to_string()
    } else {
        digits
    }
}
