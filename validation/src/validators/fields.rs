//! Advisory checks on individual record fields.
//!
//! None of these block a submission; each returns an optional warning.

use crate::sanitize::normalize_phone;

/// Kind of field, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Phone,
    Email,
    Name,
    Other,
}

impl FieldKind {
    pub fn of(field: &str) -> Self {
        let field = field.to_ascii_lowercase();
        if field.contains("phone") || field.contains("mobile") {
            FieldKind::Phone
        } else if field.contains("email") {
            FieldKind::Email
        } else if field.contains("name") || field.contains("company") {
            FieldKind::Name
        } else {
            FieldKind::Other
        }
    }
}

/// Warning for a filled field, if it looks off.
pub fn check_field(label: &str, field: &str, value: &str) -> Option<String> {
    match FieldKind::of(field) {
        FieldKind::Phone => check_phone(value)
            .map(|issue| format!("{}: phone '{}' {}", label, value, issue)),
        FieldKind::Email => check_email(value)
            .map(|issue| format!("{}: email '{}' {}", label, value, issue)),
        FieldKind::Name => check_name(value)
            .map(|issue| format!("{}: {} '{}' {}", label, field, value, issue)),
        FieldKind::Other => None,
    }
}

/// Expect 10 digits starting with 6-9 once country/trunk prefixes are removed.
pub fn check_phone(value: &str) -> Option<&'static str> {
    let digits = normalize_phone(value);
    if digits.len() != 10 {
        return Some("should have 10 digits");
    }
    match digits.chars().next() {
        Some('6'..='9') => None,
        _ => Some("should start with 6, 7, 8 or 9"),
    }
}

pub fn check_email(value: &str) -> Option<&'static str> {
    if value.contains('@') && value.contains('.') {
        None
    } else {
        Some("should contain '@' and '.'")
    }
}

pub fn check_name(value: &str) -> Option<&'static str> {
    if value.chars().count() < 2 {
        return Some("looks too short");
    }
    let has_letters = value.chars().any(char::is_alphabetic);
    if has_letters && value == value.to_lowercase() {
        return Some("should be capitalised");
    }
    None
}
