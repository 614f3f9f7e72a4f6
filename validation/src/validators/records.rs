//! Record-style categories (data entry, organization).
//!
//! A record with two or more filled fields is a complete attempt, a record
//! with exactly one is partial and draws a warning. The submission is only
//! rejected when no record has any content at all.

use crate::outcome::ValidationOutcome;
use crate::records::extract_records;
use crate::sanitize::Payload;

use super::fields::check_field;

/// Fields needed for a record to count as complete.
pub const COMPLETE_FIELDS: usize = 2;

/// How a record-style category is laid out and described.
#[derive(Debug, Clone, Copy)]
pub struct RecordStyle {
    /// Key prefix (`entry` in `entry_0_name`)
    pub kind: &'static str,
    /// Label used in messages (`Entry 1`)
    pub label: &'static str,
    /// Blocking message when nothing was attempted
    pub empty_error: &'static str,
}

pub const DATA_ENTRY: RecordStyle = RecordStyle {
    kind: "entry",
    label: "Entry",
    empty_error: "Please attempt at least one data entry (fill in at least one field)",
};

pub const ORGANIZATION: RecordStyle = RecordStyle {
    kind: "org",
    label: "Record",
    empty_error: "Please attempt at least one organization record (fill in at least one field)",
};

/// Validate the indexed records of a record-style submission.
pub fn validate_records(payload: &Payload, style: RecordStyle) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::new();
    let records = extract_records(payload, style.kind);

    if records.is_empty() {
        outcome.error(style.empty_error);
        return outcome;
    }

    for record in &records {
        let label = format!("{} {}", style.label, record.number());

        if record.fields_with_content < COMPLETE_FIELDS {
            outcome.warn(format!(
                "{} is partial: only {} field filled in, add more for full credit",
                label, record.fields_with_content
            ));
        }

        for (field, value) in record.filled() {
            if let Some(warning) = check_field(&label, field, value) {
                outcome.warn(warning);
            }
        }
    }

    outcome
}
