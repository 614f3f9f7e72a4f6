//! Indexed-record extraction
//!
//! Workers submit repeated structures as flat keys of the form
//! `<kind>_<index>_<field>` (for example `entry_0_name`, `entry_0_phone`,
//! `entry_1_name`). This module groups those keys back into an ordered list
//! of records so validators never parse key strings themselves.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::sanitize::Payload;

/// One logical record recovered from a flat payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedRecord {
    /// Index taken from the key (`entry_3_name` → 3)
    pub index: usize,
    /// Field name → trimmed value, including blank fields
    pub fields: BTreeMap<String, String>,
    /// Number of fields with non-blank content
    pub fields_with_content: usize,
}

impl IndexedRecord {
    /// Value of a field if it has content.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Fields that have content, in field-name order.
    pub fn filled(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 1-based position for user-facing messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Split `<kind>_<index>_<field>` into `(index, field)` when `kind` matches.
fn parse_key<'a>(key: &'a str, kind: &str) -> Option<(usize, &'a str)> {
    let rest = key.strip_prefix(kind)?.strip_prefix('_')?;
    let (index, field) = rest.split_once('_')?;
    if field.is_empty() {
        return None;
    }
    let index = index.parse::<usize>().ok()?;
    Some((index, field))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Extract the present records of `kind`, ordered by index.
///
/// Every index up to the highest one seen is considered, in order; an index
/// whose fields are all blank (or that has no keys at all) is skipped rather
/// than reported.
pub fn extract_records(payload: &Payload, kind: &str) -> Vec<IndexedRecord> {
    let mut grouped: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();

    for (key, value) in payload {
        if let Some((index, field)) = parse_key(key, kind) {
            grouped
                .entry(index)
                .or_default()
                .insert(field.to_string(), value_text(value));
        }
    }

    grouped
        .into_iter()
        .filter_map(|(index, fields)| {
            let fields_with_content = fields.values().filter(|v| !v.is_empty()).count();
            (fields_with_content > 0).then_some(IndexedRecord {
                index,
                fields,
                fields_with_content,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_groups_by_index_in_order() {
        let records = extract_records(
            &payload(json!({
                "entry_1_name": "Meera",
                "entry_0_name": "Raj",
                "entry_0_phone": "9876543210",
                "entry_10_name": "Anil",
            })),
            "entry",
        );
        let indices: Vec<usize> = records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 10]);
        assert_eq!(records[0].fields_with_content, 2);
        assert_eq!(records[0].get("phone"), Some("9876543210"));
    }

    #[test]
    fn test_skips_blank_indices() {
        let records = extract_records(
            &payload(json!({
                "entry_0_name": "   ",
                "entry_0_email": "",
                "entry_1_name": "Raj",
            })),
            "entry",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[0].number(), 2);
    }

    #[test]
    fn test_field_names_may_contain_underscores() {
        let records = extract_records(&payload(json!({ "org_0_company_name": "Acme" })), "org");
        assert_eq!(records[0].get("company_name"), Some("Acme"));
    }

    #[test]
    fn test_ignores_other_kinds_and_malformed_keys() {
        let records = extract_records(
            &payload(json!({
                "org_0_name": "Acme",
                "entry_x_name": "bad index",
                "entry_2_": "no field",
                "entrypoint_0_name": "wrong kind",
                "content": "free text",
            })),
            "entry",
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_numbers_count_as_content() {
        let records = extract_records(&payload(json!({ "entry_0_age": 31 })), "entry");
        assert_eq!(records[0].fields_with_content, 1);
    }
}
