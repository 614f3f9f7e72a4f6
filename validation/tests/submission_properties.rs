//! End-to-end checks over sanitize → validate for every category

use serde_json::{json, Value};
use taskmarket_validation::{sanitize, validate, Payload, TaskCategory, ValidationLimits};

fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("object payload")
}

fn check(category: TaskCategory, raw: Value) -> taskmarket_validation::ValidationOutcome {
    validate(&category, &sanitize(&payload(raw)), &ValidationLimits::default())
}

fn all_cases() -> Vec<(TaskCategory, Value)> {
    vec![
        (TaskCategory::DataEntry, json!({ "entry_0_name": "" })),
        (TaskCategory::DataEntry, json!({ "entry_0_name": "Raj" })),
        (TaskCategory::DataEntry, json!({ "entry_0_name": "r", "entry_0_phone": "1" })),
        (TaskCategory::Organization, json!({ "org_3_company": "acme" })),
        (TaskCategory::ContentWriting, json!({ "content": "too short" })),
        (
            TaskCategory::ContentWriting,
            json!({ "content": "ALL CAPS TEXT THAT GOES ON FOR A WHILE HERE" }),
        ),
        (TaskCategory::Research, json!({ "research": "brief" })),
        (TaskCategory::Communication, json!({ "message": "" })),
        (TaskCategory::Other("survey".into()), json!({ "answer": "  " })),
    ]
}

#[test]
fn test_valid_iff_no_errors() {
    for (category, raw) in all_cases() {
        let outcome = check(category.clone(), raw);
        assert_eq!(outcome.valid, outcome.errors.is_empty(), "category {}", category);
    }
}

#[test]
fn test_two_field_record_never_rejected_for_emptiness() {
    let outcome = check(
        TaskCategory::DataEntry,
        json!({
            "entry_0_name": "",
            "entry_4_name": "x",
            "entry_4_phone": "garbage",
        }),
    );
    assert!(outcome.valid);
    assert!(!outcome.warnings.is_empty());
}

#[test]
fn test_markup_only_field_is_blank_after_sanitizing() {
    let outcome = check(TaskCategory::DataEntry, json!({ "entry_0_name": " <> " }));
    assert!(!outcome.valid);
}

#[test]
fn test_content_with_ten_words_and_thirty_chars_passes() {
    let outcome = check(
        TaskCategory::ContentWriting,
        json!({ "content": "Fresh bread arrives at the corner bakery every single morning" }),
    );
    assert!(outcome.valid, "errors: {:?}", outcome.errors);
}

#[test]
fn test_content_found_without_named_key() {
    let outcome = check(
        TaskCategory::ContentWriting,
        json!({
            "paragraph_1": "Fresh bread arrives at the corner bakery",
            "paragraph_2": "every single morning before seven.",
        }),
    );
    assert!(outcome.valid, "errors: {:?}", outcome.errors);
}
