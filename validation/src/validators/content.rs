//! Free-text content writing.

use std::collections::HashSet;

use crate::outcome::ValidationOutcome;

use super::ValidationLimits;

/// Case checks only apply to text longer than this many characters.
const CASE_CHECK_MIN_CHARS: usize = 20;
/// Vocabulary check applies above this many words.
const REPETITION_CHECK_MIN_WORDS: usize = 20;
/// Minimum unique/total word ratio before warning about repetition.
const MIN_UNIQUE_RATIO: f64 = 0.5;
/// Sentence check applies above this many words.
const SENTENCE_CHECK_MIN_WORDS: usize = 15;
/// Texts under this many words are nudged to expand.
const SUGGESTED_MIN_WORDS: usize = 30;

/// Validate a content-writing submission.
///
/// Blocking: empty, fewer than `content_min_chars` characters or fewer than
/// `content_min_words` words. Everything else is advisory.
pub fn validate_content(text: &str, limits: &ValidationLimits) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::new();
    let text = text.trim();

    if text.is_empty() {
        outcome.error("Content is required: please write something before submitting");
        return outcome;
    }

    let chars = text.chars().count();
    let words: Vec<&str> = text.split_whitespace().collect();

    if chars < limits.content_min_chars {
        outcome.error(format!(
            "Content is too short: {} characters (minimum {})",
            chars, limits.content_min_chars
        ));
    }
    if words.len() < limits.content_min_words {
        outcome.error(format!(
            "Content is too short: {} words (minimum {})",
            words.len(),
            limits.content_min_words
        ));
    }

    if chars > limits.content_max_chars {
        outcome.warn(format!(
            "Content is very long ({} characters); consider keeping it under {}",
            chars, limits.content_max_chars
        ));
    }

    if chars > CASE_CHECK_MIN_CHARS && text.chars().any(char::is_alphabetic) {
        if text == text.to_uppercase() {
            outcome.warn("Content is written entirely in capital letters");
        } else if text == text.to_lowercase() {
            outcome.warn("Content is written entirely in lower case; use proper capitalisation");
        }
    }

    if words.len() > REPETITION_CHECK_MIN_WORDS {
        let ratio = unique_ratio(&words);
        if ratio < MIN_UNIQUE_RATIO {
            outcome.warn(format!(
                "Content repeats a lot of words ({:.0}% unique); try more varied wording",
                ratio * 100.0
            ));
        }
    }

    if words.len() > SENTENCE_CHECK_MIN_WORDS && count_sentences(text) < 2 {
        outcome.warn("Content reads as a single sentence; split it into at least two");
    }

    if words.len() < SUGGESTED_MIN_WORDS {
        outcome.warn(format!(
            "Content has {} words; expanding to {} or more usually scores better",
            words.len(),
            SUGGESTED_MIN_WORDS
        ));
    }

    outcome
}

/// Unique words / total words, case-insensitive and ignoring punctuation.
pub fn unique_ratio(words: &[&str]) -> f64 {
    if words.is_empty() {
        return 1.0;
    }
    let unique: HashSet<String> = words
        .iter()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .collect();
    unique.len() as f64 / words.len() as f64
}

/// Sentences separated by `.`, `!` or `?` that contain at least one alphanumeric.
pub fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        let pool = [
            "Local", "markets", "open", "early", "every", "morning", "selling", "fresh",
            "vegetables", "fruit", "spices", "and", "grain", "to", "busy", "families",
        ];
        (0..n).map(|i| pool[i % pool.len()]).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_is_blocking() {
        let outcome = validate_content("   ", &ValidationLimits::default());
        assert!(!outcome.valid);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_nine_words_blocked_ten_words_pass() {
        let limits = ValidationLimits::default();

        let nine = validate_content(&words(9), &limits);
        assert!(!nine.valid);
        assert!(nine.errors.iter().any(|e| e.contains("9 words")));

        let ten = words(10);
        assert!(ten.chars().count() >= 30);
        let outcome = validate_content(&ten, &limits);
        assert!(outcome.valid, "unexpected errors: {:?}", outcome.errors);
    }

    #[test]
    fn test_too_few_characters_blocked() {
        let outcome = validate_content("a b c d e f g h i j k", &ValidationLimits::default());
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("characters"));
    }

    #[test]
    fn test_short_text_gets_expand_warning() {
        let outcome = validate_content(&words(12), &ValidationLimits::default());
        assert!(outcome.valid);
        assert!(outcome.warnings.iter().any(|w| w.contains("expanding")));
    }

    #[test]
    fn test_uppercase_warning() {
        let text = words(12).to_uppercase();
        let outcome = validate_content(&text, &ValidationLimits::default());
        assert!(outcome.valid);
        assert!(outcome.warnings.iter().any(|w| w.contains("capital letters")));
    }

    #[test]
    fn test_repetition_and_single_sentence_warnings() {
        let text = ["Buy now"; 15].join(" ");
        let outcome = validate_content(&text, &ValidationLimits::default());
        assert!(outcome.valid);
        assert!(outcome.warnings.iter().any(|w| w.contains("repeats")));
        assert!(outcome.warnings.iter().any(|w| w.contains("single sentence")));
    }

    #[test]
    fn test_well_formed_text_has_no_warnings() {
        let text = "Our neighbourhood library reopened this week after a long renovation. \
            Families can borrow picture books, attend weekend reading circles and use \
            the new computer corner. Volunteers explain membership rules at the front desk, \
            while librarians run short workshops on research skills for older students.";
        let outcome = validate_content(text, &ValidationLimits::default());
        assert!(outcome.valid);
        assert!(outcome.warnings.is_empty(), "unexpected warnings: {:?}", outcome.warnings);
    }

    #[test]
    fn test_over_max_length_only_warns() {
        let limits = ValidationLimits {
            content_max_chars: 100,
            ..Default::default()
        };
        let text = words(40) + ". " + &words(40) + ".";
        let outcome = validate_content(&text, &limits);
        assert!(outcome.valid);
        assert!(outcome.warnings.iter().any(|w| w.contains("very long")));
    }

    #[test]
    fn test_sentence_count() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("No terminator"), 1);
        assert_eq!(count_sentences("..."), 0);
    }
}
