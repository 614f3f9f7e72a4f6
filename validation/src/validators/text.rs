//! Single required text field (research, communication).
//!
//! No partial credit here: the text either reaches the minimum length or the
//! submission is rejected.

use crate::outcome::ValidationOutcome;

use super::ValidationLimits;

/// Minimum-length rule for one text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRule {
    /// What the field is called in messages
    pub subject: &'static str,
    /// Blocking message for a blank field
    pub empty_error: &'static str,
    pub min_chars: usize,
}

impl TextRule {
    pub fn research(limits: &ValidationLimits) -> Self {
        Self {
            subject: "Research write-up",
            empty_error: "Research findings are required",
            min_chars: limits.research_min_chars,
        }
    }

    pub fn communication(limits: &ValidationLimits) -> Self {
        Self {
            subject: "Message",
            empty_error: "Message is required",
            min_chars: limits.communication_min_chars,
        }
    }
}

pub fn validate_required_text(text: &str, rule: TextRule) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::new();
    let chars = text.trim().chars().count();

    if chars == 0 {
        outcome.error(rule.empty_error);
    } else if chars < rule.min_chars {
        outcome.error(format!(
            "{} is too short: {} characters (minimum {})",
            rule.subject, chars, rule.min_chars
        ));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_minimum() {
        let rule = TextRule::research(&ValidationLimits::default());
        assert!(!validate_required_text(&"x".repeat(99), rule).valid);
        assert!(validate_required_text(&"x".repeat(100), rule).valid);
    }

    #[test]
    fn test_communication_minimum() {
        let rule = TextRule::communication(&ValidationLimits::default());
        let outcome = validate_required_text("Thanks, noted.", rule);
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("minimum 30"));
        assert!(validate_required_text("Thank you, I will call you back on Monday.", rule).valid);
    }

    #[test]
    fn test_empty_text() {
        let limits = ValidationLimits::default();
        let outcome = validate_required_text("  ", TextRule::communication(&limits));
        assert_eq!(outcome.errors, vec!["Message is required".to_string()]);
    }
}
