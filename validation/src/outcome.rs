//! Result of a validation pass.

use serde::{Deserialize, Serialize};

/// Blocking errors plus advisory warnings.
///
/// `valid` is always `errors.is_empty()`; warnings never affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// An empty, valid outcome.
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }

    /// Add a blocking error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.valid = false;
    }

    /// Add an advisory warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Append another outcome's errors and warnings, preserving order.
    pub fn merge(&mut self, other: ValidationOutcome) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self::new()
    }
}
