//! Taskmarket Validation - trial task submission checks
//!
//! Pure functions that run before a trial submission is scored:
//!
//! - **Sanitizer**: trims, strips markup brackets and caps every free-form value
//! - **Indexed records**: rebuilds `entry_0_name`-style flat keys into ordered records
//! - **Category validators**: one strategy per task category, producing blocking
//!   errors and advisory warnings
//!
//! ## Partial credit
//!
//! Messy-but-present data never fails closed. A record or text attempt with at
//! least one meaningful field degrades to a warning; only a completely empty
//! submission is a blocking error.
//!
//! ```text
//! raw payload ──► sanitize ──► extract_records ──► validate(category) ──► ValidationOutcome
//! ```

pub mod category;
pub mod outcome;
pub mod records;
pub mod sanitize;
pub mod validators;

// Re-exports
pub use category::TaskCategory;
pub use outcome::ValidationOutcome;
pub use records::{extract_records, IndexedRecord};
pub use sanitize::{
    sanitize, sanitize_profile, truncated_fields, Payload, WorkerProfile, SUBMISSION_FIELD_MAX,
};
pub use validators::{validate, ValidationLimits};
