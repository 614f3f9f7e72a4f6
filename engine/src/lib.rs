//! Taskmarket Engine - trial submissions and skill badges
//!
//! Decides whether a worker's trial submission is acceptable, turns passing
//! results into per-category badges, and gates paid tasks on badge tier.
//!
//! ## Flow
//!
//! ```text
//! Submission
//!     ↓
//! RateLimiter (origin + worker, sliding window)
//!     ↓
//! SubmissionGatekeeper (structure, task lookup, category validation, duplicates)
//!     ↓
//! SubmissionScorer (external)
//!     ↓
//! BadgeLedger (award / accumulate, per-key serialised)
//!     ↓
//! BadgeStore (memory or SQLite)
//! ```
//!
//! ## Tiers
//!
//! | Tier     | Tasks | Average rating |
//! |----------|-------|----------------|
//! | Platinum | 30+   | 4.8+           |
//! | Gold     | 15+   | 4.7+           |
//! | Silver   | 5+    | 4.5+           |
//! | Bronze   | any   | any            |
//!
//! The tier is recomputed from the counts on every mutation; the stored level
//! is only a cache.

pub mod collaborators;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod gatekeeper;
pub mod identity;
pub mod ledger;
pub mod pipeline;
pub mod rate_limit;

// Re-exports
pub use collaborators::{
    ScoreReport, ScoringRequest, SubmissionHistory, SubmissionScorer, TaskDirectory, TaskRecord,
};
pub use config::EngineConfig;
pub use eligibility::{Difficulty, Eligibility, EligibilityGate};
pub use error::{EngineError, Result};
pub use events::{
    spawn_listener, spawn_logging_listener, EngineEvent, EventBus, EventListener,
    LoggingEventListener,
};
pub use gatekeeper::{
    Admission, RejectionReason, Submission, SubmissionGatekeeper, SubmissionVerdict,
};
pub use identity::{IdentityPolicy, WorkerIdentity};
pub use ledger::{
    AccumulateOutcome, AwardInput, AwardOutcome, BadgeLedger, BadgeLevel, BadgeStore, BadgeSummary,
    CategoryBadge, LeaderboardEntry, MemoryBadgeStore, SqliteBadgeStore,
};
pub use pipeline::{TrialPipeline, TrialResult};
pub use rate_limit::{RateLimiter, RetryAfter};
pub use taskmarket_validation::{TaskCategory, ValidationOutcome};
