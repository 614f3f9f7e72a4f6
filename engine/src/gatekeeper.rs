//! Submission gatekeeper
//!
//! Runs the full pre-scoring pass over one submission:
//!
//! 1. Structural checks, all collected without short-circuiting
//! 2. Task lookup; a missing or inactive task skips category validation
//! 3. Category validation against the sanitized work
//! 4. Duplicate suppression for durable workers only
//!
//! The task lookup and the duplicate lookup are independent and run
//! concurrently. Sanitization always runs, whatever the outcome.
//!
//! Category validators only ever see the sanitized work, where every
//! string field is already capped at [`SUBMISSION_FIELD_MAX`] characters.
//! Cut fields are reported as warnings here, against the raw work.
//! The content length warning (`content_max_chars`) applies to the
//! joined text of all fields, so it still fires for long multi-field
//! submissions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskmarket_validation::{
    sanitize, sanitize_profile, truncated_fields, validate, Payload, TaskCategory, ValidationLimits,
    ValidationOutcome, WorkerProfile, SUBMISSION_FIELD_MAX,
};
use tracing::{debug, warn};

use crate::collaborators::{SubmissionHistory, TaskDirectory, TaskRecord};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventBus};
use crate::identity::{IdentityPolicy, WorkerIdentity};
use crate::rate_limit::RateLimiter;

/// Inbound trial submission, as decoded from the request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub worker_id: String,
    /// Category the client believes it is submitting for
    #[serde(default)]
    pub category: Option<TaskCategory>,
    /// Must be a non-empty mapping
    #[serde(default)]
    pub submitted_work: Value,
    /// Minutes; must be a number in range
    #[serde(default)]
    pub time_spent: Value,
    #[serde(default)]
    pub profile: Option<WorkerProfile>,
}

/// Machine-readable reason a submission was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Malformed submission shape
    Structural,
    TaskNotFound,
    TaskInactive,
    /// Category validation failed
    Content,
    /// Same worker and task within the duplicate window
    DuplicateSubmission,
}

impl RejectionReason {
    /// Policy rejections mean "try a different task" rather than "fix your input"
    pub fn is_policy(self) -> bool {
        matches!(self, RejectionReason::DuplicateSubmission)
    }
}

/// Everything the gatekeeper decided about one submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionVerdict {
    /// Worker id with surrounding whitespace removed
    pub worker_id: String,
    pub outcome: ValidationOutcome,
    pub reasons: Vec<RejectionReason>,
    pub identity: WorkerIdentity,
    /// Task record, when the lookup found one
    pub task: Option<TaskRecord>,
    pub time_spent_minutes: Option<f64>,
    pub sanitized_work: Payload,
    pub sanitized_profile: Option<WorkerProfile>,
}

impl SubmissionVerdict {
    pub fn is_valid(&self) -> bool {
        self.outcome.valid
    }
}

/// Rate-limited entry point result
#[derive(Debug, Clone)]
pub enum Admission {
    Reviewed(Box<SubmissionVerdict>),
    /// Too many attempts from this origin and worker
    Throttled { retry_after_secs: u64 },
}

/// Submission gatekeeper
pub struct SubmissionGatekeeper {
    tasks: Arc<dyn TaskDirectory>,
    history: Arc<dyn SubmissionHistory>,
    identity: IdentityPolicy,
    limiter: RateLimiter,
    limits: ValidationLimits,
    duplicate_window_hours: u32,
    max_time_spent: f64,
    events: Arc<EventBus>,
}

impl SubmissionGatekeeper {
    pub fn new(
        config: &EngineConfig,
        tasks: Arc<dyn TaskDirectory>,
        history: Arc<dyn SubmissionHistory>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            tasks,
            history,
            identity: IdentityPolicy::new(&config.identity),
            limiter: RateLimiter::new(&config.rate_limit),
            limits: config.validation.clone(),
            duplicate_window_hours: config.submission.duplicate_window_hours,
            max_time_spent: config.submission.max_time_spent_minutes,
            events,
        }
    }

    pub fn identity_policy(&self) -> &IdentityPolicy {
        &self.identity
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Apply the rate limit for `origin`, then review.
    pub async fn admit(&self, origin: &str, submission: &Submission) -> Result<Admission> {
        let worker_id = submission.worker_id.trim();
        if let Err(retry) = self.limiter.check(origin, worker_id) {
            self.events.emit(EngineEvent::SubmissionThrottled {
                worker_id: worker_id.to_string(),
                origin: origin.to_string(),
                retry_after_secs: retry.secs,
            });
            return Ok(Admission::Throttled {
                retry_after_secs: retry.secs,
            });
        }
        Ok(Admission::Reviewed(Box::new(self.review(submission).await?)))
    }

    /// Review one submission. `Err` only for collaborator faults.
    pub async fn review(&self, submission: &Submission) -> Result<SubmissionVerdict> {
        let mut outcome = ValidationOutcome::new();
        let mut reasons = Vec::new();

        // 1. Structural checks
        let task_id = submission.task_id.trim();
        let worker_id = submission.worker_id.trim();
        let work = submission.submitted_work.as_object();
        let time_spent = submission.time_spent.as_f64().filter(|t| t.is_finite());

        let structural = structural_errors(
            task_id,
            work,
            &submission.time_spent,
            time_spent,
            self.max_time_spent,
        );
        if !structural.is_empty() {
            reasons.push(RejectionReason::Structural);
            for error in structural {
                outcome.error(error);
            }
        }

        let identity = self.identity.classify(worker_id);
        let sanitized_work = work.map(sanitize).unwrap_or_default();
        for field in work.map(truncated_fields).unwrap_or_default() {
            outcome.warn(format!(
                "Field '{}' was longer than {} characters and was truncated",
                field, SUBMISSION_FIELD_MAX
            ));
        }
        let sanitized_profile = submission.profile.as_ref().map(sanitize_profile);

        // 2 + 4. Independent lookups
        let has_task_id = !task_id.is_empty();
        let check_duplicate = has_task_id && identity.is_durable();
        let (task, duplicate) = tokio::try_join!(
            async {
                if has_task_id {
                    self.tasks.get_task(task_id).await
                } else {
                    Ok(None)
                }
            },
            async {
                if check_duplicate {
                    self.history
                        .has_recent_submission(worker_id, task_id, self.duplicate_window_hours)
                        .await
                } else {
                    Ok::<_, EngineError>(false)
                }
            },
        )?;

        // 2 + 3. Referential check, then category validation
        match &task {
            None if has_task_id => {
                outcome.error(format!("Task '{}' was not found", task_id));
                reasons.push(RejectionReason::TaskNotFound);
            }
            None => {}
            Some(record) if !record.is_active => {
                outcome.error(format!("Task '{}' is no longer active", task_id));
                reasons.push(RejectionReason::TaskInactive);
            }
            Some(record) => {
                if let Some(claimed) = &submission.category {
                    if claimed != &record.category {
                        outcome.warn(format!(
                            "Submitted as '{}' but task '{}' is '{}'; validated as '{}'",
                            claimed, task_id, record.category, record.category
                        ));
                    }
                }
                let category_outcome = validate(&record.category, &sanitized_work, &self.limits);
                if !category_outcome.valid {
                    reasons.push(RejectionReason::Content);
                }
                outcome.merge(category_outcome);
            }
        }

        // 4. Duplicate suppression
        if duplicate {
            warn!(
                worker_id = %worker_id,
                task_id = %task_id,
                "Duplicate submission within window"
            );
            outcome.error(format!(
                "You already submitted this task in the last {} hours; please try a different task",
                self.duplicate_window_hours
            ));
            reasons.push(RejectionReason::DuplicateSubmission);
        }

        debug!(
            worker_id = %worker_id,
            task_id = %task_id,
            identity = ?identity,
            valid = outcome.valid,
            errors = outcome.errors.len(),
            warnings = outcome.warnings.len(),
            "Submission reviewed"
        );
        self.events.emit(EngineEvent::SubmissionReviewed {
            worker_id: worker_id.to_string(),
            task_id: task_id.to_string(),
            valid: outcome.valid,
            errors: outcome.errors.len(),
            warnings: outcome.warnings.len(),
        });

        Ok(SubmissionVerdict {
            worker_id: worker_id.to_string(),
            outcome,
            reasons,
            identity,
            task,
            time_spent_minutes: time_spent,
            sanitized_work,
            sanitized_profile,
        })
    }
}

fn structural_errors(
    task_id: &str,
    work: Option<&Payload>,
    raw_time_spent: &Value,
    time_spent: Option<f64>,
    max_time_spent: f64,
) -> Vec<String> {
    let mut errors = Vec::new();

    if task_id.is_empty() {
        errors.push("Task id is required".to_string());
    }

    match work {
        None => errors.push("Submitted work must be a set of fields".to_string()),
        Some(fields) if fields.is_empty() => errors.push("Submitted work is empty".to_string()),
        Some(_) => {}
    }

    match time_spent {
        None if raw_time_spent.is_null() => errors.push("Time spent is required".to_string()),
        None => errors.push("Time spent must be a number of minutes".to_string()),
        Some(minutes) if !(0.0..=max_time_spent).contains(&minutes) => errors.push(format!(
            "Time spent must be between 0 and {} minutes",
            max_time_spent
        )),
        Some(_) => {}
    }

    errors
}
