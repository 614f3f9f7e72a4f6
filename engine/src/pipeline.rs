//! Trial pipeline
//!
//! Wires the pieces into the trial-task flow:
//!
//! ```text
//! rate limiter → gatekeeper → scorer → badge ledger
//! ```
//!
//! The eligibility gate hangs off the same ledger and is consulted
//! independently when a worker applies to a paid task.
//!
//! Provisional workers earn badges under their provisional id unless
//! `submission.award_provisional` is off.

use std::sync::Arc;

use serde::Serialize;
use taskmarket_validation::TaskCategory;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborators::{
    ScoreReport, ScoringRequest, SubmissionHistory, SubmissionScorer, TaskDirectory,
};
use crate::config::EngineConfig;
use crate::eligibility::{Difficulty, Eligibility, EligibilityGate};
use crate::error::Result;
use crate::events::{spawn_listener, EventBus, LoggingEventListener};
use crate::gatekeeper::{Admission, Submission, SubmissionGatekeeper, SubmissionVerdict};
use crate::ledger::{
    earned_by, AccumulateOutcome, AwardInput, AwardOutcome, BadgeLedger, BadgeStore,
    SubmissionQuality,
};

/// What happened to one trial submission
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialResult {
    /// Rate limit hit; nothing was reviewed
    Throttled { retry_after_secs: u64 },
    /// Gatekeeper rejected the submission; the scorer was not called
    Rejected { verdict: Box<SubmissionVerdict> },
    /// Scored; `award` is set when a passing score earned or advanced a badge
    Scored {
        verdict: Box<SubmissionVerdict>,
        score: ScoreReport,
        award: Option<AwardOutcome>,
    },
}

/// Trial-task engine with its collaborators
pub struct TrialPipeline {
    gatekeeper: SubmissionGatekeeper,
    scorer: Arc<dyn SubmissionScorer>,
    ledger: Arc<BadgeLedger>,
    eligibility: EligibilityGate,
    events: Arc<EventBus>,
    award_provisional: bool,
    /// Background event logger, when `events.log_events` is set
    listener: Option<JoinHandle<()>>,
}

impl TrialPipeline {
    pub fn new(
        config: &EngineConfig,
        tasks: Arc<dyn TaskDirectory>,
        history: Arc<dyn SubmissionHistory>,
        scorer: Arc<dyn SubmissionScorer>,
        store: Arc<dyn BadgeStore>,
    ) -> Result<Self> {
        config.validate()?;

        let events = Arc::new(EventBus::with_capacity(config.events.capacity));
        let ledger = Arc::new(BadgeLedger::new(store, events.clone()));

        let listener = if !config.events.log_events {
            None
        } else if Handle::try_current().is_ok() {
            Some(spawn_listener(&events, LoggingEventListener))
        } else {
            warn!("events.log_events is set but no tokio runtime is running; events not logged");
            None
        };

        Ok(Self {
            gatekeeper: SubmissionGatekeeper::new(config, tasks, history, events.clone()),
            scorer,
            eligibility: EligibilityGate::new(ledger.clone()),
            ledger,
            events,
            award_provisional: config.submission.award_provisional,
            listener,
        })
    }

    /// Whether the background event logger is running
    pub fn is_logging_events(&self) -> bool {
        self.listener.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn gatekeeper(&self) -> &SubmissionGatekeeper {
        &self.gatekeeper
    }

    pub fn ledger(&self) -> &Arc<BadgeLedger> {
        &self.ledger
    }

    pub fn eligibility(&self) -> &EligibilityGate {
        &self.eligibility
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run one trial submission from `origin` through the whole flow.
    pub async fn process(&self, origin: &str, submission: &Submission) -> Result<TrialResult> {
        let verdict = match self.gatekeeper.admit(origin, submission).await? {
            Admission::Throttled { retry_after_secs } => {
                return Ok(TrialResult::Throttled { retry_after_secs });
            }
            Admission::Reviewed(verdict) => verdict,
        };

        if !verdict.is_valid() {
            return Ok(TrialResult::Rejected { verdict });
        }
        // A valid verdict always carries the task and the elapsed time
        let (Some(task), Some(time_spent_minutes)) =
            (verdict.task.clone(), verdict.time_spent_minutes)
        else {
            return Ok(TrialResult::Rejected { verdict });
        };
        let worker_id = verdict.worker_id.clone();

        let score = self
            .scorer
            .score(&ScoringRequest {
                task: task.clone(),
                worker_id: worker_id.clone(),
                work: verdict.sanitized_work.clone(),
                time_spent_minutes,
            })
            .await?;

        debug!(
            worker_id = %worker_id,
            task_id = %task.task_id,
            passed = score.passed,
            accuracy = score.accuracy_score,
            "Submission scored"
        );

        let awardable = !worker_id.is_empty()
            && (verdict.identity.is_durable() || self.award_provisional);
        let award = if score.passed && awardable {
            Some(
                self.ledger
                    .award(AwardInput {
                        worker_id: worker_id.clone(),
                        category: task.category.clone(),
                        task_id: task.task_id.clone(),
                        earned_by: earned_by::FREE_TASK_SUBMISSION.to_string(),
                        quality: Some(SubmissionQuality {
                            accuracy_score: score.accuracy_score,
                            speed_score: score.speed_score,
                            quality_score: score.quality_score,
                            time_spent_minutes,
                        }),
                    })
                    .await?,
            )
        } else {
            if score.passed {
                info!(
                    worker_id = %worker_id,
                    task_id = %task.task_id,
                    "Passing trial from provisional worker, no badge awarded"
                );
            }
            None
        };

        Ok(TrialResult::Scored { verdict, score, award })
    }

    /// Fold a completed, rated paid task into the worker's badge.
    pub async fn record_paid_completion(
        &self,
        worker_id: &str,
        category: &TaskCategory,
        pay_amount: f64,
        rating: f64,
    ) -> Result<AccumulateOutcome> {
        self.ledger.accumulate(worker_id, category, pay_amount, rating).await
    }

    pub async fn can_apply(
        &self,
        worker_id: &str,
        category: &TaskCategory,
        difficulty: &Difficulty,
    ) -> Result<Eligibility> {
        self.eligibility.can_apply(worker_id, category, difficulty).await
    }
}

impl Drop for TrialPipeline {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
