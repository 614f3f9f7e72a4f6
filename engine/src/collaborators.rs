//! Interfaces to the services the engine consults but does not own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskmarket_validation::{Payload, TaskCategory};

use crate::error::Result;

/// Task metadata from the task service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub category: TaskCategory,
    pub is_active: bool,
    /// Minutes allowed for the task
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    /// Minimum accuracy the scorer expects, in percent
    #[serde(default)]
    pub accuracy_threshold: Option<f64>,
}

/// Task lookup
#[async_trait]
pub trait TaskDirectory: Send + Sync {
    /// `Ok(None)` when the task does not exist
    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>>;
}

/// Lookup of earlier submissions, used for duplicate suppression
#[async_trait]
pub trait SubmissionHistory: Send + Sync {
    async fn has_recent_submission(
        &self,
        worker_id: &str,
        task_id: &str,
        window_hours: u32,
    ) -> Result<bool>;
}

/// What the scorer receives for a validated submission
#[derive(Debug, Clone, Serialize)]
pub struct ScoringRequest {
    pub task: TaskRecord,
    pub worker_id: String,
    /// Sanitized work
    pub work: Payload,
    pub time_spent_minutes: f64,
}

/// Scorer verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub passed: bool,
    pub accuracy_score: f64,
    pub speed_score: f64,
    pub quality_score: f64,
    #[serde(default)]
    pub feedback: String,
}

/// External evaluation of a validated submission
#[async_trait]
pub trait SubmissionScorer: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport>;
}
