//! Shared test doubles for the engine integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use taskmarket_engine::{
    EngineError, Result, ScoreReport, ScoringRequest, Submission, SubmissionHistory,
    SubmissionScorer, TaskCategory, TaskDirectory, TaskRecord,
};

pub fn task(task_id: &str, category: TaskCategory, is_active: bool) -> TaskRecord {
    TaskRecord {
        task_id: task_id.to_string(),
        category,
        is_active,
        time_limit_minutes: Some(30),
        accuracy_threshold: Some(0.8),
    }
}

pub fn submission(task_id: &str, worker_id: &str, work: Value, time_spent: Value) -> Submission {
    Submission {
        task_id: task_id.to_string(),
        worker_id: worker_id.to_string(),
        submitted_work: work,
        time_spent,
        ..Default::default()
    }
}

/// Task directory backed by a fixed map
pub struct StaticTaskDirectory {
    tasks: HashMap<String, TaskRecord>,
}

impl StaticTaskDirectory {
    pub fn new(tasks: Vec<TaskRecord>) -> Arc<Self> {
        Arc::new(Self {
            tasks: tasks.into_iter().map(|t| (t.task_id.clone(), t)).collect(),
        })
    }
}

#[async_trait]
impl TaskDirectory for StaticTaskDirectory {
    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        Ok(self.tasks.get(task_id).cloned())
    }
}

/// Task directory that is always unreachable
pub struct UnreachableTaskDirectory;

#[async_trait]
impl TaskDirectory for UnreachableTaskDirectory {
    async fn get_task(&self, _task_id: &str) -> Result<Option<TaskRecord>> {
        Err(EngineError::Collaborator("task service unreachable".to_string()))
    }
}

/// Submission history with recorded (worker, task) pairs and a lookup counter
#[derive(Default)]
pub struct RecordedSubmissions {
    seen: Mutex<HashSet<(String, String)>>,
    lookups: AtomicUsize,
}

impl RecordedSubmissions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, worker_id: &str, task_id: &str) {
        self.seen
            .lock()
            .unwrap()
            .insert((worker_id.to_string(), task_id.to_string()));
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionHistory for RecordedSubmissions {
    async fn has_recent_submission(
        &self,
        worker_id: &str,
        task_id: &str,
        _window_hours: u32,
    ) -> Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .seen
            .lock()
            .unwrap()
            .contains(&(worker_id.to_string(), task_id.to_string())))
    }
}

/// Scorer returning the same report every time
pub struct FixedScorer {
    report: ScoreReport,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub fn passing() -> Arc<Self> {
        Self::with(true)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(false)
    }

    fn with(passed: bool) -> Arc<Self> {
        Arc::new(Self {
            report: ScoreReport {
                passed,
                accuracy_score: if passed { 0.92 } else { 0.4 },
                speed_score: 0.75,
                quality_score: if passed { 0.88 } else { 0.3 },
                feedback: String::new(),
            },
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionScorer for FixedScorer {
    async fn score(&self, _request: &ScoringRequest) -> Result<ScoreReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }
}
