//! Badge records and their storage boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskmarket_validation::TaskCategory;
use tokio::sync::RwLock;

use super::tier::{tier, BadgeLevel};
use crate::error::{EngineError, Result};

/// Provenance tags for how a badge was first earned
pub mod earned_by {
    pub const FREE_TASK_SUBMISSION: &str = "free_task_submission";
    pub const REGULAR_TASK: &str = "regular_task";
}

/// Scorer metrics captured when a badge is first awarded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionQuality {
    pub accuracy_score: f64,
    pub speed_score: f64,
    pub quality_score: f64,
    pub time_spent_minutes: f64,
}

/// A worker's badge in one category. One per `(worker_id, category)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBadge {
    pub id: String,
    pub worker_id: String,
    pub category: TaskCategory,
    /// Cached result of [`tier`]; recomputed on every mutation
    pub badge_level: BadgeLevel,
    pub tasks_completed: u32,
    /// Running mean of 1-5 ratings, absent until the first rating
    pub average_rating: Option<f64>,
    pub total_earnings: f64,
    /// Set once, at first award
    pub earned_at: DateTime<Utc>,
    pub earned_by: String,
    pub submission_quality: Option<SubmissionQuality>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryBadge {
    /// A fresh Bronze badge with one completed task.
    pub fn first_award(
        worker_id: &str,
        category: TaskCategory,
        earned_by: &str,
        submission_quality: Option<SubmissionQuality>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            worker_id: worker_id.to_string(),
            category,
            badge_level: BadgeLevel::Bronze,
            tasks_completed: 1,
            average_rating: None,
            total_earnings: 0.0,
            earned_at: now,
            earned_by: earned_by.to_string(),
            submission_quality,
            updated_at: now,
        }
    }

    /// Tier derived from the current counts, ignoring the cached level.
    pub fn current_level(&self) -> BadgeLevel {
        tier(self.tasks_completed, self.average_rating)
    }

    /// Refresh the cached level; returns the previous one.
    pub fn recompute_level(&mut self) -> BadgeLevel {
        let previous = self.badge_level;
        self.badge_level = self.current_level();
        self.updated_at = Utc::now();
        previous
    }
}

/// Persistence for category badges, keyed uniquely by `(worker_id, category)`.
#[async_trait]
pub trait BadgeStore: Send + Sync {
    async fn get(&self, worker_id: &str, category: &TaskCategory) -> Result<Option<CategoryBadge>>;

    /// Insert a new badge; `EngineError::Conflict` if the key already exists.
    async fn insert(&self, badge: &CategoryBadge) -> Result<()>;

    /// Overwrite an existing badge if its stored `tasks_completed` still
    /// equals `expected_tasks`.
    ///
    /// `EngineError::Conflict` when another writer got there first,
    /// `EngineError::NotFound` when the row is missing.
    async fn update(&self, badge: &CategoryBadge, expected_tasks: u32) -> Result<()>;

    async fn list_for_worker(&self, worker_id: &str) -> Result<Vec<CategoryBadge>>;

    async fn list_for_category(&self, category: &TaskCategory) -> Result<Vec<CategoryBadge>>;
}

type BadgeKey = (String, TaskCategory);

/// In-memory badge store
#[derive(Default)]
pub struct MemoryBadgeStore {
    badges: RwLock<HashMap<BadgeKey, CategoryBadge>>,
}

impl MemoryBadgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.badges.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.badges.read().await.is_empty()
    }
}

#[async_trait]
impl BadgeStore for MemoryBadgeStore {
    async fn get(&self, worker_id: &str, category: &TaskCategory) -> Result<Option<CategoryBadge>> {
        let badges = self.badges.read().await;
        Ok(badges.get(&(worker_id.to_string(), category.clone())).cloned())
    }

    async fn insert(&self, badge: &CategoryBadge) -> Result<()> {
        let mut badges = self.badges.write().await;
        let key = (badge.worker_id.clone(), badge.category.clone());
        if badges.contains_key(&key) {
            return Err(EngineError::Conflict(format!(
                "badge already exists for {}/{}",
                badge.worker_id, badge.category
            )));
        }
        badges.insert(key, badge.clone());
        Ok(())
    }

    async fn update(&self, badge: &CategoryBadge, expected_tasks: u32) -> Result<()> {
        let mut badges = self.badges.write().await;
        match badges.get_mut(&(badge.worker_id.clone(), badge.category.clone())) {
            Some(existing) if existing.tasks_completed != expected_tasks => {
                Err(EngineError::Conflict(format!(
                    "badge {}/{} changed: expected {} tasks, found {}",
                    badge.worker_id, badge.category, expected_tasks, existing.tasks_completed
                )))
            }
            Some(existing) => {
                *existing = badge.clone();
                Ok(())
            }
            None => Err(EngineError::NotFound(format!(
                "badge {}/{}",
                badge.worker_id, badge.category
            ))),
        }
    }

    async fn list_for_worker(&self, worker_id: &str) -> Result<Vec<CategoryBadge>> {
        let badges = self.badges.read().await;
        let mut found: Vec<CategoryBadge> = badges
            .values()
            .filter(|b| b.worker_id == worker_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(found)
    }

    async fn list_for_category(&self, category: &TaskCategory) -> Result<Vec<CategoryBadge>> {
        let badges = self.badges.read().await;
        Ok(badges
            .values()
            .filter(|b| &b.category == category)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn regular(worker: &str, category: TaskCategory) -> CategoryBadge {
        CategoryBadge::first_award(worker, category, earned_by::REGULAR_TASK, None)
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_same_key() {
        let store = MemoryBadgeStore::new();
        assert_ok!(store.insert(&regular("w1", TaskCategory::DataEntry)).await);

        let again = regular("w1", TaskCategory::DataEntry);
        assert!(matches!(store.insert(&again).await, Err(EngineError::Conflict(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_requires_existing() {
        let store = MemoryBadgeStore::new();
        let badge = regular("w1", TaskCategory::Research);
        assert!(matches!(store.update(&badge, 1).await, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_refuses_stale_count() {
        let store = MemoryBadgeStore::new();
        let mut badge = regular("w1", TaskCategory::Research);
        assert_ok!(store.insert(&badge).await);

        badge.tasks_completed = 2;
        assert_ok!(store.update(&badge, 1).await);

        // A second writer still holding the count-1 copy loses
        let mut stale = badge.clone();
        stale.tasks_completed = 2;
        let err = assert_err!(store.update(&stale, 1).await);
        assert!(matches!(err, EngineError::Conflict(_)));

        let stored = store.get("w1", &TaskCategory::Research).await.unwrap().unwrap();
        assert_eq!(stored.tasks_completed, 2);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = MemoryBadgeStore::new();
        for (worker, category) in [
            ("w1", TaskCategory::DataEntry),
            ("w1", TaskCategory::Research),
            ("w2", TaskCategory::DataEntry),
        ] {
            assert_ok!(store.insert(&regular(worker, category)).await);
        }
        assert_eq!(store.list_for_worker("w1").await.unwrap().len(), 2);
        assert_eq!(
            store.list_for_category(&TaskCategory::DataEntry).await.unwrap().len(),
            2
        );
    }

    #[test]
    fn test_recompute_level_returns_previous() {
        let mut badge = regular("w1", TaskCategory::DataEntry);
        badge.tasks_completed = 5;
        badge.average_rating = Some(4.6);
        assert_eq!(badge.recompute_level(), BadgeLevel::Bronze);
        assert_eq!(badge.badge_level, BadgeLevel::Silver);
    }
}
