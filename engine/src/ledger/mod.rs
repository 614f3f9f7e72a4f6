//! Skill-badge ledger
//!
//! Owns the lifecycle of [`CategoryBadge`] rows: created once per
//! `(worker, category)` on the first qualifying award, mutated in place by
//! every later award or paid completion, never deleted.
//!
//! ## Serialisation
//!
//! Every read-modify-write runs under a per-key async mutex, so two
//! concurrent events in one process cannot both see "no badge" or both read
//! the same prior counts. Writers outside the process (another ledger over
//! the same store) are caught by the store: inserts fail on the unique key
//! and updates are conditional on the `tasks_completed` that was read. On
//! either conflict the ledger re-reads and applies the change again, up to
//! [`MAX_WRITE_ATTEMPTS`] times, then gives up with `LedgerConsistency`.

pub mod sqlite;
pub mod store;
pub mod tier;

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use taskmarket_validation::TaskCategory;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

pub use sqlite::SqliteBadgeStore;
pub use store::{earned_by, BadgeStore, CategoryBadge, MemoryBadgeStore, SubmissionQuality};
pub use tier::{tier, BadgeLevel};

use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventBus};

/// Input for awarding a badge
#[derive(Debug, Clone)]
pub struct AwardInput {
    pub worker_id: String,
    pub category: TaskCategory,
    /// Task that qualified the worker
    pub task_id: String,
    /// Provenance tag, see [`earned_by`]
    pub earned_by: String,
    pub quality: Option<SubmissionQuality>,
}

/// Result of [`BadgeLedger::award`]
#[derive(Debug, Clone, Serialize)]
pub struct AwardOutcome {
    /// Whether this call created the badge
    pub created: bool,
    pub badge: CategoryBadge,
}

/// Result of [`BadgeLedger::accumulate`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccumulateOutcome {
    Updated {
        badge: CategoryBadge,
        previous_level: BadgeLevel,
        tier_changed: bool,
    },
    /// No badge exists yet for the pair; nothing was changed
    NoBadge {
        worker_id: String,
        category: TaskCategory,
    },
}

/// Per-worker totals across categories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeSummary {
    pub worker_id: String,
    pub total_badges: usize,
    pub by_level: BTreeMap<BadgeLevel, usize>,
    pub total_tasks: u64,
    pub total_earnings: f64,
    /// Mean of the rated badges' averages
    pub average_rating: Option<f64>,
    pub highest_level: Option<BadgeLevel>,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based rank
    pub rank: usize,
    pub worker_id: String,
    pub badge_level: BadgeLevel,
    pub average_rating: Option<f64>,
    pub tasks_completed: u32,
    pub total_earnings: f64,
}

/// Conditional writes retried this many times before the ledger gives up
pub const MAX_WRITE_ATTEMPTS: usize = 32;

type LockKey = (String, TaskCategory);
type LockMap = DashMap<LockKey, Arc<Mutex<()>>>;

/// Held per-key lock. Dropping it releases the mutex and removes the map
/// entry when nobody else is holding or waiting on it.
struct KeyLock<'a> {
    locks: &'a LockMap,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Badge ledger over a [`BadgeStore`]
pub struct BadgeLedger {
    store: Arc<dyn BadgeStore>,
    locks: LockMap,
    events: Arc<EventBus>,
}

impl BadgeLedger {
    pub fn new(store: Arc<dyn BadgeStore>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            events,
        }
    }

    async fn lock_key(&self, worker_id: &str, category: &TaskCategory) -> KeyLock<'_> {
        let key = (worker_id.to_string(), category.clone());
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyLock {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }

    /// Number of per-key locks currently held or awaited
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub async fn get(
        &self,
        worker_id: &str,
        category: &TaskCategory,
    ) -> Result<Option<CategoryBadge>> {
        self.store.get(worker_id, category).await
    }

    pub async fn badges_for(&self, worker_id: &str) -> Result<Vec<CategoryBadge>> {
        self.store.list_for_worker(worker_id).await
    }

    /// Totals across every category the worker holds a badge in
    pub async fn summarize(&self, worker_id: &str) -> Result<BadgeSummary> {
        let badges = self.store.list_for_worker(worker_id).await?;
        Ok(summarize_badges(worker_id, &badges))
    }

    /// Top `limit` badges in a category
    pub async fn leaderboard(
        &self,
        category: &TaskCategory,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let mut badges = self.store.list_for_category(category).await?;
        rank_badges(&mut badges);

        Ok(badges
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, badge)| LeaderboardEntry {
                rank: i + 1,
                badge_level: badge.current_level(),
                worker_id: badge.worker_id,
                average_rating: badge.average_rating,
                tasks_completed: badge.tasks_completed,
                total_earnings: badge.total_earnings,
            })
            .collect())
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Award (or re-award) the category badge.
    ///
    /// Creates a Bronze badge with one task on first call; every later call
    /// increments `tasks_completed` on the same row.
    pub async fn award(&self, input: AwardInput) -> Result<AwardOutcome> {
        let _lock = self.lock_key(&input.worker_id, &input.category).await;

        let outcome = match self.increment(&input.worker_id, &input.category).await? {
            Some(badge) => AwardOutcome {
                created: false,
                badge,
            },
            None => self.create(&input).await?,
        };

        self.events.emit(EngineEvent::BadgeAwarded {
            worker_id: outcome.badge.worker_id.clone(),
            category: outcome.badge.category.clone(),
            created: outcome.created,
            tasks_completed: outcome.badge.tasks_completed,
        });

        Ok(outcome)
    }

    async fn create(&self, input: &AwardInput) -> Result<AwardOutcome> {
        let badge = CategoryBadge::first_award(
            &input.worker_id,
            input.category.clone(),
            &input.earned_by,
            input.quality.clone(),
        );

        match self.store.insert(&badge).await {
            Ok(()) => {
                info!(
                    worker_id = %input.worker_id,
                    category = %input.category,
                    task_id = %input.task_id,
                    earned_by = %input.earned_by,
                    "Category badge created"
                );
                Ok(AwardOutcome {
                    created: true,
                    badge,
                })
            }
            Err(EngineError::Conflict(msg)) => {
                warn!(
                    worker_id = %input.worker_id,
                    category = %input.category,
                    "Badge created concurrently, applying award to existing row: {}",
                    msg
                );
                let badge = self
                    .increment(&input.worker_id, &input.category)
                    .await?
                    .ok_or_else(|| {
                        EngineError::LedgerConsistency(format!(
                            "insert conflicted but no badge found for {}/{}",
                            input.worker_id, input.category
                        ))
                    })?;
                Ok(AwardOutcome {
                    created: false,
                    badge,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn increment(
        &self,
        worker_id: &str,
        category: &TaskCategory,
    ) -> Result<Option<CategoryBadge>> {
        let applied = self
            .apply(worker_id, category, |badge| {
                badge.tasks_completed = badge.tasks_completed.saturating_add(1);
            })
            .await?;

        Ok(applied.map(|(badge, previous)| {
            self.note_tier_change(&badge, previous);
            badge
        }))
    }

    /// Record a paid task: fold the rating into the running mean, add the
    /// pay, count the task and recompute the tier.
    pub async fn accumulate(
        &self,
        worker_id: &str,
        category: &TaskCategory,
        pay_amount: f64,
        rating: f64,
    ) -> Result<AccumulateOutcome> {
        if !pay_amount.is_finite() || pay_amount < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "pay amount must be a non-negative number, got {}",
                pay_amount
            )));
        }
        if !(1.0..=5.0).contains(&rating) {
            return Err(EngineError::InvalidInput(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }

        let _lock = self.lock_key(worker_id, category).await;

        let applied = self
            .apply(worker_id, category, |badge| {
                badge.average_rating = Some(running_mean(
                    badge.average_rating,
                    badge.tasks_completed,
                    rating,
                ));
                badge.total_earnings += pay_amount;
                badge.tasks_completed = badge.tasks_completed.saturating_add(1);
            })
            .await?;

        let Some((badge, previous_level)) = applied else {
            debug!(worker_id = %worker_id, category = %category, "No badge to accumulate into");
            return Ok(AccumulateOutcome::NoBadge {
                worker_id: worker_id.to_string(),
                category: category.clone(),
            });
        };

        self.events.emit(EngineEvent::BadgeProgressed {
            worker_id: badge.worker_id.clone(),
            category: badge.category.clone(),
            tasks_completed: badge.tasks_completed,
            average_rating: badge.average_rating,
        });
        self.note_tier_change(&badge, previous_level);

        Ok(AccumulateOutcome::Updated {
            tier_changed: previous_level != badge.badge_level,
            previous_level,
            badge,
        })
    }

    /// Read, change, recompute the tier and write back conditionally.
    ///
    /// Returns the stored badge and its level before the change, or `None`
    /// when there is no badge for the pair.
    async fn apply<F>(
        &self,
        worker_id: &str,
        category: &TaskCategory,
        change: F,
    ) -> Result<Option<(CategoryBadge, BadgeLevel)>>
    where
        F: Fn(&mut CategoryBadge),
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(mut badge) = self.store.get(worker_id, category).await? else {
                return Ok(None);
            };
            let expected_tasks = badge.tasks_completed;

            change(&mut badge);
            let previous = badge.recompute_level();

            match self.store.update(&badge, expected_tasks).await {
                Ok(()) => return Ok(Some((badge, previous))),
                Err(EngineError::Conflict(msg)) => {
                    warn!(
                        worker_id = %worker_id,
                        category = %category,
                        attempt = attempt,
                        "Badge changed under us, retrying: {}",
                        msg
                    );
                }
                Err(EngineError::NotFound(msg)) => {
                    return Err(EngineError::LedgerConsistency(format!(
                        "badge vanished during update: {}",
                        msg
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        Err(EngineError::LedgerConsistency(format!(
            "badge {}/{} kept changing; gave up after {} attempts",
            worker_id, category, MAX_WRITE_ATTEMPTS
        )))
    }

    fn note_tier_change(&self, badge: &CategoryBadge, previous: BadgeLevel) {
        if previous == badge.badge_level {
            return;
        }
        info!(
            worker_id = %badge.worker_id,
            category = %badge.category,
            from = %previous,
            to = %badge.badge_level,
            "Badge tier recomputed"
        );
        self.events.emit(EngineEvent::TierChanged {
            worker_id: badge.worker_id.clone(),
            category: badge.category.clone(),
            from: previous,
            to: badge.badge_level,
        });
    }
}

/// Mean over `prior_count + 1` observations.
///
/// Without a prior average the new rating stands alone.
pub fn running_mean(prior: Option<f64>, prior_count: u32, rating: f64) -> f64 {
    match prior {
        Some(avg) => (avg * prior_count as f64 + rating) / (prior_count as f64 + 1.0),
        None => rating,
    }
}

/// Order by level, then average rating, then task count, all descending.
pub fn rank_badges(badges: &mut [CategoryBadge]) {
    badges.sort_by(|a, b| {
        b.current_level()
            .cmp(&a.current_level())
            .then_with(|| {
                let ra = a.average_rating.unwrap_or(f64::MIN);
                let rb = b.average_rating.unwrap_or(f64::MIN);
                rb.total_cmp(&ra)
            })
            .then_with(|| b.tasks_completed.cmp(&a.tasks_completed))
    });
}

pub fn summarize_badges(worker_id: &str, badges: &[CategoryBadge]) -> BadgeSummary {
    let mut by_level: BTreeMap<BadgeLevel, usize> = BTreeMap::new();
    for badge in badges {
        *by_level.entry(badge.current_level()).or_insert(0) += 1;
    }

    let ratings: Vec<f64> = badges.iter().filter_map(|b| b.average_rating).collect();
    let average_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    BadgeSummary {
        worker_id: worker_id.to_string(),
        total_badges: badges.len(),
        highest_level: by_level.keys().next_back().copied(),
        by_level,
        total_tasks: badges.iter().map(|b| b.tasks_completed as u64).sum(),
        total_earnings: badges.iter().map(|b| b.total_earnings).sum(),
        average_rating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (BadgeLedger, Arc<MemoryBadgeStore>) {
        let store = Arc::new(MemoryBadgeStore::new());
        (BadgeLedger::new(store.clone(), Arc::new(EventBus::new())), store)
    }

    fn award_input(worker: &str, category: TaskCategory) -> AwardInput {
        AwardInput {
            worker_id: worker.to_string(),
            category,
            task_id: "task-1".to_string(),
            earned_by: earned_by::FREE_TASK_SUBMISSION.to_string(),
            quality: None,
        }
    }

    /// Seed a badge with explicit counts
    async fn seed(
        store: &MemoryBadgeStore,
        worker: &str,
        tasks: u32,
        rating: Option<f64>,
    ) -> CategoryBadge {
        let mut badge = CategoryBadge::first_award(
            worker, TaskCategory::DataEntry,
            earned_by::REGULAR_TASK,
            None,
        );
        badge.tasks_completed = tasks;
        badge.average_rating = rating;
        badge.recompute_level();
        store.insert(&badge).await.unwrap();
        badge
    }

    #[tokio::test]
    async fn test_award_creates_then_increments() {
        let (ledger, store) = ledger();

        let first = ledger.award(award_input("w1", TaskCategory::DataEntry)).await.unwrap();
        assert!(first.created);
        assert_eq!(first.badge.tasks_completed, 1);
        assert_eq!(first.badge.badge_level, BadgeLevel::Bronze);

        let second = ledger.award(award_input("w1", TaskCategory::DataEntry)).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.badge.tasks_completed, 2);
        assert_eq!(second.badge.earned_at, first.badge.earned_at);
        assert_eq!(second.badge.id, first.badge.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_accumulate_without_badge_is_signalled() {
        let (ledger, store) = ledger();
        let outcome = ledger
            .accumulate("nobody", &TaskCategory::Research, 50.0, 5.0)
            .await
            .unwrap();
        assert!(matches!(outcome, AccumulateOutcome::NoBadge { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_accumulate_rejects_bad_arguments() {
        let (ledger, _) = ledger();
        let category = TaskCategory::DataEntry;
        assert!(matches!(
            ledger.accumulate("w", &category, -1.0, 4.0).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.accumulate("w", &category, 10.0, 5.5).await,
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_accumulate_running_mean_and_totals() {
        let (ledger, _) = ledger();
        ledger.award(award_input("w1", TaskCategory::DataEntry)).await.unwrap();

        let outcome = ledger
            .accumulate("w1", &TaskCategory::DataEntry, 100.0, 4.0)
            .await
            .unwrap();
        let AccumulateOutcome::Updated { badge, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(badge.tasks_completed, 2);
        assert_eq!(badge.average_rating, Some(4.0));
        assert_eq!(badge.total_earnings, 100.0);

        let outcome = ledger
            .accumulate("w1", &TaskCategory::DataEntry, 50.0, 5.0)
            .await
            .unwrap();
        let AccumulateOutcome::Updated { badge, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(badge.tasks_completed, 3);
        // (4.0 * 2 + 5.0) / 3
        assert!((badge.average_rating.unwrap() - 13.0 / 3.0).abs() < 1e-9);
        assert_eq!(badge.total_earnings, 150.0);
    }

    #[tokio::test]
    async fn test_silver_then_recompute_drops_to_bronze() {
        let (ledger, store) = ledger();
        let seeded = seed(&store, "w1", 5, Some(4.6)).await;
        assert_eq!(seeded.badge_level, BadgeLevel::Silver);

        // (4.6 * 5 + 3.4) / 6 = 4.4
        let outcome = ledger
            .accumulate("w1", &TaskCategory::DataEntry, 20.0, 3.4)
            .await
            .unwrap();
        let AccumulateOutcome::Updated { badge, previous_level, tier_changed } = outcome else {
            panic!("expected update");
        };
        assert_eq!(badge.tasks_completed, 6);
        assert!((badge.average_rating.unwrap() - 4.4).abs() < 1e-9);
        assert_eq!(previous_level, BadgeLevel::Silver);
        assert_eq!(badge.badge_level, BadgeLevel::Bronze);
        assert!(tier_changed);
    }

    #[tokio::test]
    async fn test_tier_changed_event_emitted() {
        let (ledger, store) = ledger();
        let mut events = ledger.events.subscribe();
        seed(&store, "w1", 4, Some(5.0)).await;

        ledger
            .accumulate("w1", &TaskCategory::DataEntry, 10.0, 5.0)
            .await
            .unwrap();

        let mut saw_tier_change = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::TierChanged { from, to, .. } = event {
                assert_eq!(from, BadgeLevel::Bronze);
                assert_eq!(to, BadgeLevel::Silver);
                saw_tier_change = true;
            }
        }
        assert!(saw_tier_change);
    }

    #[tokio::test]
    async fn test_summarize() {
        let (ledger, store) = ledger();
        let mut silver = CategoryBadge::first_award(
            "w1", TaskCategory::Research,
            earned_by::REGULAR_TASK,
            None,
        );
        silver.tasks_completed = 6;
        silver.average_rating = Some(4.6);
        silver.total_earnings = 300.0;
        silver.recompute_level();
        store.insert(&silver).await.unwrap();
        ledger.award(award_input("w1", TaskCategory::DataEntry)).await.unwrap();

        let summary = ledger.summarize("w1").await.unwrap();
        assert_eq!(summary.total_badges, 2);
        assert_eq!(summary.total_tasks, 7);
        assert_eq!(summary.total_earnings, 300.0);
        assert_eq!(summary.average_rating, Some(4.6));
        assert_eq!(summary.by_level.get(&BadgeLevel::Silver), Some(&1));
        assert_eq!(summary.by_level.get(&BadgeLevel::Bronze), Some(&1));
        assert_eq!(summary.highest_level, Some(BadgeLevel::Silver));

        let empty = ledger.summarize("nobody").await.unwrap();
        assert_eq!(empty.total_badges, 0);
        assert_eq!(empty.average_rating, None);
        assert_eq!(empty.highest_level, None);
    }

    #[tokio::test]
    async fn test_leaderboard_precedence() {
        let (ledger, store) = ledger();
        // level dominates rating, rating dominates volume
        seed(&store, "gold", 15, Some(4.7)).await;
        seed(&store, "silver-high", 5, Some(5.0)).await;
        seed(&store, "silver-busy", 14, Some(4.6)).await;
        seed(&store, "silver-low", 5, Some(4.6)).await;
        seed(&store, "unrated", 3, None).await;

        let board = ledger.leaderboard(&TaskCategory::DataEntry, 10).await.unwrap();
        let order: Vec<&str> = board.iter().map(|e| e.worker_id.as_str()).collect();
        assert_eq!(order, vec!["gold", "silver-high", "silver-busy", "silver-low", "unrated"]);
        assert_eq!(board[0].rank, 1);

        let top = ledger.leaderboard(&TaskCategory::DataEntry, 2).await.unwrap();
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn test_key_locks_released_after_use() {
        let (ledger, _) = ledger();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    let worker = format!("w{}", i % 3);
                    ledger.award(award_input(&worker, TaskCategory::DataEntry)).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        ledger
            .accumulate("w0", &TaskCategory::DataEntry, 5.0, 4.0)
            .await
            .unwrap();

        assert_eq!(ledger.tracked_locks(), 0);
    }

    #[test]
    fn test_running_mean() {
        assert_eq!(running_mean(None, 3, 4.0), 4.0);
        assert_eq!(running_mean(Some(5.0), 1, 3.0), 4.0);
    }
}
