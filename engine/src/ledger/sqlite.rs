//! SQLite badge store
//!
//! `UNIQUE(worker_id, category)` backs the one-badge-per-pair invariant at
//! the storage boundary; a second insert for the same pair surfaces as
//! `EngineError::Conflict`. Updates are conditional on the `tasks_completed`
//! the writer read, so two writers sharing the file cannot overwrite each
//! other's increment: the loser gets `Conflict` and re-reads.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use taskmarket_validation::TaskCategory;
use tracing::{debug, info};

use super::store::{BadgeStore, CategoryBadge, SubmissionQuality};
use super::tier::BadgeLevel;
use crate::error::{EngineError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

const BADGES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS category_badges (
    id TEXT PRIMARY KEY NOT NULL,
    worker_id TEXT NOT NULL,
    category TEXT NOT NULL,

    -- Cached tier, recomputed on every mutation
    badge_level TEXT NOT NULL DEFAULT 'bronze',
    tasks_completed INTEGER NOT NULL DEFAULT 0,
    average_rating REAL,
    total_earnings REAL NOT NULL DEFAULT 0,

    -- Provenance
    earned_at TEXT NOT NULL,
    earned_by TEXT NOT NULL,
    submission_quality_json TEXT,
    updated_at TEXT NOT NULL,

    UNIQUE (worker_id, category)
);

CREATE INDEX IF NOT EXISTS idx_category_badges_category ON category_badges(category);
"#;

/// Badge store on a single SQLite connection
pub struct SqliteBadgeStore {
    conn: Mutex<Connection>,
}

impl SqliteBadgeStore {
    /// Open or create `badges.db` in `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self> {
        let db_path = storage_dir.join("badges.db");
        info!("Opening badge database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| EngineError::Storage(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| EngineError::Storage(format!("Failed to set PRAGMA: {}", e)))?;

        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory badge database");

        let conn = Connection::open_in_memory()
            .map_err(|e| EngineError::Storage(format!("Failed to open in-memory SQLite: {}", e)))?;

        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::Storage(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    fn query_badges(&self, sql: &str, key: &str) -> Result<Vec<CategoryBadge>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| EngineError::Storage(format!("Prepare failed: {}", e)))?;

            let rows = stmt
                .query_map(params![key], BadgeRow::from_row)
                .map_err(|e| EngineError::Storage(format!("Query failed: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| EngineError::Storage(format!("Row parse failed: {}", e)))?;

            rows.into_iter().map(BadgeRow::into_badge).collect()
        })
    }
}

/// Initialize the database schema
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| EngineError::Storage(format!("Failed to create schema_version table: {}", e)))?;

    let current_version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    if current_version == 0 {
        info!("Creating badge schema v{}", SCHEMA_VERSION);
        conn.execute_batch(BADGES_SCHEMA)
            .map_err(|e| EngineError::Storage(format!("Failed to create badge tables: {}", e)))?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?)", [SCHEMA_VERSION])
            .map_err(|e| EngineError::Storage(format!("Failed to set schema_version: {}", e)))?;
    } else {
        debug!("Badge schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Raw column values, converted to a badge outside the rusqlite row callback
struct BadgeRow {
    id: String,
    worker_id: String,
    category: String,
    badge_level: String,
    tasks_completed: i64,
    average_rating: Option<f64>,
    total_earnings: f64,
    earned_at: String,
    earned_by: String,
    submission_quality_json: Option<String>,
    updated_at: String,
}

impl BadgeRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            worker_id: row.get("worker_id")?,
            category: row.get("category")?,
            badge_level: row.get("badge_level")?,
            tasks_completed: row.get("tasks_completed")?,
            average_rating: row.get("average_rating")?,
            total_earnings: row.get("total_earnings")?,
            earned_at: row.get("earned_at")?,
            earned_by: row.get("earned_by")?,
            submission_quality_json: row.get("submission_quality_json")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_badge(self) -> Result<CategoryBadge> {
        let badge_level = BadgeLevel::parse(&self.badge_level).ok_or_else(|| {
            EngineError::Storage(format!(
                "Unknown badge level in row {}: {}",
                self.id, self.badge_level
            ))
        })?;
        let submission_quality = self
            .submission_quality_json
            .as_deref()
            .map(serde_json::from_str::<SubmissionQuality>)
            .transpose()?;

        Ok(CategoryBadge {
            badge_level,
            tasks_completed: u32::try_from(self.tasks_completed).map_err(|_| {
                EngineError::Storage(format!("Invalid tasks_completed in row {}", self.id))
            })?,
            average_rating: self.average_rating,
            total_earnings: self.total_earnings,
            earned_at: parse_timestamp(&self.earned_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            category: TaskCategory::parse(&self.category),
            submission_quality,
            id: self.id,
            worker_id: self.worker_id,
            earned_by: self.earned_by,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EngineError::Storage(format!("Invalid timestamp '{}': {}", value, e)))
}

fn quality_json(badge: &CategoryBadge) -> Result<Option<String>> {
    Ok(badge
        .submission_quality
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?)
}

#[async_trait]
impl BadgeStore for SqliteBadgeStore {
    async fn get(&self, worker_id: &str, category: &TaskCategory) -> Result<Option<CategoryBadge>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM category_badges WHERE worker_id = ? AND category = ?",
                params![worker_id, category.as_str()],
                BadgeRow::from_row,
            )
            .optional()
            .map_err(|e| EngineError::Storage(format!("Query failed: {}", e)))
        })?;

        row.map(BadgeRow::into_badge).transpose()
    }

    async fn insert(&self, badge: &CategoryBadge) -> Result<()> {
        let quality = quality_json(badge)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO category_badges (
                    id, worker_id, category, badge_level, tasks_completed, average_rating,
                    total_earnings, earned_at, earned_by, submission_quality_json, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    badge.id,
                    badge.worker_id,
                    badge.category.as_str(),
                    badge.badge_level.as_str(),
                    badge.tasks_completed,
                    badge.average_rating,
                    badge.total_earnings,
                    badge.earned_at.to_rfc3339(),
                    badge.earned_by,
                    quality,
                    badge.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    EngineError::Conflict(format!(
                        "badge already exists for {}/{}",
                        badge.worker_id, badge.category
                    ))
                }
                other => EngineError::Storage(format!("Insert failed: {}", other)),
            })?;
            Ok(())
        })
    }

    async fn update(&self, badge: &CategoryBadge, expected_tasks: u32) -> Result<()> {
        let quality = quality_json(badge)?;
        self.with_conn(|conn| {
            let changes = conn
                .execute(
                    "UPDATE category_badges SET
                        badge_level = ?, tasks_completed = ?, average_rating = ?,
                        total_earnings = ?, submission_quality_json = ?, updated_at = ?
                     WHERE worker_id = ? AND category = ? AND tasks_completed = ?",
                    params![
                        badge.badge_level.as_str(),
                        badge.tasks_completed,
                        badge.average_rating,
                        badge.total_earnings,
                        quality,
                        badge.updated_at.to_rfc3339(),
                        badge.worker_id,
                        badge.category.as_str(),
                        expected_tasks,
                    ],
                )
                .map_err(|e| EngineError::Storage(format!("Update failed: {}", e)))?;

            if changes > 0 {
                return Ok(());
            }

            // Nothing matched: either the row moved on or it is gone
            let current: Option<u32> = conn
                .query_row(
                    "SELECT tasks_completed FROM category_badges \
                     WHERE worker_id = ? AND category = ?",
                    params![badge.worker_id, badge.category.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| EngineError::Storage(format!("Query failed: {}", e)))?;

            match current {
                Some(found) => Err(EngineError::Conflict(format!(
                    "badge {}/{} changed: expected {} tasks, found {}",
                    badge.worker_id, badge.category, expected_tasks, found
                ))),
                None => Err(EngineError::NotFound(format!(
                    "badge {}/{}",
                    badge.worker_id, badge.category
                ))),
            }
        })
    }

    async fn list_for_worker(&self, worker_id: &str) -> Result<Vec<CategoryBadge>> {
        self.query_badges(
            "SELECT * FROM category_badges WHERE worker_id = ? ORDER BY category",
            worker_id,
        )
    }

    async fn list_for_category(&self, category: &TaskCategory) -> Result<Vec<CategoryBadge>> {
        self.query_badges(
            "SELECT * FROM category_badges WHERE category = ?",
            category.as_str(),
        )
    }
}
