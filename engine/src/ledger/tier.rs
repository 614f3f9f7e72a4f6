//! Badge tiers.
//!
//! The tier is a pure function of `(tasks_completed, average_rating)`. It is
//! recomputed after every badge mutation and can go down if the average
//! rating drops.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Badge level, ordered `Bronze < Silver < Gold < Platinum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeLevel {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BadgeLevel {
    /// All levels in ascending order
    pub const ALL: [BadgeLevel; 4] = [
        BadgeLevel::Bronze,
        BadgeLevel::Silver,
        BadgeLevel::Gold,
        BadgeLevel::Platinum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BadgeLevel::Bronze => "bronze",
            BadgeLevel::Silver => "silver",
            BadgeLevel::Gold => "gold",
            BadgeLevel::Platinum => "platinum",
        }
    }

    /// Parse a stored level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        BadgeLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for BadgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rung of the tier cascade.
struct Threshold {
    level: BadgeLevel,
    min_tasks: u32,
    min_rating: f64,
}

/// Most demanding first; the first match wins.
const CASCADE: [Threshold; 3] = [
    Threshold {
        level: BadgeLevel::Platinum,
        min_tasks: 30,
        min_rating: 4.8,
    },
    Threshold {
        level: BadgeLevel::Gold,
        min_tasks: 15,
        min_rating: 4.7,
    },
    Threshold {
        level: BadgeLevel::Silver,
        min_tasks: 5,
        min_rating: 4.5,
    },
];

/// Tier for a task count and average rating. No rating means Bronze.
pub fn tier(tasks_completed: u32, average_rating: Option<f64>) -> BadgeLevel {
    let Some(rating) = average_rating else {
        return BadgeLevel::Bronze;
    };

    CASCADE
        .iter()
        .find(|t| tasks_completed >= t.min_tasks && rating >= t.min_rating)
        .map(|t| t.level)
        .unwrap_or(BadgeLevel::Bronze)
}
