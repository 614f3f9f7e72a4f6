//! Eligibility gate
//!
//! Decides whether a worker may apply to a paid task from their badge in the
//! task's category. The tier is recomputed from the badge's counts rather
//! than read from the cached level.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use taskmarket_validation::TaskCategory;
use tracing::debug;

use crate::error::Result;
use crate::ledger::{BadgeLedger, BadgeLevel};

/// Difficulty of a paid task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    /// Unrecognised value, kept verbatim
    Other(String),
}

impl Difficulty {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "beginner" => Difficulty::Beginner,
            "intermediate" => Difficulty::Intermediate,
            "advanced" => Difficulty::Advanced,
            "expert" => Difficulty::Expert,
            _ => Difficulty::Other(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
            Difficulty::Other(name) => name,
        }
    }

    /// Lowest badge level accepted; `None` for unrecognised difficulties.
    pub fn minimum_level(&self) -> Option<BadgeLevel> {
        match self {
            Difficulty::Beginner => Some(BadgeLevel::Bronze),
            Difficulty::Intermediate => Some(BadgeLevel::Silver),
            Difficulty::Advanced => Some(BadgeLevel::Gold),
            Difficulty::Expert => Some(BadgeLevel::Platinum),
            Difficulty::Other(_) => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Difficulty::parse(&name))
    }
}

/// Answer from the eligibility gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub allowed: bool,
    pub reason: String,
    /// Worker's tier in the category, if they hold a badge
    pub current_level: Option<BadgeLevel>,
    pub required_level: Option<BadgeLevel>,
}

/// Pure decision for a known (or absent) badge level.
pub fn decide(
    current_level: Option<BadgeLevel>,
    category: &TaskCategory,
    difficulty: &Difficulty,
) -> Eligibility {
    let required_level = difficulty.minimum_level();

    let (allowed, reason) = match (current_level, required_level) {
        (None, _) if *difficulty == Difficulty::Beginner => (
            true,
            format!("No {} badge yet; beginner tasks are open to everyone", category),
        ),
        (None, _) => (
            false,
            format!(
                "No {} badge yet; complete a trial task or beginner tasks \
                 before applying to {} tasks",
                category, difficulty
            ),
        ),
        (Some(level), None) => (
            true,
            format!(
                "Unrecognised difficulty '{}'; any {} badge is accepted (current: {})",
                difficulty, category, level
            ),
        ),
        (Some(level), Some(required)) if level >= required => (
            true,
            format!(
                "{} badge in {} meets the {} requirement for {} tasks",
                level, category, required, difficulty
            ),
        ),
        (Some(level), Some(required)) => (
            false,
            format!(
                "{} tasks require a {} badge or higher in {}; current badge is {}",
                difficulty, required, category, level
            ),
        ),
    };

    Eligibility {
        allowed,
        reason,
        current_level,
        required_level,
    }
}

/// Eligibility gate reading the badge ledger
pub struct EligibilityGate {
    ledger: Arc<BadgeLedger>,
}

impl EligibilityGate {
    pub fn new(ledger: Arc<BadgeLedger>) -> Self {
        Self { ledger }
    }

    pub async fn can_apply(
        &self,
        worker_id: &str,
        category: &TaskCategory,
        difficulty: &Difficulty,
    ) -> Result<Eligibility> {
        let badge = self.ledger.get(worker_id, category).await?;
        let eligibility = decide(badge.as_ref().map(|b| b.current_level()), category, difficulty);

        debug!(
            worker_id = %worker_id,
            category = %category,
            difficulty = %difficulty,
            allowed = eligibility.allowed,
            "Eligibility checked"
        );

        Ok(eligibility)
    }
}
