//! Configuration for the trial engine.

use std::path::Path;

use serde::{Deserialize, Serialize};
use taskmarket_validation::ValidationLimits;

use crate::error::{EngineError, Result};

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Submission rate limiting
    pub rate_limit: RateLimitConfig,
    /// Structural and duplicate checks
    pub submission: SubmissionConfig,
    /// Worker identity classification
    pub identity: IdentityConfig,
    /// Text length thresholds
    pub validation: ValidationLimits,
    /// Event bus
    pub events: EventsConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject settings that would disable a check outright.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_secs == 0 {
            return Err(EngineError::Config("rate_limit.window_secs must be > 0".into()));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(EngineError::Config("rate_limit.max_attempts must be > 0".into()));
        }
        if self.submission.duplicate_window_hours == 0 {
            return Err(EngineError::Config(
                "submission.duplicate_window_hours must be > 0".into(),
            ));
        }
        let max_minutes = self.submission.max_time_spent_minutes;
        if max_minutes.is_nan() || max_minutes <= 0.0 {
            return Err(EngineError::Config(
                "submission.max_time_spent_minutes must be > 0".into(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(EngineError::Config("events.capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window size (seconds)
    pub window_secs: u64,
    /// Attempts allowed per origin+worker in one window
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 900, // 15 minutes
            max_attempts: 10,
        }
    }
}

/// Submission checks configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Trailing window for duplicate suppression (hours)
    pub duplicate_window_hours: u32,
    /// Upper bound for reported time spent (minutes)
    pub max_time_spent_minutes: f64,
    /// Passing trials from provisional workers earn a badge under their
    /// provisional id; hosts migrate it when the worker registers
    pub award_provisional: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            duplicate_window_hours: 24,
            max_time_spent_minutes: 300.0,
            award_provisional: true,
        }
    }
}

/// Identity classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Worker id prefixes that mark a provisional (not yet registered) worker
    pub provisional_prefixes: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provisional_prefixes: ["temp_", "anon_", "guest_"].map(String::from).to_vec(),
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity
    pub capacity: usize,
    /// Run a background listener that writes every event to the log
    pub log_events: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            log_events: false,
        }
    }
}
