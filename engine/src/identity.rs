//! Worker identity classification.
//!
//! Provisional workers (trial or anonymous flows) are recognised by an id
//! prefix. Everything that depends on the distinction goes through
//! [`IdentityPolicy::classify`] so the prefix convention can be replaced by a
//! real registration flag in one place.

use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;

/// Whether a worker id belongs to a registered account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerIdentity {
    /// Registered account
    Durable,
    /// Temporary id used before registration
    Provisional,
}

impl WorkerIdentity {
    pub fn is_durable(self) -> bool {
        self == WorkerIdentity::Durable
    }
}

/// Prefix-based classifier.
#[derive(Debug, Clone)]
pub struct IdentityPolicy {
    provisional_prefixes: Vec<String>,
}

impl IdentityPolicy {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            provisional_prefixes: config.provisional_prefixes.clone(),
        }
    }

    /// Classify a worker id. A blank id is provisional.
    pub fn classify(&self, worker_id: &str) -> WorkerIdentity {
        let worker_id = worker_id.trim();
        if worker_id.is_empty()
            || self
                .provisional_prefixes
                .iter()
                .any(|prefix| worker_id.starts_with(prefix.as_str()))
        {
            WorkerIdentity::Provisional
        } else {
            WorkerIdentity::Durable
        }
    }
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self::new(&IdentityConfig::default())
    }
}
