//! Error types for taskmarket-engine
//!
//! Expected rejections (bad input, throttling, duplicates, missing badge) are
//! returned as structured outcomes. This enum is for faults.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique key already taken in the badge store
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A badge mutation could not be applied atomically
    #[error("Ledger consistency error: {0}")]
    LedgerConsistency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
