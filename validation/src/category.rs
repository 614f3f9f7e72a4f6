//! Task categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category of a trial or paid task.
///
/// Unrecognised category names are kept verbatim in [`TaskCategory::Other`]
/// and validated with the generic fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskCategory {
    /// Structured records (name, phone, email per entry)
    DataEntry,
    /// Free-text writing
    ContentWriting,
    /// Organising contacts or records into a clean list
    Organization,
    /// Long-form research write-up
    Research,
    /// Short-form message or reply
    Communication,
    /// Anything else
    Other(String),
}

impl TaskCategory {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &str {
        match self {
            TaskCategory::DataEntry => "data_entry",
            TaskCategory::ContentWriting => "content_writing",
            TaskCategory::Organization => "organization",
            TaskCategory::Research => "research",
            TaskCategory::Communication => "communication",
            TaskCategory::Other(name) => name,
        }
    }

    /// Parse a category name, accepting `-`, `_` and space separated spellings.
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "data_entry" | "dataentry" => TaskCategory::DataEntry,
            "content_writing" | "content" | "writing" => TaskCategory::ContentWriting,
            "organization" | "organisation" | "data_organization" => TaskCategory::Organization,
            "research" => TaskCategory::Research,
            "communication" | "customer_communication" => TaskCategory::Communication,
            _ => TaskCategory::Other(name.trim().to_string()),
        }
    }

    /// Record-kind prefix for categories whose payload uses indexed keys.
    pub fn record_kind(&self) -> Option<&'static str> {
        match self {
            TaskCategory::DataEntry => Some("entry"),
            TaskCategory::Organization => Some("org"),
            _ => None,
        }
    }

    /// Whether this is one of the known categories.
    pub fn is_known(&self) -> bool {
        !matches!(self, TaskCategory::Other(_))
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskCategory::parse(s))
    }
}

impl Serialize for TaskCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(TaskCategory::parse(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!(TaskCategory::parse("data-entry"), TaskCategory::DataEntry);
        assert_eq!(TaskCategory::parse("Data Entry"), TaskCategory::DataEntry);
        assert_eq!(TaskCategory::parse("content_writing"), TaskCategory::ContentWriting);
        assert_eq!(TaskCategory::parse("organisation"), TaskCategory::Organization);
        assert_eq!(
            TaskCategory::parse("translation"),
            TaskCategory::Other("translation".into())
        );
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&TaskCategory::Research).unwrap();
        assert_eq!(json, "\"research\"");
        let parsed: TaskCategory = serde_json::from_str("\"communication\"").unwrap();
        assert_eq!(parsed, TaskCategory::Communication);
    }

    #[test]
    fn test_record_kind() {
        assert_eq!(TaskCategory::DataEntry.record_kind(), Some("entry"));
        assert_eq!(TaskCategory::Organization.record_kind(), Some("org"));
        assert_eq!(TaskCategory::Research.record_kind(), None);
    }
}
