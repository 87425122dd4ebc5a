//! Sync log domain model: one row per push/pull attempt.

use serde::{Deserialize, Serialize};

/// Default number of entries returned by a sync log fetch.
pub const DEFAULT_SYNC_LOG_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Push,
    Pull,
}

/// Outcome of one phase.
///
/// `Error` is a clean failure reported by the backend call; `Crash` is a failure
/// escaping the phase logic itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Ok,
    Error,
    Crash,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "push" => Some(Self::Push),
            "pull" => Some(Self::Pull),
            _ => None,
        }
    }
}

impl SyncLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Crash => "crash",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ok" => Some(Self::Ok),
            "error" => Some(Self::Error),
            "crash" => Some(Self::Crash),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: i64,
    pub table_name: String,
    pub direction: SyncDirection,
    pub record_count: i64,
    pub status: SyncLogStatus,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_strings_match_serde_names() {
        for status in [SyncLogStatus::Ok, SyncLogStatus::Error, SyncLogStatus::Crash] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json.trim_matches('"'), status.as_str());
            assert_eq!(SyncLogStatus::parse(status.as_str()), Some(status));
        }
        for direction in [SyncDirection::Push, SyncDirection::Pull] {
            let json = serde_json::to_string(&direction).unwrap();
            assert_eq!(json.trim_matches('"'), direction.as_str());
            assert_eq!(SyncDirection::parse(direction.as_str()), Some(direction));
        }
        assert_eq!(SyncLogStatus::parse("pending"), None);
    }
}
