use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::ident::{ResourceId, ValidationError};

/// Task families whose facts the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TaskType {
    /// Openness scoring.
    Qa,
    /// Link-health checks.
    Archiver,
}

impl TaskType {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "qa" => Ok(Self::Qa),
            "archiver" => Ok(Self::Archiver),
            other => Err(ValidationError(format!("unknown task type: {other}"))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::Archiver => "archiver",
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known status keys. Keys are open-ended strings in the store; these
/// are the ones the engine interprets.
pub mod keys {
    pub const OPENNESS_SCORE: &str = "openness_score";
    pub const OPENNESS_SCORE_REASON: &str = "openness_score_reason";
    pub const STATUS: &str = "status";
    /// Written by the external notifier when a scoring job is enqueued for a
    /// created or URL-changed resource. Read-only to the engine.
    pub const SCORE_JOB_ID: &str = "score_job_id";
}

/// An immutable fact about one resource. At most one live record exists per
/// `(entity_id, task_type, key)`; later writes supersede earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRecord {
    pub entity_id: ResourceId,
    pub task_type: TaskType,
    pub key: String,
    pub value: String,
    /// Raw JSON payload with fields such as `first_failure`, `last_success`.
    pub error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Explicit last-write-wins: when the store yields historical rows, the
/// record with the greatest `last_updated` wins for each key.
#[must_use]
pub fn latest_by_key(records: Vec<StatusRecord>) -> BTreeMap<String, StatusRecord> {
    let mut latest: BTreeMap<String, StatusRecord> = BTreeMap::new();
    for record in records {
        match latest.get(&record.key) {
            Some(existing) if existing.last_updated >= record.last_updated => {}
            _ => {
                latest.insert(record.key.clone(), record);
            }
        }
    }
    latest
}
