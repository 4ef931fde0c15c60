//! Bug report records and status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a reported bug.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    /// Reported, no investigation started yet.
    Open,
    /// An investigation is in flight.
    Investigating,
    /// A verified fix was found.
    Fixed,
    /// Retries exhausted without a verified fix.
    Unfixable,
}

/// A reported defect, as stored by the bug-report collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BugReport {
    /// Unique identifier for this report.
    pub id: Uuid,

    /// Free-form description, typically the error message or a summary.
    pub description: String,

    /// Current lifecycle status.
    pub status: BugStatus,

    /// When this report was created.
    pub created_at: DateTime<Utc>,
}

impl BugReport {
    /// Create a new open bug report.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            status: BugStatus::Open,
            created_at: Utc::now(),
        }
    }
}
