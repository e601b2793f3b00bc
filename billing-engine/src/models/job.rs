//! Job model for billing-engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "closed" => JobStatus::Closed,
            _ => JobStatus::Open,
        }
    }
}

/// One billable unit of work (a government filing handled for a client).
///
/// Jobs are only ever soft-deleted; an invoice may keep referencing a job
/// whose `is_deleted` flag has flipped.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub job_id: Uuid,
    /// Owning firm account; embedded in document numbers, so kept numeric.
    pub account_id: i64,
    pub client_id: Uuid,
    pub category: String,
    /// Service accounting code of the job's category, used for tax lookup.
    pub sac_code: Option<String>,
    pub status: String,
    pub is_deleted: bool,
    pub deleted_utc: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Job {
    pub fn status(&self) -> JobStatus {
        JobStatus::from_string(&self.status)
    }
}
