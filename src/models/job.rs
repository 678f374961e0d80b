//! Import job tracking.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::database_id::{AccountId, FileId, JobId, UserId};

/// The lifecycle state of an [ImportJob].
///
/// Jobs transition `pending` → `running` → `succeeded` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The job has been requested but has not started.
    Pending,
    /// The job is streaming rows through the import pipeline.
    Running,
    /// The job finished; every row was either imported or counted as failed.
    Succeeded,
    /// The job was aborted by a storage failure.
    Failed,
}

impl JobStatus {
    /// The status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(FromSqlError::Other(
                format!("unknown job status \"{other}\"").into(),
            )),
        }
    }
}

/// A persisted record tracking one import invocation across its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    /// The ID of the job.
    pub id: JobId,
    /// The owning user.
    pub user_id: UserId,
    /// The uploaded file this job imports.
    pub file_id: FileId,
    /// What kind of rows the job imports, e.g. `transactions`.
    pub kind: String,
    /// The lifecycle state.
    pub status: JobStatus,
    /// The account imported rows are attached to, if any.
    pub account_id: Option<AccountId>,
    /// The IANA timezone the import was requested with.
    pub timezone: Option<String>,
    /// The date format the import resolved to.
    pub date_format: Option<String>,
    /// The institution label supplied at import time.
    pub institution_name: Option<String>,
    /// The failure message for a `failed` job.
    pub error_message: Option<String>,
    /// Total rows processed. Equals `rows_imported + rows_failed` once the
    /// job reaches a terminal state.
    pub rows_total: i64,
    /// Rows actually inserted into storage.
    pub rows_imported: i64,
    /// Rows rejected by per-row validation.
    pub rows_failed: i64,
    /// When the job was requested.
    pub requested_at: OffsetDateTime,
    /// When the job started running.
    pub started_at: Option<OffsetDateTime>,
    /// When the job reached a terminal state.
    pub finished_at: Option<OffsetDateTime>,
}

/// The fields needed to create an [ImportJob].
#[derive(Debug, Clone, PartialEq)]
pub struct NewImportJob {
    /// The owning user.
    pub user_id: UserId,
    /// The uploaded file this job imports.
    pub file_id: FileId,
    /// What kind of rows the job imports.
    pub kind: String,
    /// The account imported rows are attached to.
    pub account_id: Option<AccountId>,
    /// The IANA timezone the import was requested with.
    pub timezone: Option<String>,
    /// The date format the import resolved to.
    pub date_format: Option<String>,
    /// The institution label supplied at import time.
    pub institution_name: Option<String>,
}
