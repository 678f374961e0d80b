//! The port for import job lifecycle tracking.

use crate::{
    database_id::JobId,
    models::{ImportJob, JobStatus, NewImportJob},
    Error,
};

/// Handles the lifecycle of import jobs.
pub trait JobStore {
    /// Persist a new job in the `running` state.
    fn create_job(&self, job: NewImportJob) -> Result<ImportJob, Error>;

    /// Retrieve a job by its ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] when no job has the given ID.
    fn get_job(&self, id: JobId) -> Result<ImportJob, Error>;

    /// Update a running job's row counters.
    fn update_job_progress(
        &self,
        id: JobId,
        rows_imported: i64,
        rows_failed: i64,
    ) -> Result<(), Error>;

    /// Move a job to a terminal state.
    ///
    /// Sets `finished_at` and `rows_total = rows_imported + rows_failed`.
    /// Implementations must accept `rows_imported < rows_total` for jobs
    /// finishing as [JobStatus::Failed] mid-run.
    fn finish_job(
        &self,
        id: JobId,
        status: JobStatus,
        rows_imported: i64,
        rows_failed: i64,
        error_message: Option<&str>,
    ) -> Result<(), Error>;
}
