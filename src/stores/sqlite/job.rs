//! Implements a SQLite backed import job store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    database_id::JobId,
    models::{ImportJob, JobStatus, NewImportJob},
    stores::JobStore,
    Error,
};

const JOB_COLUMNS: &str = "id, user_id, file_id, kind, status, account_id, timezone, \
     date_format, institution_name, error_message, rows_total, rows_imported, rows_failed, \
     requested_at, started_at, finished_at";

/// Stores import jobs in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl JobStore for SqliteJobStore {
    /// Persist a new job.
    ///
    /// The job is created directly in the `running` state with both
    /// `requested_at` and `started_at` set: the import starts streaming rows
    /// as soon as the record exists.
    fn create_job(&self, job: NewImportJob) -> Result<ImportJob, Error> {
        let now = OffsetDateTime::now_utc();
        let query = format!(
            "INSERT INTO import_job (user_id, file_id, kind, status, account_id, timezone, \
             date_format, institution_name, requested_at, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {JOB_COLUMNS}"
        );

        let created = self.connection.lock().unwrap().prepare(&query)?.query_row(
            (
                job.user_id,
                job.file_id,
                &job.kind,
                JobStatus::Running,
                job.account_id,
                job.timezone.as_deref(),
                job.date_format.as_deref(),
                job.institution_name.as_deref(),
                now,
                now,
            ),
            map_import_job_row,
        )?;

        Ok(created)
    }

    fn get_job(&self, id: JobId) -> Result<ImportJob, Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM import_job WHERE id = :id");

        let job = self
            .connection
            .lock()
            .unwrap()
            .prepare(&query)?
            .query_row(&[(":id", &id)], map_import_job_row)?;

        Ok(job)
    }

    fn update_job_progress(
        &self,
        id: JobId,
        rows_imported: i64,
        rows_failed: i64,
    ) -> Result<(), Error> {
        let updated = self.connection.lock().unwrap().execute(
            "UPDATE import_job SET rows_imported = ?2, rows_failed = ?3 WHERE id = ?1",
            (id, rows_imported, rows_failed),
        )?;

        if updated == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    fn finish_job(
        &self,
        id: JobId,
        status: JobStatus,
        rows_imported: i64,
        rows_failed: i64,
        error_message: Option<&str>,
    ) -> Result<(), Error> {
        let updated = self.connection.lock().unwrap().execute(
            "UPDATE import_job SET status = ?2, rows_imported = ?3, rows_failed = ?4, \
             rows_total = ?3 + ?4, error_message = ?5, finished_at = ?6
             WHERE id = ?1",
            (
                id,
                status,
                rows_imported,
                rows_failed,
                error_message,
                OffsetDateTime::now_utc(),
            ),
        )?;

        if updated == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }
}

/// Create the import job table in the database.
pub fn create_import_job_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS import_job (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                file_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                account_id INTEGER,
                timezone TEXT,
                date_format TEXT,
                institution_name TEXT,
                error_message TEXT,
                rows_total INTEGER NOT NULL DEFAULT 0,
                rows_imported INTEGER NOT NULL DEFAULT 0,
                rows_failed INTEGER NOT NULL DEFAULT 0,
                requested_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                FOREIGN KEY(file_id) REFERENCES user_file(id)
                )",
        (),
    )?;

    Ok(())
}

fn map_import_job_row(row: &Row) -> Result<ImportJob, rusqlite::Error> {
    Ok(ImportJob {
        id: row.get(0)?,
        user_id: row.get(1)?,
        file_id: row.get(2)?,
        kind: row.get(3)?,
        status: row.get(4)?,
        account_id: row.get(5)?,
        timezone: row.get(6)?,
        date_format: row.get(7)?,
        institution_name: row.get(8)?,
        error_message: row.get(9)?,
        rows_total: row.get(10)?,
        rows_imported: row.get(11)?,
        rows_failed: row.get(12)?,
        requested_at: row.get(13)?,
        started_at: row.get(14)?,
        finished_at: row.get(15)?,
    })
}
