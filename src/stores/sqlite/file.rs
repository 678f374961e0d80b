//! Implements a SQLite backed file record store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    database_id::FileId,
    models::{NewUserFile, UserFile},
    stores::FileStore,
    Error,
};

const FILE_COLUMNS: &str =
    "id, user_id, type, mime_type, file_name, size_bytes, checksum_sha256, storage_url, created_at";

/// Stores uploaded file records in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteFileStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteFileStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl FileStore for SqliteFileStore {
    fn create_file(&self, file: NewUserFile) -> Result<UserFile, Error> {
        let query = format!(
            "INSERT INTO user_file (user_id, type, mime_type, file_name, size_bytes, \
             checksum_sha256, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {FILE_COLUMNS}"
        );

        let created = self.connection.lock().unwrap().prepare(&query)?.query_row(
            (
                file.user_id,
                &file.file_type,
                &file.mime_type,
                &file.file_name,
                file.size_bytes,
                file.checksum_sha256.as_deref(),
                OffsetDateTime::now_utc(),
            ),
            map_user_file_row,
        )?;

        Ok(created)
    }

    fn get_file(&self, id: FileId) -> Result<UserFile, Error> {
        let query = format!("SELECT {FILE_COLUMNS} FROM user_file WHERE id = :id");

        let file = self
            .connection
            .lock()
            .unwrap()
            .prepare(&query)?
            .query_row(&[(":id", &id)], map_user_file_row)?;

        Ok(file)
    }
}

/// Create the user file table in the database.
pub fn create_user_file_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_file (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                type TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                file_name TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                checksum_sha256 TEXT,
                storage_url TEXT,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_user_file_row(row: &Row) -> Result<UserFile, rusqlite::Error> {
    Ok(UserFile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        file_type: row.get(2)?,
        mime_type: row.get(3)?,
        file_name: row.get(4)?,
        size_bytes: row.get(5)?,
        checksum_sha256: row.get(6)?,
        storage_url: row.get(7)?,
        created_at: row.get(8)?,
    })
}
