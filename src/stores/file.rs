//! The port for uploaded file records.

use crate::{
    database_id::FileId,
    models::{NewUserFile, UserFile},
    Error,
};

/// Handles the storage of uploaded statement files.
pub trait FileStore {
    /// Persist a new file record.
    fn create_file(&self, file: NewUserFile) -> Result<UserFile, Error>;

    /// Retrieve a file record by its ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] when no file has the given ID.
    fn get_file(&self, id: FileId) -> Result<UserFile, Error>;
}
