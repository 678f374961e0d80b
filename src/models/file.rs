//! Uploaded file records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::database_id::{FileId, UserId};

/// An uploaded statement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFile {
    /// The ID of the file record.
    pub id: FileId,
    /// The owning user.
    pub user_id: UserId,
    /// The file type, e.g. `csv`.
    pub file_type: String,
    /// The MIME type of the upload.
    pub mime_type: String,
    /// The original file name.
    pub file_name: String,
    /// Size of the upload in bytes.
    pub size_bytes: i64,
    /// SHA-256 checksum of the raw bytes, hex-encoded.
    pub checksum_sha256: Option<String>,
    /// Where the raw bytes were stored, if anywhere.
    pub storage_url: Option<String>,
    /// When the record was created.
    pub created_at: OffsetDateTime,
}

/// The fields needed to create a [UserFile].
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserFile {
    /// The owning user.
    pub user_id: UserId,
    /// The file type, e.g. `csv`.
    pub file_type: String,
    /// The MIME type of the upload.
    pub mime_type: String,
    /// The original file name.
    pub file_name: String,
    /// Size of the upload in bytes.
    pub size_bytes: i64,
    /// SHA-256 checksum of the raw bytes, hex-encoded.
    pub checksum_sha256: Option<String>,
}
