//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a user that owns imported data.
pub type UserId = DatabaseId;
/// The ID of an account that imported transactions may be attached to.
pub type AccountId = DatabaseId;
/// The ID of a learned bank mapping.
pub type MappingId = DatabaseId;
/// The ID of an uploaded file record.
pub type FileId = DatabaseId;
/// The ID of an import job.
pub type JobId = DatabaseId;
/// The ID of a stored transaction.
pub type TransactionId = DatabaseId;
/// The ID of a transaction category.
pub type CategoryId = DatabaseId;
