//! The port for transaction storage.

use std::ops::RangeInclusive;

use time::Date;

use crate::{
    database_id::{AccountId, CategoryId, JobId, UserId},
    models::{ParsedTransaction, Transaction},
    Error,
};

/// The source tag for rows inserted by the CSV import pipeline.
pub const CSV_SOURCE: &str = "csv";

/// How many transactions a list query returns when no limit is given.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// The largest limit a list query will honor.
pub const MAX_LIST_LIMIT: u32 = 100;

/// The per-batch context for [TransactionStore::bulk_insert_transactions].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkInsertParams {
    /// The owning user.
    pub user_id: UserId,
    /// The account imported rows are attached to.
    pub account_id: Option<AccountId>,
    /// ISO 4217 currency code applied to every row in the batch.
    pub currency_code: String,
    /// The import job the rows belong to.
    pub import_job_id: JobId,
    /// The institution label propagated to every row.
    pub institution_name: Option<String>,
}

/// Defines how transactions should be fetched from
/// [TransactionStore::list_transactions]. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Matches transactions attached to this account.
    pub account_id: Option<AccountId>,
    /// Matches transactions with this category.
    pub category_id: Option<CategoryId>,
    /// Matches transactions inserted by this import job.
    pub import_job_id: Option<JobId>,
    /// Include transactions posted within this date range (inclusive).
    pub date_range: Option<RangeInclusive<Date>>,
    /// Case-insensitive substring match on the description.
    pub search: Option<String>,
    /// Selects up to the first N transactions. Defaults to
    /// [DEFAULT_LIST_LIMIT] and is clamped to [MAX_LIST_LIMIT].
    pub limit: Option<u32>,
    /// Number of matching transactions to skip.
    pub offset: u32,
}

/// Handles the storage, querying and deletion of imported transactions.
///
/// Implementations must be safe for concurrent use across jobs; multiple
/// users import simultaneously.
pub trait TransactionStore {
    /// Insert a batch of parsed rows, silently skipping duplicates.
    ///
    /// Each row gets its content-derived external ID; rows whose
    /// `(user, source, external_id)` already exists are dropped by the
    /// storage layer. Returns the number of rows actually inserted, which
    /// may be less than the batch length.
    fn bulk_insert_transactions(
        &self,
        params: &BulkInsertParams,
        rows: &[ParsedTransaction],
    ) -> Result<usize, Error>;

    /// Query a user's transactions, newest first.
    ///
    /// Returns the matching page and the total number of matches ignoring
    /// the limit and offset.
    fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), Error>;

    /// Delete every transaction a job inserted for the user.
    ///
    /// Returns the number of deleted rows. This is the "undo this import"
    /// path.
    fn delete_by_import_job(&self, user_id: UserId, job_id: JobId) -> Result<usize, Error>;
}
