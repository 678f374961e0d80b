//! Transaction models.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::database_id::{AccountId, CategoryId, JobId, TransactionId, UserId};

/// How many bytes of the row hash make up an external ID.
const EXTERNAL_ID_BYTES: usize = 16;

/// A stored ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The owning user.
    pub user_id: UserId,
    /// The account the transaction belongs to, if known.
    pub account_id: Option<AccountId>,
    /// The resolved category, if any. The import pipeline never resolves
    /// categories itself; it only carries the source file's category string.
    pub category_id: Option<CategoryId>,
    /// When the transaction was posted.
    pub posted_at: OffsetDateTime,
    /// The cleaned description.
    pub description: String,
    /// The description exactly as it appeared in the source file.
    pub original_description: Option<String>,
    /// The merchant name, when an enrichment step has filled it in.
    pub merchant_name: Option<String>,
    /// The amount in signed minor units; negative is an expense.
    pub amount_minor: i64,
    /// ISO 4217 currency code.
    pub currency_code: String,
    /// Where the transaction came from, e.g. `csv`.
    pub source: String,
    /// Content-derived deduplication key, unique per `(user, source)`.
    pub external_id: Option<String>,
    /// The import job that inserted this row.
    pub import_job_id: Option<JobId>,
    /// The institution label supplied at import time.
    pub institution_name: Option<String>,
    /// Free-form user notes.
    pub notes: Option<String>,
    /// When the row was created.
    pub created_at: OffsetDateTime,
}

/// A transaction extracted from a statement row, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransaction {
    /// When the transaction was posted, in the import's timezone.
    pub posted_at: OffsetDateTime,
    /// The cleaned, non-empty description.
    pub description: String,
    /// The amount in signed minor units; negative is an expense.
    pub amount_minor: i64,
    /// The source file's category string, when it carries one.
    pub category: Option<String>,
}

impl ParsedTransaction {
    /// The deterministic deduplication key for this row.
    ///
    /// The first 16 bytes of `sha256(rfc3339(posted_at) | description |
    /// amount_minor)`, hex-encoded. Re-importing an overlapping statement
    /// produces identical keys, which the storage layer silently skips.
    pub fn external_id(&self) -> String {
        let timestamp = self
            .posted_at
            .format(&Rfc3339)
            .expect("RFC 3339 formatting of an in-range timestamp cannot fail");
        let payload = format!("{timestamp}|{}|{}", self.description, self.amount_minor);

        hex::encode(&Sha256::digest(payload)[..EXTERNAL_ID_BYTES])
    }
}
