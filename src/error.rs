//! Defines the app level error type.

use crate::database_id::AccountId;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The uploaded statement contained no bytes.
    #[error("file is empty")]
    EmptyFile,

    /// No line in the statement looked like a header row.
    ///
    /// Header detection requires at least one known header keyword and at
    /// least four delimited fields on the same line.
    #[error("could not find data headers")]
    NoHeadersFound,

    /// The delimiter is not a single-byte character the CSV reader can use.
    #[error("could not use '{0}' as a field delimiter")]
    InvalidDelimiter(char),

    /// An amount cell could not be parsed as a monetary value.
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    /// A date cell did not match the preferred format or any known fallback.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// A description cell was empty after whitespace normalization.
    #[error("empty description")]
    EmptyDescription,

    /// A double-entry row had values in both the debit and the credit column.
    #[error("both debit and credit are populated")]
    ConflictingDebitCredit,

    /// The CSV reader could not decode a record.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The column mapping could not be completed from the detected headers.
    #[error("missing required columns: {0}")]
    MissingColumns(String),

    /// A mapped column index points past the end of the row or header.
    #[error("column index out of bounds: {0}")]
    ColumnOutOfBounds(String),

    /// The referenced account does not exist or has no currency configured.
    #[error("account {0} has no known currency")]
    UnknownAccountCurrency(AccountId),

    /// A currency string was found but is not a valid ISO 4217 code.
    #[error("invalid currency code \"{0}\"")]
    InvalidCurrencyCode(String),

    /// No currency could be resolved from the account or the file contents.
    #[error("currency code not found; provide an account or include the currency in the file")]
    CurrencyNotFound,

    /// A mapping for this fingerprint and owner already exists.
    #[error("a mapping for this fingerprint already exists")]
    DuplicateMapping,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.contains("bank_mapping") =>
            {
                Error::DuplicateMapping
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
