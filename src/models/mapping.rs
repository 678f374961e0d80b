//! Learned per-institution parse configurations.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::database_id::{MappingId, UserId};

/// A learned CSV/TSV format configuration, keyed by schema fingerprint.
///
/// A mapping remembers how a specific bank's export is laid out so the user
/// never has to configure the parser twice. A mapping without an owning user
/// is a global template shared by everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankMapping {
    /// The ID of the mapping.
    pub id: MappingId,
    /// The owning user; `None` marks a global template.
    pub user_id: Option<UserId>,
    /// SHA-256 fingerprint of the normalized headers.
    pub fingerprint: String,
    /// Optional human-readable bank name.
    pub bank_name: Option<String>,
    /// The field delimiter.
    pub delimiter: char,
    /// Number of metadata lines before the header row.
    pub skip_lines: usize,
    /// Date format pattern in user-facing tokens, e.g. `DD-MM-YYYY`.
    pub date_format: String,
    /// Index of the date column.
    pub date_col: usize,
    /// Index of the description column.
    pub desc_col: usize,
    /// Index of the category column, if the file carries one.
    pub category_col: Option<usize>,
    /// Index of the single amount column. Mutually exclusive with the
    /// debit/credit pair.
    pub amount_col: Option<usize>,
    /// Index of the debit column for double-entry files.
    pub debit_col: Option<usize>,
    /// Index of the credit column for double-entry files.
    pub credit_col: Option<usize>,
    /// True when amounts use the European number format (`1.234,56`).
    pub is_european_format: bool,
    /// When the mapping was created.
    pub created_at: OffsetDateTime,
    /// When the mapping was last updated.
    pub updated_at: OffsetDateTime,
}

/// The fields needed to create a [BankMapping].
#[derive(Debug, Clone, PartialEq)]
pub struct NewBankMapping {
    /// The owning user; `None` seeds a global template.
    pub user_id: Option<UserId>,
    /// SHA-256 fingerprint of the normalized headers.
    pub fingerprint: String,
    /// Optional human-readable bank name.
    pub bank_name: Option<String>,
    /// The field delimiter.
    pub delimiter: char,
    /// Number of metadata lines before the header row.
    pub skip_lines: usize,
    /// Date format pattern in user-facing tokens.
    pub date_format: String,
    /// Index of the date column.
    pub date_col: usize,
    /// Index of the description column.
    pub desc_col: usize,
    /// Index of the category column.
    pub category_col: Option<usize>,
    /// Index of the single amount column.
    pub amount_col: Option<usize>,
    /// Index of the debit column.
    pub debit_col: Option<usize>,
    /// Index of the credit column.
    pub credit_col: Option<usize>,
    /// True for the European number format.
    pub is_european_format: bool,
}

/// How to map statement columns to transaction fields for one import.
///
/// This is the caller-facing input to an import: every field is optional and
/// anything left unset is filled in from column suggestions and dialect
/// probing. A saved [BankMapping] converts into a fully-populated value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Index of the date column.
    pub date_col: Option<usize>,
    /// Index of the description column.
    pub desc_col: Option<usize>,
    /// Index of the category column.
    pub category_col: Option<usize>,
    /// Index of the single amount column.
    pub amount_col: Option<usize>,
    /// Index of the debit column.
    pub debit_col: Option<usize>,
    /// Index of the credit column.
    pub credit_col: Option<usize>,
    /// Force the double-entry (separate debit/credit) interpretation.
    pub is_double_entry: bool,
    /// European number format; `None` means probe it from sample data.
    pub is_european_format: Option<bool>,
    /// Date format pattern; empty means derive it from sample data.
    pub date_format: String,
    /// Field delimiter override.
    pub delimiter: Option<char>,
    /// Header position override (number of metadata lines).
    pub skip_lines: Option<usize>,
}

impl From<&BankMapping> for ColumnMapping {
    fn from(mapping: &BankMapping) -> Self {
        Self {
            date_col: Some(mapping.date_col),
            desc_col: Some(mapping.desc_col),
            category_col: mapping.category_col,
            amount_col: mapping.amount_col,
            debit_col: mapping.debit_col,
            credit_col: mapping.credit_col,
            is_double_entry: mapping.debit_col.is_some() && mapping.credit_col.is_some(),
            is_european_format: Some(mapping.is_european_format),
            date_format: mapping.date_format.clone(),
            delimiter: Some(mapping.delimiter),
            skip_lines: Some(mapping.skip_lines),
        }
    }
}
