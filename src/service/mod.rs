//! The import orchestrator.
//!
//! [ImportService] ties the sniffer, the normalizer, the mapping store and
//! the persistence ports together. It is the surface an RPC transport calls:
//! [analyze](ImportService::analyze) inspects an upload and reports whether
//! it can be imported without configuration,
//! [import_with_options](ImportService::import_with_options) runs the
//! streaming import as a tracked job, and the remaining methods cover
//! mapping persistence, querying and import undo.

mod import;

use serde::Serialize;

use crate::{
    database_id::{JobId, UserId},
    encoding,
    models::{BankMapping, ColumnMapping, NewBankMapping, Transaction},
    sniffer::{self, ColumnSuggestions, FileConfig, RegionalDialect},
    stores::{AccountStore, FileStore, JobStore, MappingStore, TransactionFilter, TransactionStore},
    Error,
};

/// The delimiter recorded for a saved mapping when none was supplied.
const DEFAULT_DELIMITER: char = ';';

/// The result of analyzing an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeResult {
    /// The detected file configuration.
    pub file_config: FileConfig,
    /// Column roles suggested from the headers.
    pub column_suggestions: ColumnSuggestions,
    /// The regional dialect probed from sample data.
    pub probed_dialect: RegionalDialect,
    /// Whether a saved mapping matched the file's fingerprint.
    pub mapping_found: bool,
    /// The matched mapping, user-scoped preferred over global.
    pub mapping: Option<BankMapping>,
    /// True when the file can be imported without manual configuration.
    pub can_auto_import: bool,
}

/// Caller overrides for [ImportService::import_with_options].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOptions {
    /// 1-based header row position; overrides detection when greater than 0.
    pub header_rows: usize,
    /// IANA timezone for statement dates. Unknown names fall back to UTC.
    pub timezone: String,
    /// Free-form institution label propagated to every inserted row.
    pub institution_name: String,
}

/// The outcome of one import invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    /// The job that tracked this import.
    pub job_id: JobId,
    /// Data rows processed: imported + failed + duplicates.
    pub rows_total: i64,
    /// Rows actually inserted into storage.
    pub rows_imported: i64,
    /// Rows rejected by per-row validation.
    pub rows_failed: i64,
    /// Parsed rows the storage layer skipped as already present.
    pub duplicates: i64,
    /// Per-row failure messages, ordered by line number.
    pub errors: Vec<String>,
}

/// Orchestrates file analysis and import operations.
#[derive(Debug, Clone)]
pub struct ImportService<M, F, J, T, A>
where
    M: MappingStore,
    F: FileStore,
    J: JobStore,
    T: TransactionStore,
    A: AccountStore,
{
    mapping_store: M,
    file_store: F,
    job_store: J,
    transaction_store: T,
    account_store: A,
}

impl<M, F, J, T, A> ImportService<M, F, J, T, A>
where
    M: MappingStore,
    F: FileStore,
    J: JobStore,
    T: TransactionStore,
    A: AccountStore,
{
    /// Create a new service over the given persistence ports.
    pub fn new(
        mapping_store: M,
        file_store: F,
        job_store: J,
        transaction_store: T,
        account_store: A,
    ) -> Self {
        Self {
            mapping_store,
            file_store,
            job_store,
            transaction_store,
            account_store,
        }
    }

    /// Analyze an uploaded file and determine if it can be auto-imported.
    ///
    /// Read-only and idempotent: nothing is persisted.
    ///
    /// # Errors
    /// Returns [Error::EmptyFile] or [Error::NoHeadersFound] when the file
    /// is not recognizable, and [Error::SqlError] if the mapping lookup
    /// fails.
    pub fn analyze(&self, user_id: UserId, data: &[u8]) -> Result<AnalyzeResult, Error> {
        let decoded = encoding::decode_statement_bytes(data);
        let file_config = sniffer::detect_config(&decoded)?;
        let column_suggestions = sniffer::suggest_columns(&file_config.headers);

        // For double-entry files the debit column stands in for the amount
        // column when probing the number dialect.
        let amount_col = column_suggestions.amount_col.or(column_suggestions.debit_col);
        let probed_dialect = sniffer::probe_dialect(
            &file_config.sample_rows,
            amount_col,
            column_suggestions.date_col,
        );

        let mapping = self
            .mapping_store
            .get_mapping_by_fingerprint(&file_config.fingerprint, user_id)?;

        tracing::debug!(
            "analyzed file: delimiter {:?}, {} metadata lines, mapping found: {}",
            file_config.delimiter,
            file_config.skip_lines,
            mapping.is_some(),
        );

        Ok(AnalyzeResult {
            mapping_found: mapping.is_some(),
            can_auto_import: mapping.is_some(),
            mapping,
            file_config,
            column_suggestions,
            probed_dialect,
        })
    }

    /// Persist a user-scoped mapping for future auto-imports.
    ///
    /// Global templates are seeded outside this flow, directly through the
    /// mapping store.
    ///
    /// # Errors
    /// Returns [Error::MissingColumns] when the mapping lacks a date or
    /// description column, or has neither an amount column nor a complete
    /// debit/credit pair; [Error::DuplicateMapping] when the user already
    /// saved a mapping for this fingerprint.
    pub fn save_mapping(
        &self,
        user_id: UserId,
        fingerprint: &str,
        bank_name: Option<&str>,
        mapping: &ColumnMapping,
    ) -> Result<BankMapping, Error> {
        let date_col = mapping
            .date_col
            .ok_or_else(|| Error::MissingColumns("date".to_owned()))?;
        let desc_col = mapping
            .desc_col
            .ok_or_else(|| Error::MissingColumns("description".to_owned()))?;

        let is_double_entry =
            mapping.is_double_entry || mapping.debit_col.is_some() || mapping.credit_col.is_some();

        let (amount_col, debit_col, credit_col) = if is_double_entry {
            match (mapping.debit_col, mapping.credit_col) {
                (Some(debit), Some(credit)) => (None, Some(debit), Some(credit)),
                _ => return Err(Error::MissingColumns("debit/credit".to_owned())),
            }
        } else {
            let amount = mapping
                .amount_col
                .ok_or_else(|| Error::MissingColumns("amount".to_owned()))?;
            (Some(amount), None, None)
        };

        self.mapping_store.create_mapping(NewBankMapping {
            user_id: Some(user_id),
            fingerprint: fingerprint.to_owned(),
            bank_name: bank_name.filter(|name| !name.is_empty()).map(str::to_owned),
            delimiter: mapping.delimiter.unwrap_or(DEFAULT_DELIMITER),
            skip_lines: mapping.skip_lines.unwrap_or(0),
            date_format: mapping.date_format.clone(),
            date_col,
            desc_col,
            category_col: mapping.category_col,
            amount_col,
            debit_col,
            credit_col,
            is_european_format: mapping.is_european_format.unwrap_or(false),
        })
    }

    /// Query a user's transactions; see
    /// [TransactionStore::list_transactions].
    pub fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), Error> {
        self.transaction_store.list_transactions(user_id, filter)
    }

    /// Delete everything an import job inserted; returns the deleted count.
    pub fn delete_by_import_job(&self, user_id: UserId, job_id: JobId) -> Result<usize, Error> {
        let deleted = self.transaction_store.delete_by_import_job(user_id, job_id)?;

        tracing::info!("deleted {deleted} transactions from import job {job_id}");

        Ok(deleted)
    }
}
