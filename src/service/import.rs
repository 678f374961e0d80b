//! The streaming import pipeline.
//!
//! One dispatcher task reads CSV records and fans them out to a pool of
//! parse workers over bounded channels; the service task drains the results,
//! batches them into bulk inserts and keeps the job's progress counters
//! up to date. Results arrive out of order, which is fine: deduplication is
//! keyed by content and errors are re-sorted by line number at the end.

use std::{
    io::Cursor,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::{
    currency,
    database_id::{AccountId, JobId, UserId},
    encoding,
    models::{ColumnMapping, JobStatus, NewImportJob, NewUserFile, ParsedTransaction},
    normalizer::{self, DateParser},
    sniffer::{self, DetectOptions, FileConfig},
    stores::{AccountStore, BulkInsertParams, FileStore, JobStore, MappingStore, TransactionStore},
    timezone, Error,
};

use super::{ImportOptions, ImportResult, ImportService};

/// Rows accumulated per bulk insert.
const IMPORT_BATCH_SIZE: usize = 500;

/// A progress update is written at least every this many row outcomes.
const PROGRESS_UPDATE_EVERY: usize = 500;

/// Bounded depth of each worker's job queue.
const WORKER_QUEUE_DEPTH: usize = 4;

/// Result channel capacity, per worker.
const RESULT_BUFFER_PER_WORKER: usize = 4;

/// The file name recorded when the transport does not supply one.
const IMPORT_FILE_NAME: &str = "import.csv";

/// The job kind for transaction imports.
const TRANSACTIONS_KIND: &str = "transactions";

/// Which columns carry the monetary value of a row.
///
/// A mapping has either a single signed amount column or a debit/credit
/// pair; the two are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AmountColumns {
    Single(usize),
    DoubleEntry { debit: usize, credit: usize },
}

/// A fully resolved column layout for one import.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedColumns {
    date_col: usize,
    desc_col: usize,
    category_col: Option<usize>,
    amount: AmountColumns,
}

/// The immutable per-job parse context shared by all workers.
#[derive(Debug)]
struct RowParser {
    columns: ResolvedColumns,
    is_european_format: bool,
    date_parser: DateParser,
}

struct ParseJob {
    line_number: usize,
    record: csv::StringRecord,
}

struct ParseOutcome {
    line_number: usize,
    outcome: Result<ParsedTransaction, Error>,
}

impl<M, F, J, T, A> ImportService<M, F, J, T, A>
where
    M: MappingStore,
    F: FileStore,
    J: JobStore,
    T: TransactionStore,
    A: AccountStore,
{
    /// Import a statement file as a tracked job.
    ///
    /// The mapping may be partial: role columns that are unset are filled in
    /// from header suggestions, the date format and number dialect from
    /// sample probing. Pre-flight failures (unresolvable columns or
    /// currency) reject the import before any record is persisted; once the
    /// job exists, per-row failures are counted and reported in the result
    /// while storage failures cancel the remaining work and fail the job.
    ///
    /// # Errors
    /// - [Error::EmptyFile] / [Error::NoHeadersFound] when the file is not
    ///   recognizable.
    /// - [Error::MissingColumns] / [Error::ColumnOutOfBounds] when no
    ///   complete column layout can be resolved.
    /// - [Error::UnknownAccountCurrency] / [Error::CurrencyNotFound] when no
    ///   currency can be pinned down.
    /// - [Error::SqlError] when storage fails; the job is finalized as
    ///   failed with partial counters preserved.
    pub async fn import_with_options(
        &self,
        user_id: UserId,
        account_id: Option<AccountId>,
        data: &[u8],
        mapping: &ColumnMapping,
        options: &ImportOptions,
    ) -> Result<ImportResult, Error> {
        let decoded = encoding::decode_statement_bytes(data);

        let mut detect_options = DetectOptions {
            delimiter: mapping.delimiter,
            header_row: None,
        };
        if let Some(skip_lines) = mapping.skip_lines.filter(|skip| *skip > 0) {
            detect_options.header_row = Some(skip_lines);
        } else if options.header_rows > 0 {
            detect_options.header_row = Some(options.header_rows - 1);
        }

        let config = sniffer::detect_config_with_options(&decoded, detect_options)?;
        let delimiter = sniffer::delimiter_byte(config.delimiter)?;

        let columns = resolve_columns(&config, mapping)?;
        let date_format = resolve_date_format(&config, &columns, mapping);
        let is_european_format = resolve_european_format(&config, &columns, mapping);
        let offset = timezone::get_utc_offset_or_utc(&options.timezone);
        let currency_code = self.resolve_currency_code(user_id, account_id, &decoded, &config)?;

        let file = self.file_store.create_file(NewUserFile {
            user_id,
            file_type: "csv".to_owned(),
            mime_type: "text/csv".to_owned(),
            file_name: IMPORT_FILE_NAME.to_owned(),
            size_bytes: data.len() as i64,
            checksum_sha256: Some(hex::encode(Sha256::digest(data))),
        })?;

        let institution_name = (!options.institution_name.is_empty())
            .then(|| options.institution_name.clone());

        let job = self.job_store.create_job(NewImportJob {
            user_id,
            file_id: file.id,
            kind: TRANSACTIONS_KIND.to_owned(),
            account_id,
            timezone: (!options.timezone.is_empty()).then(|| options.timezone.clone()),
            date_format: (!date_format.is_empty()).then(|| date_format.clone()),
            institution_name: institution_name.clone(),
        })?;

        let insert_params = BulkInsertParams {
            user_id,
            account_id,
            currency_code,
            import_job_id: job.id,
            institution_name,
        };

        let parser = Arc::new(RowParser {
            columns,
            is_european_format,
            date_parser: DateParser::new(&date_format, offset),
        });

        let worker_count = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (results_tx, mut results_rx) =
            mpsc::channel::<ParseOutcome>(worker_count * RESULT_BUFFER_PER_WORKER);

        let mut job_senders = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (job_tx, job_rx) = mpsc::channel::<ParseJob>(WORKER_QUEUE_DEPTH);
            tokio::spawn(parse_worker(
                job_rx,
                results_tx.clone(),
                Arc::clone(&parser),
                Arc::clone(&cancelled),
            ));
            job_senders.push(job_tx);
        }

        tokio::spawn(dispatch_records(
            decoded.into_bytes(),
            delimiter,
            config.skip_lines,
            job_senders,
            results_tx,
            Arc::clone(&cancelled),
        ));

        let mut errors: Vec<(usize, String)> = Vec::new();
        let mut batch: Vec<ParsedTransaction> = Vec::with_capacity(IMPORT_BATCH_SIZE);
        let mut rows_imported: i64 = 0;
        let mut rows_failed: i64 = 0;
        let mut rows_parsed: i64 = 0;
        let mut outcomes_since_update = 0;
        let mut insert_error: Option<Error> = None;

        while let Some(result) = results_rx.recv().await {
            match result.outcome {
                Ok(transaction) => {
                    rows_parsed += 1;
                    batch.push(transaction);
                    if batch.len() >= IMPORT_BATCH_SIZE {
                        match self
                            .transaction_store
                            .bulk_insert_transactions(&insert_params, &batch)
                        {
                            Ok(inserted) => {
                                batch.clear();
                                rows_imported += inserted as i64;
                                outcomes_since_update = 0;
                                self.write_progress(job.id, rows_imported, rows_failed);
                            }
                            Err(error) => {
                                // Stop the dispatcher and workers; pending
                                // parse results are discarded.
                                cancelled.store(true, Ordering::Relaxed);
                                insert_error = Some(error);
                                break;
                            }
                        }
                    }
                }
                Err(error) => {
                    errors.push((result.line_number, error.to_string()));
                    rows_failed += 1;
                    outcomes_since_update += 1;
                    if outcomes_since_update >= PROGRESS_UPDATE_EVERY {
                        self.write_progress(job.id, rows_imported, rows_failed);
                        outcomes_since_update = 0;
                    }
                }
            }
        }
        drop(results_rx);

        if insert_error.is_none() && !batch.is_empty() {
            match self
                .transaction_store
                .bulk_insert_transactions(&insert_params, &batch)
            {
                Ok(inserted) => {
                    rows_imported += inserted as i64;
                    outcomes_since_update = 0;
                    self.write_progress(job.id, rows_imported, rows_failed);
                }
                Err(error) => insert_error = Some(error),
            }
        }
        if insert_error.is_none() && outcomes_since_update > 0 {
            self.write_progress(job.id, rows_imported, rows_failed);
        }

        if let Some(error) = insert_error {
            let message = error.to_string();
            if let Err(finish_error) = self.job_store.finish_job(
                job.id,
                JobStatus::Failed,
                rows_imported,
                rows_failed,
                Some(&message),
            ) {
                tracing::warn!("failed to finish import job {}: {finish_error}", job.id);
            }
            return Err(error);
        }

        errors.sort_by_key(|(line_number, _)| *line_number);
        let errors: Vec<String> = errors
            .into_iter()
            .map(|(line_number, message)| format!("line {line_number}: {message}"))
            .collect();

        let duplicates = rows_parsed - rows_imported;

        if let Err(finish_error) =
            self.job_store
                .finish_job(job.id, JobStatus::Succeeded, rows_imported, rows_failed, None)
        {
            tracing::warn!("failed to finish import job {}: {finish_error}", job.id);
        }

        tracing::info!(
            "import job {} finished: {rows_imported} imported, {rows_failed} failed, {duplicates} duplicates",
            job.id,
        );

        Ok(ImportResult {
            job_id: job.id,
            rows_total: rows_imported + rows_failed + duplicates,
            rows_imported,
            rows_failed,
            duplicates,
            errors,
        })
    }

    /// Resolve the currency code for the import, in order of preference:
    /// the target account's currency, then symbols or keyword-announced
    /// codes in the pre-header metadata, then a currency column in the
    /// sample rows.
    fn resolve_currency_code(
        &self,
        user_id: UserId,
        account_id: Option<AccountId>,
        data: &str,
        config: &FileConfig,
    ) -> Result<String, Error> {
        if let Some(account_id) = account_id {
            let raw = self
                .account_store
                .get_account_currency(user_id, account_id)?
                .ok_or(Error::UnknownAccountCurrency(account_id))?;
            return currency::normalize_currency_code(&raw)
                .ok_or(Error::InvalidCurrencyCode(raw));
        }

        currency::detect_currency_from_file(data, config).ok_or(Error::CurrencyNotFound)
    }

    /// Best-effort progress write; failures are logged and do not abort the
    /// import or alter the returned counts.
    fn write_progress(&self, job_id: JobId, rows_imported: i64, rows_failed: i64) {
        if let Err(error) = self
            .job_store
            .update_job_progress(job_id, rows_imported, rows_failed)
        {
            tracing::warn!("failed to update import job {job_id} progress: {error}");
        }
    }
}

impl RowParser {
    /// Convert a CSV record into a [ParsedTransaction].
    fn parse_row(&self, record: &csv::StringRecord) -> Result<ParsedTransaction, Error> {
        let field_count = record.len();
        let max_col = field_count.saturating_sub(1);

        if self.columns.date_col > max_col || self.columns.desc_col > max_col {
            return Err(Error::ColumnOutOfBounds(format!(
                "row only has {field_count} fields"
            )));
        }

        let posted_at = self.date_parser.parse(&record[self.columns.date_col])?;

        let description = normalizer::clean_description(&record[self.columns.desc_col]);
        if description.is_empty() {
            return Err(Error::EmptyDescription);
        }

        let amount_minor = match self.columns.amount {
            AmountColumns::Single(amount_col) => {
                if amount_col > max_col {
                    return Err(Error::ColumnOutOfBounds(format!(
                        "amount column {amount_col} exceeds row width {field_count}"
                    )));
                }
                normalizer::parse_amount(record[amount_col].trim(), self.is_european_format)?
            }
            AmountColumns::DoubleEntry { debit, credit } => {
                if debit > max_col || credit > max_col {
                    return Err(Error::ColumnOutOfBounds(format!(
                        "debit/credit column exceeds row width {field_count}"
                    )));
                }
                normalizer::normalize_debit_credit(
                    &record[debit],
                    &record[credit],
                    self.is_european_format,
                )?
            }
        };

        let category = self
            .columns
            .category_col
            .and_then(|category_col| record.get(category_col))
            .map(normalizer::clean_description)
            .filter(|category| !category.is_empty());

        Ok(ParsedTransaction {
            posted_at,
            description,
            amount_minor,
            category,
        })
    }
}

/// Complete the caller's column mapping from header suggestions.
///
/// Any role column still unset is filled from [sniffer::suggest_columns].
/// Double-entry is forced when the caller set either of the debit/credit
/// columns or the flag, and inferred when the headers suggest it and no
/// amount column exists.
fn resolve_columns(config: &FileConfig, mapping: &ColumnMapping) -> Result<ResolvedColumns, Error> {
    let suggestions = sniffer::suggest_columns(&config.headers);

    let date_col = mapping.date_col.or(suggestions.date_col);
    let desc_col = mapping.desc_col.or(suggestions.desc_col);
    let category_col = mapping.category_col.or(suggestions.category_col);

    let (Some(date_col), Some(desc_col)) = (date_col, desc_col) else {
        return Err(Error::MissingColumns("date/description".to_owned()));
    };

    let wants_double_entry =
        mapping.is_double_entry || mapping.debit_col.is_some() || mapping.credit_col.is_some();

    let amount = if wants_double_entry {
        match (
            mapping.debit_col.or(suggestions.debit_col),
            mapping.credit_col.or(suggestions.credit_col),
        ) {
            (Some(debit), Some(credit)) => AmountColumns::DoubleEntry { debit, credit },
            _ => return Err(Error::MissingColumns("debit/credit".to_owned())),
        }
    } else if let Some(amount_col) = mapping.amount_col.or(suggestions.amount_col) {
        AmountColumns::Single(amount_col)
    } else {
        match (suggestions.debit_col, suggestions.credit_col) {
            (Some(debit), Some(credit)) => AmountColumns::DoubleEntry { debit, credit },
            _ => return Err(Error::MissingColumns("amount or debit/credit".to_owned())),
        }
    };

    let max_header_col = config.headers.len().saturating_sub(1);
    let out_of_bounds = |name: &str, col: usize| {
        Error::ColumnOutOfBounds(format!(
            "{name} column {col} exceeds the {} detected headers",
            max_header_col + 1
        ))
    };

    if date_col > max_header_col {
        return Err(out_of_bounds("date", date_col));
    }
    if desc_col > max_header_col {
        return Err(out_of_bounds("description", desc_col));
    }
    match amount {
        AmountColumns::Single(amount_col) if amount_col > max_header_col => {
            return Err(out_of_bounds("amount", amount_col));
        }
        AmountColumns::DoubleEntry { debit, credit }
            if debit > max_header_col || credit > max_header_col =>
        {
            return Err(out_of_bounds("debit/credit", debit.max(credit)));
        }
        _ => {}
    }

    Ok(ResolvedColumns {
        date_col,
        desc_col,
        category_col,
        amount,
    })
}

/// Pick the date format: the caller's, or one derived from date samples.
fn resolve_date_format(
    config: &FileConfig,
    columns: &ResolvedColumns,
    mapping: &ColumnMapping,
) -> String {
    if !mapping.date_format.is_empty() {
        return mapping.date_format.clone();
    }

    let samples = sniffer::collect_column_samples(&config.sample_rows, Some(columns.date_col));
    if samples.is_empty() {
        return String::new();
    }

    normalizer::detect_date_format(&samples)
}

/// Pick the number dialect: the caller's explicit setting, else sample
/// probing, else a delimiter-based guess (`;` files are usually European,
/// `,` files American).
fn resolve_european_format(
    config: &FileConfig,
    columns: &ResolvedColumns,
    mapping: &ColumnMapping,
) -> bool {
    if let Some(explicit) = mapping.is_european_format {
        return explicit;
    }

    let samples = match columns.amount {
        AmountColumns::Single(amount_col) => {
            sniffer::collect_column_samples(&config.sample_rows, Some(amount_col))
        }
        AmountColumns::DoubleEntry { debit, credit } => {
            let mut samples = sniffer::collect_column_samples(&config.sample_rows, Some(debit));
            samples.extend(sniffer::collect_column_samples(&config.sample_rows, Some(credit)));
            samples
        }
    };

    if let Some(probed) = sniffer::detect_european_format(&samples) {
        return probed;
    }

    match config.delimiter {
        ';' => true,
        ',' => false,
        _ => false,
    }
}

/// Read records sequentially and fan them out round-robin to the workers.
///
/// The reader is owned by this task alone. Malformed records are reported
/// straight to the results channel; everything else becomes a parse job.
/// Line numbers are 1-based and start right after the header row.
async fn dispatch_records(
    data: Vec<u8>,
    delimiter: u8,
    skip_lines: usize,
    job_senders: Vec<mpsc::Sender<ParseJob>>,
    results: mpsc::Sender<ParseOutcome>,
    cancelled: Arc<AtomicBool>,
) {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(data));
    let mut records = reader.into_records();

    // Metadata lines plus the header row.
    for _ in 0..=skip_lines {
        if records.next().is_none() {
            return;
        }
    }

    let mut line_number = skip_lines + 2;
    let mut next_worker = 0;

    for record in records {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }

        match record {
            Ok(record) => {
                let parse_job = ParseJob {
                    line_number,
                    record,
                };
                if job_senders[next_worker].send(parse_job).await.is_err() {
                    return;
                }
                next_worker = (next_worker + 1) % job_senders.len();
            }
            Err(error) => {
                let outcome = ParseOutcome {
                    line_number,
                    outcome: Err(Error::MalformedRecord(error.to_string())),
                };
                if results.send(outcome).await.is_err() {
                    return;
                }
            }
        }

        line_number += 1;
    }
}

/// Parse rows from the job queue until it closes or the import is
/// cancelled.
async fn parse_worker(
    mut jobs: mpsc::Receiver<ParseJob>,
    results: mpsc::Sender<ParseOutcome>,
    parser: Arc<RowParser>,
    cancelled: Arc<AtomicBool>,
) {
    while let Some(parse_job) = jobs.recv().await {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }

        let outcome = ParseOutcome {
            line_number: parse_job.line_number,
            outcome: parser.parse_row(&parse_job.record),
        };

        if results.send(outcome).await.is_err() {
            return;
        }
    }
}
