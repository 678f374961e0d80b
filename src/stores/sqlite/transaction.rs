//! Implements a SQLite backed transaction store.

use std::sync::{Arc, Mutex};

use rusqlite::{params_from_iter, types::Value, Connection, Row};
use time::OffsetDateTime;

use crate::{
    database_id::{JobId, UserId},
    models::{ParsedTransaction, Transaction},
    stores::{
        BulkInsertParams, TransactionFilter, TransactionStore, CSV_SOURCE, DEFAULT_LIST_LIMIT,
        MAX_LIST_LIMIT,
    },
    Error,
};

const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, category_id, posted_at, description, \
     original_description, merchant_name, amount_minor, currency_code, source, external_id, \
     import_job_id, institution_name, notes, created_at";

/// Stores transactions in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl TransactionStore for SqliteTransactionStore {
    /// Insert a batch of parsed rows inside one transaction.
    ///
    /// Rows whose `(user_id, source, external_id)` already exists are
    /// silently skipped via `ON CONFLICT DO NOTHING`; re-importing an
    /// overlapping statement is therefore idempotent. The returned count
    /// only includes rows actually inserted.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an unexpected SQL error.
    fn bulk_insert_transactions(
        &self,
        params: &BulkInsertParams,
        rows: &[ParsedTransaction],
    ) -> Result<usize, Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.connection.lock().unwrap();
        let db_transaction = connection.unchecked_transaction()?;
        let mut inserted = 0;

        {
            // Prepare the insert statement once for reuse.
            let mut statement = db_transaction.prepare(
                "INSERT INTO \"transaction\" (user_id, account_id, posted_at, description, \
                 original_description, amount_minor, currency_code, source, external_id, \
                 import_job_id, institution_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(user_id, source, external_id) WHERE external_id IS NOT NULL
                 DO NOTHING",
            )?;
            let created_at = OffsetDateTime::now_utc();

            for row in rows {
                inserted += statement.execute((
                    params.user_id,
                    params.account_id,
                    row.posted_at,
                    &row.description,
                    &row.description,
                    row.amount_minor,
                    &params.currency_code,
                    CSV_SOURCE,
                    row.external_id(),
                    params.import_job_id,
                    params.institution_name.as_deref(),
                    created_at,
                ))?;
            }
        }

        db_transaction.commit()?;
        Ok(inserted)
    }

    /// Query a user's transactions, newest first.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<(Vec<Transaction>, i64), Error> {
        let mut where_clause_parts = vec!["user_id = ?1".to_owned()];
        let mut query_parameters = vec![Value::Integer(user_id)];

        if let Some(account_id) = filter.account_id {
            where_clause_parts.push(format!("account_id = ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(account_id));
        }

        if let Some(category_id) = filter.category_id {
            where_clause_parts.push(format!("category_id = ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(category_id));
        }

        if let Some(import_job_id) = filter.import_job_id {
            where_clause_parts.push(format!("import_job_id = ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(import_job_id));
        }

        if let Some(date_range) = &filter.date_range {
            where_clause_parts.push(format!(
                "date(posted_at) BETWEEN ?{} AND ?{}",
                query_parameters.len() + 1,
                query_parameters.len() + 2,
            ));
            query_parameters.push(Value::Text(date_range.start().to_string()));
            query_parameters.push(Value::Text(date_range.end().to_string()));
        }

        if let Some(search) = filter.search.as_deref().filter(|search| !search.is_empty()) {
            where_clause_parts.push(format!(
                "instr(lower(description), lower(?{})) > 0",
                query_parameters.len() + 1
            ));
            query_parameters.push(Value::Text(search.to_owned()));
        }

        let where_clause = format!("WHERE {}", where_clause_parts.join(" AND "));
        let connection = self.connection.lock().unwrap();

        let total: i64 = connection.query_row(
            &format!("SELECT COUNT(*) FROM \"transaction\" {where_clause}"),
            params_from_iter(query_parameters.iter()),
            |row| row.get(0),
        )?;

        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
        // Sort by posted date, then ID to keep the order stable across pages.
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {where_clause}
             ORDER BY posted_at DESC, id ASC
             LIMIT {limit} OFFSET {}",
            filter.offset
        );

        let transactions = connection
            .prepare(&query)?
            .query_map(params_from_iter(query_parameters.iter()), map_transaction_row)?
            .map(|transaction_result| transaction_result.map_err(Error::from))
            .collect::<Result<Vec<Transaction>, Error>>()?;

        Ok((transactions, total))
    }

    /// Delete every transaction the job inserted for the user.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn delete_by_import_job(&self, user_id: UserId, job_id: JobId) -> Result<usize, Error> {
        let deleted = self.connection.lock().unwrap().execute(
            "DELETE FROM \"transaction\" WHERE user_id = ?1 AND import_job_id = ?2",
            (user_id, job_id),
        )?;

        Ok(deleted)
    }
}

/// Create the transaction table in the database.
///
/// The partial unique index on `(user_id, source, external_id)` is what
/// makes re-imports idempotent: the bulk insert's conflict target matches
/// it, so duplicate rows are dropped by the database itself.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                account_id INTEGER,
                category_id INTEGER,
                posted_at TEXT NOT NULL,
                description TEXT NOT NULL,
                original_description TEXT,
                merchant_name TEXT,
                amount_minor INTEGER NOT NULL,
                currency_code TEXT NOT NULL,
                source TEXT NOT NULL,
                external_id TEXT,
                import_job_id INTEGER,
                institution_name TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(import_job_id) REFERENCES import_job(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_transaction_dedup
         ON \"transaction\"(user_id, source, external_id) WHERE external_id IS NOT NULL;",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_import_job
         ON \"transaction\"(import_job_id);",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_posted_at
         ON \"transaction\"(user_id, posted_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        posted_at: row.get(4)?,
        description: row.get(5)?,
        original_description: row.get(6)?,
        merchant_name: row.get(7)?,
        amount_minor: row.get(8)?,
        currency_code: row.get(9)?,
        source: row.get(10)?,
        external_id: row.get(11)?,
        import_job_id: row.get(12)?,
        institution_name: row.get(13)?,
        notes: row.get(14)?,
        created_at: row.get(15)?,
    })
}

#[cfg(test)]
mod sqlite_transaction_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        db::initialize,
        models::ParsedTransaction,
        stores::{
            sqlite::SqliteTransactionStore, BulkInsertParams, TransactionFilter, TransactionStore,
        },
    };

    fn get_test_store() -> SqliteTransactionStore {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        SqliteTransactionStore::new(Arc::new(Mutex::new(connection)))
    }

    fn insert_params(user_id: i64, job_id: i64) -> BulkInsertParams {
        BulkInsertParams {
            user_id,
            account_id: None,
            currency_code: "EUR".to_owned(),
            import_job_id: job_id,
            institution_name: Some("Caixa Geral".to_owned()),
        }
    }

    fn parsed(day: u8, description: &str, amount_minor: i64) -> ParsedTransaction {
        ParsedTransaction {
            posted_at: datetime!(2024-01-01 00:00 UTC) + time::Duration::days(day as i64 - 1),
            description: description.to_owned(),
            amount_minor,
            category: None,
        }
    }

    #[test]
    fn bulk_insert_returns_inserted_count() {
        let store = get_test_store();
        let rows = vec![
            parsed(2, "Pingo Doce", -4523),
            parsed(3, "Netflix", -1299),
            parsed(5, "Transferência recebida", 50000),
        ];

        let inserted = store
            .bulk_insert_transactions(&insert_params(1, 1), &rows)
            .expect("could not bulk insert");

        assert_eq!(inserted, 3);
    }

    #[test]
    fn bulk_insert_skips_duplicates_silently() {
        let store = get_test_store();
        let rows = vec![parsed(2, "Pingo Doce", -4523), parsed(3, "Netflix", -1299)];

        let first = store
            .bulk_insert_transactions(&insert_params(1, 1), &rows)
            .expect("could not bulk insert");
        let second = store
            .bulk_insert_transactions(&insert_params(1, 2), &rows)
            .expect("could not bulk insert");

        assert_eq!(first, 2);
        assert_eq!(second, 0, "re-importing identical rows must insert nothing");

        let (_, total) = store
            .list_transactions(1, &TransactionFilter::default())
            .expect("could not list transactions");
        assert_eq!(total, 2);
    }

    #[test]
    fn dedup_is_scoped_per_user() {
        let store = get_test_store();
        let rows = vec![parsed(2, "Pingo Doce", -4523)];

        store
            .bulk_insert_transactions(&insert_params(1, 1), &rows)
            .expect("could not bulk insert");
        let other_user = store
            .bulk_insert_transactions(&insert_params(2, 2), &rows)
            .expect("could not bulk insert");

        assert_eq!(other_user, 1, "another user's identical row must insert");
    }

    #[test]
    fn inserted_rows_carry_batch_metadata() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(&insert_params(1, 7), &[parsed(2, "Pingo Doce", -4523)])
            .expect("could not bulk insert");

        let (transactions, _) = store
            .list_transactions(1, &TransactionFilter::default())
            .expect("could not list transactions");

        let transaction = &transactions[0];
        assert_eq!(transaction.currency_code, "EUR");
        assert_eq!(transaction.source, "csv");
        assert_eq!(transaction.import_job_id, Some(7));
        assert_eq!(transaction.institution_name.as_deref(), Some("Caixa Geral"));
        assert_eq!(transaction.original_description.as_deref(), Some("Pingo Doce"));
        assert!(transaction.external_id.is_some());
    }

    #[test]
    fn list_orders_by_posted_at_descending() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(
                &insert_params(1, 1),
                &[
                    parsed(2, "oldest", -100),
                    parsed(5, "newest", -300),
                    parsed(3, "middle", -200),
                ],
            )
            .expect("could not bulk insert");

        let (transactions, total) = store
            .list_transactions(1, &TransactionFilter::default())
            .expect("could not list transactions");

        let descriptions: Vec<&str> = transactions
            .iter()
            .map(|transaction| transaction.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["newest", "middle", "oldest"]);
        assert_eq!(total, 3);
    }

    #[test]
    fn list_filters_by_import_job() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(&insert_params(1, 1), &[parsed(2, "first batch", -100)])
            .expect("could not bulk insert");
        store
            .bulk_insert_transactions(&insert_params(1, 2), &[parsed(3, "second batch", -200)])
            .expect("could not bulk insert");

        let (transactions, total) = store
            .list_transactions(
                1,
                &TransactionFilter {
                    import_job_id: Some(2),
                    ..Default::default()
                },
            )
            .expect("could not list transactions");

        assert_eq!(total, 1);
        assert_eq!(transactions[0].description, "second batch");
    }

    #[test]
    fn list_filters_by_date_range() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(
                &insert_params(1, 1),
                &[
                    parsed(1, "before", -100),
                    parsed(3, "inside", -200),
                    parsed(9, "after", -300),
                ],
            )
            .expect("could not bulk insert");

        let (transactions, total) = store
            .list_transactions(
                1,
                &TransactionFilter {
                    date_range: Some(date!(2024 - 01 - 02)..=date!(2024 - 01 - 05)),
                    ..Default::default()
                },
            )
            .expect("could not list transactions");

        assert_eq!(total, 1);
        assert_eq!(transactions[0].description, "inside");
    }

    #[test]
    fn list_search_is_case_insensitive() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(
                &insert_params(1, 1),
                &[parsed(2, "Compra MB - Pingo Doce", -4523), parsed(3, "Netflix", -1299)],
            )
            .expect("could not bulk insert");

        let (transactions, total) = store
            .list_transactions(
                1,
                &TransactionFilter {
                    search: Some("pingo".to_owned()),
                    ..Default::default()
                },
            )
            .expect("could not list transactions");

        assert_eq!(total, 1);
        assert!(transactions[0].description.contains("Pingo Doce"));
    }

    #[test]
    fn list_clamps_limit_and_applies_offset() {
        let store = get_test_store();
        let rows: Vec<_> = (0..120)
            .map(|i| parsed(1, &format!("transaction #{i}"), -(i as i64) - 1))
            .collect();
        store
            .bulk_insert_transactions(&insert_params(1, 1), &rows)
            .expect("could not bulk insert");

        // The default page is 50 rows.
        let (transactions, total) = store
            .list_transactions(1, &TransactionFilter::default())
            .expect("could not list transactions");
        assert_eq!(transactions.len(), 50);
        assert_eq!(total, 120);

        // Requests above the maximum clamp to 100.
        let (transactions, _) = store
            .list_transactions(
                1,
                &TransactionFilter {
                    limit: Some(500),
                    ..Default::default()
                },
            )
            .expect("could not list transactions");
        assert_eq!(transactions.len(), 100, "limit must clamp to 100");

        // Offsets skip past the start of the result set.
        let (transactions, _) = store
            .list_transactions(
                1,
                &TransactionFilter {
                    limit: Some(100),
                    offset: 100,
                    ..Default::default()
                },
            )
            .expect("could not list transactions");
        assert_eq!(transactions.len(), 20);
    }

    #[test]
    fn list_excludes_other_users() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(&insert_params(1, 1), &[parsed(2, "mine", -100)])
            .expect("could not bulk insert");
        store
            .bulk_insert_transactions(&insert_params(2, 2), &[parsed(2, "theirs", -200)])
            .expect("could not bulk insert");

        let (transactions, total) = store
            .list_transactions(1, &TransactionFilter::default())
            .expect("could not list transactions");

        assert_eq!(total, 1);
        assert_eq!(transactions[0].description, "mine");
    }

    #[test]
    fn delete_by_import_job_removes_only_that_job() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(&insert_params(1, 1), &[parsed(2, "keep", -100)])
            .expect("could not bulk insert");
        store
            .bulk_insert_transactions(
                &insert_params(1, 2),
                &[parsed(3, "remove", -200), parsed(4, "remove too", -300)],
            )
            .expect("could not bulk insert");

        let deleted = store.delete_by_import_job(1, 2).expect("could not delete");

        assert_eq!(deleted, 2);

        let (_, remaining) = store
            .list_transactions(
                1,
                &TransactionFilter {
                    import_job_id: Some(2),
                    ..Default::default()
                },
            )
            .expect("could not list transactions");
        assert_eq!(remaining, 0, "the deleted job must have no rows left");

        let (_, total) = store
            .list_transactions(1, &TransactionFilter::default())
            .expect("could not list transactions");
        assert_eq!(total, 1);
    }

    #[test]
    fn delete_by_import_job_ignores_other_users() {
        let store = get_test_store();
        store
            .bulk_insert_transactions(&insert_params(1, 1), &[parsed(2, "mine", -100)])
            .expect("could not bulk insert");

        let deleted = store.delete_by_import_job(2, 1).expect("could not delete");

        assert_eq!(deleted, 0, "another user must not be able to delete the job's rows");
    }
}
