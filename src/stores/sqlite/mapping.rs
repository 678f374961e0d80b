//! Implements a SQLite backed bank mapping store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{
    database_id::UserId,
    models::{BankMapping, NewBankMapping},
    stores::MappingStore,
    Error,
};

const MAPPING_COLUMNS: &str = "id, user_id, fingerprint, bank_name, delimiter, skip_lines, \
     date_format, date_col, desc_col, category_col, amount_col, debit_col, credit_col, \
     is_european_format, created_at, updated_at";

/// Stores bank mappings in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteMappingStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteMappingStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl MappingStore for SqliteMappingStore {
    /// Look up a mapping by fingerprint, preferring the user's own row over
    /// a global template.
    fn get_mapping_by_fingerprint(
        &self,
        fingerprint: &str,
        user_id: UserId,
    ) -> Result<Option<BankMapping>, Error> {
        let query = format!(
            "SELECT {MAPPING_COLUMNS} FROM bank_mapping
             WHERE fingerprint = ?1 AND (user_id = ?2 OR user_id IS NULL)
             ORDER BY user_id IS NULL
             LIMIT 1"
        );

        self.connection
            .lock()
            .unwrap()
            .prepare(&query)?
            .query_row((fingerprint, user_id), map_bank_mapping_row)
            .optional()
            .map_err(Error::from)
    }

    /// Persist a new mapping.
    ///
    /// # Errors
    /// Returns [Error::DuplicateMapping] when the `(fingerprint, user_id)`
    /// pair already exists, or [Error::SqlError] for other SQL errors.
    fn create_mapping(&self, mapping: NewBankMapping) -> Result<BankMapping, Error> {
        let now = OffsetDateTime::now_utc();
        let query = format!(
            "INSERT INTO bank_mapping (user_id, fingerprint, bank_name, delimiter, skip_lines, \
             date_format, date_col, desc_col, category_col, amount_col, debit_col, credit_col, \
             is_european_format, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             RETURNING {MAPPING_COLUMNS}"
        );

        let created = self.connection.lock().unwrap().prepare(&query)?.query_row(
            (
                mapping.user_id,
                &mapping.fingerprint,
                mapping.bank_name.as_deref(),
                mapping.delimiter.to_string(),
                mapping.skip_lines as i64,
                &mapping.date_format,
                mapping.date_col as i64,
                mapping.desc_col as i64,
                mapping.category_col.map(|col| col as i64),
                mapping.amount_col.map(|col| col as i64),
                mapping.debit_col.map(|col| col as i64),
                mapping.credit_col.map(|col| col as i64),
                mapping.is_european_format,
                now,
                now,
            ),
            map_bank_mapping_row,
        )?;

        Ok(created)
    }

    fn update_mapping(&self, mapping: &BankMapping) -> Result<(), Error> {
        let updated = self.connection.lock().unwrap().execute(
            "UPDATE bank_mapping SET bank_name = ?2, delimiter = ?3, skip_lines = ?4, \
             date_format = ?5, date_col = ?6, desc_col = ?7, category_col = ?8, \
             amount_col = ?9, debit_col = ?10, credit_col = ?11, is_european_format = ?12, \
             updated_at = ?13
             WHERE id = ?1",
            (
                mapping.id,
                mapping.bank_name.as_deref(),
                mapping.delimiter.to_string(),
                mapping.skip_lines as i64,
                &mapping.date_format,
                mapping.date_col as i64,
                mapping.desc_col as i64,
                mapping.category_col.map(|col| col as i64),
                mapping.amount_col.map(|col| col as i64),
                mapping.debit_col.map(|col| col as i64),
                mapping.credit_col.map(|col| col as i64),
                mapping.is_european_format,
                OffsetDateTime::now_utc(),
            ),
        )?;

        if updated == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    fn list_mappings_for_user(&self, user_id: UserId) -> Result<Vec<BankMapping>, Error> {
        let query = format!(
            "SELECT {MAPPING_COLUMNS} FROM bank_mapping
             WHERE user_id = ?1 OR user_id IS NULL
             ORDER BY created_at DESC, id DESC"
        );

        self.connection
            .lock()
            .unwrap()
            .prepare(&query)?
            .query_map((user_id,), map_bank_mapping_row)?
            .map(|mapping_result| mapping_result.map_err(Error::from))
            .collect()
    }
}

/// Create the bank mapping table in the database.
///
/// Plain UNIQUE constraints treat NULLs as distinct in SQLite, so global
/// templates (`user_id IS NULL`) get their own partial unique index.
pub fn create_bank_mapping_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS bank_mapping (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                fingerprint TEXT NOT NULL,
                bank_name TEXT,
                delimiter TEXT NOT NULL,
                skip_lines INTEGER NOT NULL DEFAULT 0,
                date_format TEXT NOT NULL,
                date_col INTEGER NOT NULL,
                desc_col INTEGER NOT NULL,
                category_col INTEGER,
                amount_col INTEGER,
                debit_col INTEGER,
                credit_col INTEGER,
                is_european_format INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(fingerprint, user_id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_bank_mapping_global
         ON bank_mapping(fingerprint) WHERE user_id IS NULL;",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [BankMapping].
fn map_bank_mapping_row(row: &Row) -> Result<BankMapping, rusqlite::Error> {
    let delimiter: String = row.get(4)?;
    let delimiter = delimiter.chars().next().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            "empty delimiter".into(),
        )
    })?;

    Ok(BankMapping {
        id: row.get(0)?,
        user_id: row.get(1)?,
        fingerprint: row.get(2)?,
        bank_name: row.get(3)?,
        delimiter,
        skip_lines: row.get::<_, i64>(5)? as usize,
        date_format: row.get(6)?,
        date_col: row.get::<_, i64>(7)? as usize,
        desc_col: row.get::<_, i64>(8)? as usize,
        category_col: row.get::<_, Option<i64>>(9)?.map(|col| col as usize),
        amount_col: row.get::<_, Option<i64>>(10)?.map(|col| col as usize),
        debit_col: row.get::<_, Option<i64>>(11)?.map(|col| col as usize),
        credit_col: row.get::<_, Option<i64>>(12)?.map(|col| col as usize),
        is_european_format: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

#[cfg(test)]
mod sqlite_mapping_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use crate::{
        db::initialize,
        models::NewBankMapping,
        stores::{sqlite::SqliteMappingStore, MappingStore},
        Error,
    };

    fn get_test_store() -> SqliteMappingStore {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        SqliteMappingStore::new(Arc::new(Mutex::new(connection)))
    }

    fn new_mapping(user_id: Option<i64>, fingerprint: &str) -> NewBankMapping {
        NewBankMapping {
            user_id,
            fingerprint: fingerprint.to_owned(),
            bank_name: Some("Caixa Geral".to_owned()),
            delimiter: ';',
            skip_lines: 6,
            date_format: "DD-MM-YYYY".to_owned(),
            date_col: 0,
            desc_col: 2,
            category_col: Some(7),
            amount_col: None,
            debit_col: Some(3),
            credit_col: Some(4),
            is_european_format: true,
        }
    }

    #[test]
    fn create_and_get_round_trips() {
        let store = get_test_store();

        let created = store
            .create_mapping(new_mapping(Some(1), "abc123"))
            .expect("could not create mapping");

        let got = store
            .get_mapping_by_fingerprint("abc123", 1)
            .expect("could not get mapping");

        assert_eq!(got, Some(created));
    }

    #[test]
    fn user_mapping_wins_over_global_template() {
        let store = get_test_store();
        let global = store
            .create_mapping(new_mapping(None, "abc123"))
            .expect("could not create global mapping");
        let user_owned = store
            .create_mapping(new_mapping(Some(1), "abc123"))
            .expect("could not create user mapping");

        let got = store
            .get_mapping_by_fingerprint("abc123", 1)
            .expect("could not get mapping")
            .expect("expected a mapping");

        assert_eq!(got.id, user_owned.id, "want the user-scoped mapping");

        // A different user only sees the global template.
        let got = store
            .get_mapping_by_fingerprint("abc123", 2)
            .expect("could not get mapping")
            .expect("expected a mapping");

        assert_eq!(got.id, global.id, "want the global template");
    }

    #[test]
    fn get_returns_none_for_unknown_fingerprint() {
        let store = get_test_store();

        let got = store
            .get_mapping_by_fingerprint("missing", 1)
            .expect("could not query mapping");

        assert_eq!(got, None);
    }

    #[test]
    fn create_rejects_duplicate_fingerprint_for_same_owner() {
        let store = get_test_store();
        store
            .create_mapping(new_mapping(Some(1), "abc123"))
            .expect("could not create mapping");

        let duplicate = store.create_mapping(new_mapping(Some(1), "abc123"));

        assert_eq!(duplicate, Err(Error::DuplicateMapping));
    }

    #[test]
    fn create_rejects_duplicate_global_template() {
        let store = get_test_store();
        store
            .create_mapping(new_mapping(None, "abc123"))
            .expect("could not create global mapping");

        let duplicate = store.create_mapping(new_mapping(None, "abc123"));

        assert_eq!(duplicate, Err(Error::DuplicateMapping));
    }

    #[test]
    fn update_rewrites_fields() {
        let store = get_test_store();
        let mut mapping = store
            .create_mapping(new_mapping(Some(1), "abc123"))
            .expect("could not create mapping");

        mapping.bank_name = Some("Millennium".to_owned());
        mapping.is_european_format = false;
        store.update_mapping(&mapping).expect("could not update mapping");

        let got = store
            .get_mapping_by_fingerprint("abc123", 1)
            .expect("could not get mapping")
            .expect("expected a mapping");

        assert_eq!(got.bank_name.as_deref(), Some("Millennium"));
        assert!(!got.is_european_format);
    }

    #[test]
    fn update_missing_mapping_fails() {
        let store = get_test_store();
        let mut mapping = store
            .create_mapping(new_mapping(Some(1), "abc123"))
            .expect("could not create mapping");
        mapping.id += 999;

        assert_eq!(store.update_mapping(&mapping), Err(Error::NotFound));
    }

    #[test]
    fn list_includes_globals_but_not_other_users() {
        let store = get_test_store();
        store
            .create_mapping(new_mapping(Some(1), "mine"))
            .expect("could not create mapping");
        store
            .create_mapping(new_mapping(None, "global"))
            .expect("could not create mapping");
        store
            .create_mapping(new_mapping(Some(2), "theirs"))
            .expect("could not create mapping");

        let got = store
            .list_mappings_for_user(1)
            .expect("could not list mappings");

        let fingerprints: Vec<&str> =
            got.iter().map(|mapping| mapping.fingerprint.as_str()).collect();
        assert_eq!(got.len(), 2, "want 2 mappings, got {}", got.len());
        assert!(fingerprints.contains(&"mine"));
        assert!(fingerprints.contains(&"global"));
    }
}
