//! Implements a SQLite backed account currency lookup.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};

use crate::{
    database_id::{AccountId, UserId},
    stores::AccountStore,
    Error,
};

/// Resolves account currencies from a SQLite database.
///
/// Account management itself lives outside the import pipeline; this store
/// only reads the currency column and offers [create_account](Self::create_account)
/// for seeding.
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteAccountStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    /// Seed an account with a currency. Used by setup code and tests.
    pub fn create_account(
        &self,
        user_id: UserId,
        name: &str,
        currency_code: &str,
    ) -> Result<AccountId, Error> {
        let id = self.connection.lock().unwrap().query_row(
            "INSERT INTO account (user_id, name, currency_code) VALUES (?1, ?2, ?3) RETURNING id",
            (user_id, name, currency_code),
            |row| row.get(0),
        )?;

        Ok(id)
    }
}

impl AccountStore for SqliteAccountStore {
    fn get_account_currency(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Option<String>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare("SELECT currency_code FROM account WHERE id = ?1 AND user_id = ?2")?
            .query_row((account_id, user_id), |row| row.get(0))
            .optional()
            .map_err(Error::from)
    }
}

/// Create the account table in the database.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                currency_code TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

#[cfg(test)]
mod sqlite_account_store_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use crate::{
        db::initialize,
        stores::{sqlite::SqliteAccountStore, AccountStore},
    };

    fn get_test_store() -> SqliteAccountStore {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        SqliteAccountStore::new(Arc::new(Mutex::new(connection)))
    }

    #[test]
    fn resolves_currency_for_own_account() {
        let store = get_test_store();
        let account_id = store
            .create_account(1, "Everyday", "EUR")
            .expect("could not create account");

        let got = store
            .get_account_currency(1, account_id)
            .expect("could not get currency");

        assert_eq!(got.as_deref(), Some("EUR"));
    }

    #[test]
    fn missing_account_resolves_to_none() {
        let store = get_test_store();

        let got = store
            .get_account_currency(1, 42)
            .expect("lookup should not error for a missing account");

        assert_eq!(got, None);
    }

    #[test]
    fn other_users_account_resolves_to_none() {
        let store = get_test_store();
        let account_id = store
            .create_account(1, "Everyday", "EUR")
            .expect("could not create account");

        let got = store
            .get_account_currency(2, account_id)
            .expect("could not get currency");

        assert_eq!(got, None);
    }
}
