//! SQLite-backed implementations of the persistence ports.
//!
//! Every store shares the same `Arc<Mutex<Connection>>`; the schema is
//! created by [crate::db::initialize].

mod account;
mod file;
mod job;
mod mapping;
mod transaction;

pub use account::{create_account_table, SqliteAccountStore};
pub use file::{create_user_file_table, SqliteFileStore};
pub use job::{create_import_job_table, SqliteJobStore};
pub use mapping::{create_bank_mapping_table, SqliteMappingStore};
pub use transaction::{create_transaction_table, SqliteTransactionStore};
