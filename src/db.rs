//! Database initialization.

use rusqlite::Connection;

use crate::stores::sqlite::{
    create_account_table, create_bank_mapping_table, create_import_job_table,
    create_transaction_table, create_user_file_table,
};

/// Create every table and index the import pipeline needs.
///
/// Safe to call on an existing database; all statements are `IF NOT EXISTS`.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    create_account_table(connection)?;
    create_bank_mapping_table(connection)?;
    create_user_file_table(connection)?;
    create_import_job_table(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}
