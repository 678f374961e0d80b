//! The persistence ports consumed by the import orchestrator.
//!
//! Each trait covers one entity; the orchestrator is generic over all of
//! them so storage can be swapped out (or wrapped for observation in tests)
//! without touching the pipeline. SQLite-backed implementations live in
//! [sqlite].

mod account;
mod file;
mod job;
mod mapping;
pub mod sqlite;
mod transaction;

pub use account::AccountStore;
pub use file::FileStore;
pub use job::JobStore;
pub use mapping::MappingStore;
pub use transaction::{
    BulkInsertParams, TransactionFilter, TransactionStore, CSV_SOURCE, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
