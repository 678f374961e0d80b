//! Bankfeed ingests heterogeneous CSV/TSV bank statements into a single
//! normalized transaction ledger.
//!
//! The pipeline has four stages:
//! - the [sniffer] detects the file's delimiter, header position and schema
//!   fingerprint, and probes the regional dialect from sample rows;
//! - the [normalizer] parses regional amounts into signed minor units and
//!   dates against a preferred pattern with fallbacks;
//! - the mapping store ([stores::MappingStore]) remembers learned parse
//!   configurations per schema fingerprint, user-scoped over global;
//! - the [service::ImportService] orchestrates the whole import: streaming
//!   parse through a worker pool, validation, batched deduplicating inserts
//!   and job progress tracking.
//!
//! Persistence is abstracted behind the port traits in [stores], with
//! SQLite-backed implementations in [stores::sqlite]. Transports, auth and
//! account management live outside this crate; the service layer is the
//! surface they call.

#![warn(missing_docs)]

pub mod currency;
pub mod database_id;
pub mod db;
pub mod encoding;
mod error;
pub mod models;
pub mod normalizer;
pub mod service;
pub mod sniffer;
pub mod stores;
pub mod timezone;

pub use error::Error;
pub use service::{AnalyzeResult, ImportOptions, ImportResult, ImportService};
