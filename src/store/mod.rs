//! Persistence layer — libSQL-backed storage for analysis records.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{AnalysisRecord, AnalysisStore};
