//! Analysis repository contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DatabaseError;

/// The durable output of one classified probe email.
///
/// Records are create-only: there is no update or delete path. A subject
/// may recur across probes; lookups return the most recently created
/// record for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub subject: String,
    /// Unmodified `Received` header values, oldest hop first.
    pub receiving_chain: Vec<String>,
    /// ESP label, or `"Unknown"` — never empty, never null.
    pub esp: String,
    /// Assigned by the store at save time. Used only for ordering.
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic repository for analysis records.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Persist a new analysis, assigning its id and `created_at`.
    /// Returns the record as persisted.
    async fn save_analysis(
        &self,
        subject: &str,
        receiving_chain: &[String],
        esp: &str,
    ) -> Result<AnalysisRecord, DatabaseError>;

    /// Exact-match lookup by subject, newest record first.
    ///
    /// `Ok(None)` means "not analyzed yet" — a first-class outcome,
    /// distinct from a query failure.
    async fn find_latest_by_subject(
        &self,
        subject: &str,
    ) -> Result<Option<AnalysisRecord>, DatabaseError>;
}
