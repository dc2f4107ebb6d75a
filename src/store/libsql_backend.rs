//! libSQL backend — async `AnalysisStore` implementation.
//!
//! Supports local file and in-memory databases. Inserts are append-only,
//! so overlapping poll cycles need no locking beyond libsql's own
//! concurrency control; the read path never blocks on writers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{AnalysisRecord, AnalysisStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql row (id, subject, receiving_chain, esp, created_at) to a record.
fn row_to_record(row: &libsql::Row) -> Result<AnalysisRecord, DatabaseError> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("Failed to read id: {e}")))?;
    let subject: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("Failed to read subject: {e}")))?;
    let chain_json: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("Failed to read receiving_chain: {e}")))?;
    let esp: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("Failed to read esp: {e}")))?;
    let created_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("Failed to read created_at: {e}")))?;

    let receiving_chain: Vec<String> = serde_json::from_str(&chain_json)
        .map_err(|e| DatabaseError::Serialization(format!("Bad receiving_chain column: {e}")))?;

    Ok(AnalysisRecord {
        id,
        subject,
        receiving_chain,
        esp,
        created_at: parse_datetime(&created_str),
    })
}

#[async_trait]
impl AnalysisStore for LibSqlBackend {
    async fn save_analysis(
        &self,
        subject: &str,
        receiving_chain: &[String],
        esp: &str,
    ) -> Result<AnalysisRecord, DatabaseError> {
        let record = AnalysisRecord {
            id: Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            receiving_chain: receiving_chain.to_vec(),
            esp: esp.to_string(),
            created_at: Utc::now(),
        };

        let chain_json = serde_json::to_string(&record.receiving_chain)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO analyses (id, subject, receiving_chain, esp, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.clone(),
                    record.subject.clone(),
                    chain_json,
                    record.esp.clone(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert analysis: {e}")))?;

        Ok(record)
    }

    async fn find_latest_by_subject(
        &self,
        subject: &str,
    ) -> Result<Option<AnalysisRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, subject, receiving_chain, esp, created_at
                 FROM analyses
                 WHERE subject = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![subject],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query analyses: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read analysis row: {e}")))?;

        match row {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }
}
