//! Error types for mailtrace.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mailbox error: {0}")]
    Mail(#[from] MailError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Configuration-related errors. Fatal at startup — nothing is served
/// until the full configuration is present and valid.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors. `find_latest_by_subject` returning no record
/// is NOT an error — it is an `Ok(None)` outcome.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Mailbox access errors. Each variant maps to one stage of the poll
/// cycle so the poller can log where a cycle died; none of them escalate
/// past the cycle.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Login failed for {user}")]
    Login { user: String },

    #[error("Failed to open inbox: {0}")]
    Inbox(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Fetch failed for message {uid}: {reason}")]
    Fetch { uid: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message decode errors. A message that fails to parse is logged and
/// skipped; it has already been flagged seen, so it is never retried.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Message could not be parsed ({size} bytes)")]
    Malformed { size: usize },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
