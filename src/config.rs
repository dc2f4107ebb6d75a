//! Configuration types.
//!
//! One `AppConfig` is built from the environment at startup and handed by
//! `Arc` to the poller, the HTTP state, and the store. No component reads
//! the environment after that.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Mailbox (IMAP) connection settings.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (defaults to 993).
    pub port: u16,
    /// Mailbox login — also the address probe emails are sent to.
    pub user: String,
    /// Mailbox password. Only exposed at the LOGIN command.
    pub password: SecretString,
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Mailbox to poll for probe emails.
    pub mailbox: MailboxConfig,
    /// Exact subject a probe email must carry to be picked up.
    pub target_subject: String,
    /// Path of the libsql database file.
    pub db_path: PathBuf,
    /// Port the REST API listens on.
    pub http_port: u16,
    /// Poll cadence in seconds.
    pub poll_interval_secs: u64,
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// `IMAP_HOST`, `IMAP_USER`, `IMAP_PASSWORD`, `TARGET_SUBJECT` and
    /// `MAILTRACE_DB_PATH` are required; the rest fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = require_env("IMAP_HOST")?;

        let port: u16 = std::env::var("IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let user = require_env("IMAP_USER")?;
        let password = SecretString::from(require_env("IMAP_PASSWORD")?);

        let target_subject = require_env("TARGET_SUBJECT")?;
        // The subject is interpolated into a quoted IMAP SEARCH argument;
        // line breaks would terminate the command mid-string.
        if target_subject.contains('\r') || target_subject.contains('\n') {
            return Err(ConfigError::InvalidValue {
                key: "TARGET_SUBJECT".into(),
                message: "must not contain line breaks".into(),
            });
        }

        let db_path = PathBuf::from(require_env("MAILTRACE_DB_PATH")?);

        let http_port: u16 = std::env::var("MAILTRACE_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let poll_interval_secs: u64 = std::env::var("MAILTRACE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            mailbox: MailboxConfig {
                host,
                port,
                user,
                password,
            },
            target_subject,
            db_path,
            http_port,
            poll_interval_secs,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}
