use std::sync::Arc;

use anyhow::Context;

use mailtrace::api::{ApiState, email_routes};
use mailtrace::config::AppConfig;
use mailtrace::mail::spawn_mail_poller;
use mailtrace::store::{AnalysisStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Configuration is the only fatal-to-process error class: nothing is
    // served until every required variable is present.
    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  Required: IMAP_HOST, IMAP_USER, IMAP_PASSWORD, TARGET_SUBJECT, MAILTRACE_DB_PATH");
            std::process::exit(1);
        }
    };

    eprintln!("📬 mailtrace v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mailbox: {}:{} as {}", config.mailbox.host, config.mailbox.port, config.mailbox.user);
    eprintln!("   Target subject: {}", config.target_subject);
    eprintln!("   Poll interval: {}s", config.poll_interval_secs);
    eprintln!("   API: http://0.0.0.0:{}/email", config.http_port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn AnalysisStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    eprintln!("   Database: {}\n", config.db_path.display());

    // ── Poller ───────────────────────────────────────────────────────────
    let (_poller_handle, _poller_shutdown) =
        spawn_mail_poller(Arc::clone(&config), Arc::clone(&store));

    // ── HTTP API ─────────────────────────────────────────────────────────
    let app = email_routes(ApiState {
        config: Arc::clone(&config),
        store,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("Failed to bind API port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "API server started");

    axum::serve(listener, app)
        .await
        .context("API server exited")?;

    Ok(())
}
