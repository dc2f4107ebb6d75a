//! Mailbox poller — fetches unseen probe emails on a fixed cadence and
//! persists their analyses.
//!
//! Every cycle is fire-and-forget-safe: connectivity, decode, and
//! persistence faults are logged and end the cycle (or skip the message)
//! without ever reaching the scheduler loop. `poll_once` is public so the
//! HTTP surface can trigger a cycle out-of-band; such a trigger may
//! overlap a timer cycle, which is tolerated because each invocation
//! opens its own mailbox connection and inserts are append-only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::Error;
use crate::mail::{esp, imap, parser};
use crate::store::{AnalysisRecord, AnalysisStore};

/// Spawn the background poll loop.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop
/// polling after the current tick.
pub fn spawn_mail_poller(
    config: Arc<AppConfig>,
    store: Arc<dyn AnalysisStore>,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            "Mail poller started — checking {} every {}s for subject \"{}\"",
            config.mailbox.host, config.poll_interval_secs, config.target_subject
        );

        let mut tick = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Mail poller shutting down");
                return;
            }

            poll_once(&config, &store).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run a single poll cycle: fetch unseen matches → parse → analyze → save.
///
/// Messages are already flagged `\Seen` by the time they reach the parser
/// (see `mail::imap`), so a parse or save failure forfeits that message's
/// analysis — it will not be retried.
pub async fn poll_once(config: &AppConfig, store: &Arc<dyn AnalysisStore>) {
    let mailbox = config.mailbox.clone();
    let subject = config.target_subject.clone();

    let fetched = tokio::task::spawn_blocking(move || {
        imap::fetch_unseen_matching(&mailbox, &subject)
    })
    .await;

    let messages = match fetched {
        Ok(Ok(messages)) => messages,
        Ok(Err(e)) => {
            error!("Mailbox poll failed: {e}");
            return;
        }
        Err(e) => {
            error!("Mailbox poll task panicked: {e}");
            return;
        }
    };

    if messages.is_empty() {
        return;
    }

    info!("Found {} new probe email(s)", messages.len());

    for message in &messages {
        match analyze_and_store(&message.body, store).await {
            Ok(record) => info!(subject = %record.subject, esp = %record.esp, "Saved analysis"),
            // The message is already flagged seen — its analysis is
            // forfeited, not retried.
            Err(e) => error!(seq = %message.seq, "Skipping message: {e}"),
        }
    }
}

/// Analyze one raw message and persist the result.
async fn analyze_and_store(
    raw: &[u8],
    store: &Arc<dyn AnalysisStore>,
) -> Result<AnalysisRecord, Error> {
    let probe = parser::parse_message(raw)?;

    let chain = probe.headers.receiving_chain();
    let esp = esp::classify(&probe.headers);
    debug!(
        subject = %probe.subject,
        hops = chain.len(),
        esp = %esp,
        "Analyzed probe email"
    );

    let record = store.save_analysis(&probe.subject, &chain, &esp).await?;
    Ok(record)
}
