//! Integration tests for the full analysis pipeline: raw probe message →
//! parse → receiving chain + ESP classification → store → query.
//!
//! No mailbox involved — these start where the IMAP fetch hands raw
//! message bytes to the parser.

use std::sync::Arc;

use mailtrace::mail::{classify, parse_message};
use mailtrace::store::{AnalysisStore, LibSqlBackend};

/// A probe email as fetched from the mailbox: two Received headers in
/// newest-first wire order, and a Gmail message-id.
const PROBE: &[u8] = b"Received: from B by C; Tue, 7 Jul 2026 10:00:02 +0000\r\n\
Received: from A by B; Tue, 7 Jul 2026 10:00:01 +0000\r\n\
Message-ID: <probe-run-1@gmail.com>\r\n\
From: someone@gmail.com\r\n\
To: probe@example.com\r\n\
Subject: Probe-123\r\n\
\r\n\
probe body\r\n";

async fn analyze_and_store(raw: &[u8], store: &Arc<dyn AnalysisStore>) {
    let probe = parse_message(raw).expect("probe should parse");
    let chain = probe.headers.receiving_chain();
    let esp = classify(&probe.headers);
    store
        .save_analysis(&probe.subject, &chain, &esp)
        .await
        .expect("save should succeed");
}

#[tokio::test]
async fn probe_email_round_trips_through_the_pipeline() {
    let store: Arc<dyn AnalysisStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    analyze_and_store(PROBE, &store).await;

    let record = store
        .find_latest_by_subject("Probe-123")
        .await
        .unwrap()
        .expect("analysis should be stored");

    assert_eq!(
        record.receiving_chain,
        vec![
            "from A by B; Tue, 7 Jul 2026 10:00:01 +0000",
            "from B by C; Tue, 7 Jul 2026 10:00:02 +0000",
        ],
        "chain must be chronological, oldest hop first"
    );
    assert_eq!(record.esp, "Gmail / Google Workspace");
}

#[tokio::test]
async fn message_without_relay_headers_stores_an_empty_chain() {
    let store: Arc<dyn AnalysisStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    let raw = b"From: a@example.com\r\nTo: probe@example.com\r\nSubject: Probe-bare\r\n\r\nhi\r\n";
    analyze_and_store(raw, &store).await;

    let record = store
        .find_latest_by_subject("Probe-bare")
        .await
        .unwrap()
        .unwrap();
    assert!(record.receiving_chain.is_empty());
    assert_eq!(record.esp, "Unknown");
}

#[tokio::test]
async fn subjectless_message_is_stored_under_the_default_subject() {
    let store: Arc<dyn AnalysisStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    let raw = b"From: a@example.com\r\nTo: probe@example.com\r\n\r\nhi\r\n";
    analyze_and_store(raw, &store).await;

    let record = store
        .find_latest_by_subject("No Subject")
        .await
        .unwrap()
        .expect("default-subject record should exist");
    assert_eq!(record.esp, "Unknown");
}

#[tokio::test]
async fn reused_subject_returns_the_newest_analysis() {
    let store: Arc<dyn AnalysisStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    analyze_and_store(PROBE, &store).await;

    // A second probe with the same subject but a different origin.
    let second: &[u8] = b"Received: from relay.example.net by mx.example.org\r\n\
Return-Path: <bounce@sendgrid.net>\r\n\
Subject: Probe-123\r\n\
\r\n\
second run\r\n";
    analyze_and_store(second, &store).await;

    let record = store
        .find_latest_by_subject("Probe-123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.esp, "SendGrid");
    assert_eq!(record.receiving_chain.len(), 1);
}

#[tokio::test]
async fn analyses_survive_in_an_on_disk_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mailtrace.db");

    {
        let store: Arc<dyn AnalysisStore> =
            Arc::new(LibSqlBackend::new_local(&path).await.unwrap());
        analyze_and_store(PROBE, &store).await;
    }

    // Reopen the same file; the record must still be there.
    let reopened: Arc<dyn AnalysisStore> =
        Arc::new(LibSqlBackend::new_local(&path).await.unwrap());
    let record = reopened
        .find_latest_by_subject("Probe-123")
        .await
        .unwrap()
        .expect("record should persist across reopen");
    assert_eq!(record.esp, "Gmail / Google Workspace");
}
