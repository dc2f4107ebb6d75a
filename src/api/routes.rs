//! REST endpoints for probe analysis results.
//!
//! Thin plumbing over the core: configuration echo, result lookup by
//! subject, a fixture writer for exercising the read path, and a manual
//! poll trigger. Not-found is a 404 with a JSON error body — distinct
//! from a 500, which means the store itself failed.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::config::AppConfig;
use crate::mail::poll_once;
use crate::store::AnalysisStore;

/// Fixture receiving chain used by `/email/create-test-data` — a known
/// three-hop Gmail delivery, oldest hop first.
const TEST_CHAIN: &[&str] = &[
    "from mail-sor-f41.google.com (mail-sor-f41.google.com [209.85.220.41]) by mx.google.com",
    "from smtp.gmail.com (smtp.gmail.com [74.125.82.108]) by mail-sor-f41.google.com",
    "from [192.168.1.100] by smtp.gmail.com with ESMTPSA",
];

/// Shared state for the email routes.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AnalysisStore>,
}

/// GET /email/target-info
///
/// Where to send the probe email and which subject it must carry.
async fn target_info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "emailAddress": state.config.mailbox.user,
        "subject": state.config.target_subject,
    }))
}

/// GET /email/results/{subject}
///
/// Latest analysis for the subject, or 404 if none has been stored yet.
async fn result_by_subject(
    State(state): State<ApiState>,
    Path(subject): Path<String>,
) -> impl IntoResponse {
    match state.store.find_latest_by_subject(&subject).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!(
                    "Analysis for subject \"{subject}\" not found yet. Please wait or try again."
                ),
            })),
        )
            .into_response(),
        Err(e) => {
            error!(subject = %subject, "Result lookup failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to query analyses"})),
            )
                .into_response()
        }
    }
}

/// GET /email/create-test-data
///
/// Persist one fixture record so the read path can be exercised without
/// sending a real probe email.
async fn create_test_data(State(state): State<ApiState>) -> impl IntoResponse {
    let chain: Vec<String> = TEST_CHAIN.iter().map(|s| s.to_string()).collect();
    match state
        .store
        .save_analysis(
            &state.config.target_subject,
            &chain,
            "Gmail / Google Workspace",
        )
        .await
    {
        Ok(record) => Json(serde_json::json!({
            "message": "Test data created successfully",
            "data": record,
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to create test data: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to create test data"})),
            )
                .into_response()
        }
    }
}

/// GET /email/check-emails
///
/// Trigger one poll cycle out-of-band from the timer. Returns
/// immediately; the cycle runs in the background and may overlap a timer
/// cycle (each opens its own mailbox connection).
async fn check_emails(State(state): State<ApiState>) -> impl IntoResponse {
    let config = Arc::clone(&state.config);
    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        poll_once(&config, &store).await;
    });

    Json(serde_json::json!({"message": "Email check triggered manually"}))
}

/// Build the email REST routes.
pub fn email_routes(state: ApiState) -> Router {
    Router::new()
        .route("/email/target-info", get(target_info))
        .route("/email/results/{subject}", get(result_by_subject))
        .route("/email/create-test-data", get(create_test_data))
        .route("/email/check-emails", get(check_emails))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::MailboxConfig;
    use crate::store::LibSqlBackend;

    async fn test_state() -> ApiState {
        let store: Arc<dyn AnalysisStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let config = Arc::new(AppConfig {
            mailbox: MailboxConfig {
                host: "127.0.0.1".into(),
                // Nothing listens here; the manual-trigger test only
                // checks the acknowledgement, not a real poll.
                port: 1,
                user: "probe@example.com".into(),
                password: SecretString::from("secret".to_string()),
            },
            target_subject: "Probe-123".into(),
            db_path: ":memory:".into(),
            http_port: 0,
            poll_interval_secs: 10,
        });
        ApiState { config, store }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn target_info_reflects_config() {
        let state = test_state().await;
        let (status, json) = get_json(email_routes(state), "/email/target-info").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["emailAddress"], "probe@example.com");
        assert_eq!(json["subject"], "Probe-123");
    }

    #[tokio::test]
    async fn unknown_subject_is_404_not_500() {
        let state = test_state().await;
        let (status, json) = get_json(email_routes(state), "/email/results/Probe-123").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error = json["error"].as_str().unwrap();
        assert!(error.contains("not found yet"), "got: {error}");
    }

    #[tokio::test]
    async fn stored_result_is_served_with_camel_case_fields() {
        let state = test_state().await;
        state
            .store
            .save_analysis(
                "Probe-123",
                &["from A by B".to_string(), "from B by C".to_string()],
                "Gmail / Google Workspace",
            )
            .await
            .unwrap();

        let (status, json) = get_json(email_routes(state), "/email/results/Probe-123").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["esp"], "Gmail / Google Workspace");
        assert_eq!(json["receivingChain"][0], "from A by B");
        assert!(json["createdAt"].is_string());
    }

    #[tokio::test]
    async fn create_test_data_persists_the_fixture() {
        let state = test_state().await;
        let (status, json) =
            get_json(email_routes(state.clone()), "/email/create-test-data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Test data created successfully");
        assert_eq!(json["data"]["esp"], "Gmail / Google Workspace");

        let stored = state
            .store
            .find_latest_by_subject("Probe-123")
            .await
            .unwrap()
            .expect("fixture should be stored");
        assert_eq!(stored.receiving_chain.len(), 3);
    }

    #[tokio::test]
    async fn manual_check_is_acknowledged_immediately() {
        let state = test_state().await;
        let (status, json) = get_json(email_routes(state), "/email/check-emails").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Email check triggered manually");
    }
}
