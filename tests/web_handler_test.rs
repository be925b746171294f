#![cfg(feature = "web")]
//! Web handler integration tests.
//!
//! Tests cover:
//! - Front page lists trained assets, risk parameters and missing models
//! - Starting a backtest refuses missing models (422) and concurrent runs (409)
//! - A started backtest finishes in the background and serves its report
//! - Status as JSON or as an HTMX fragment

mod common;

use arimatrader::adapters::file_config_adapter::FileConfigAdapter;
use arimatrader::adapters::web::{AppState, JobState, build_router};
use arimatrader::pipeline;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::*;

fn create_state(trained: &[&str]) -> Arc<AppState> {
    let config = FileConfigAdapter::from_string(&two_symbol_ini("unused", "unused")).unwrap();
    let data = two_symbol_port();
    let store = MemoryModelStore::new();
    for symbol in trained {
        let summary = pipeline::train(&config, &data, &store, Some(symbol)).unwrap();
        assert!(summary.is_complete());
    }
    Arc::new(AppState::new(Arc::new(config), Arc::new(data), Arc::new(store)))
}

async fn send(app: &Router, method: &str, uri: &str, htmx: bool) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if htmx {
        builder = builder.header("HX-Request", "true");
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn status_json(app: &Router) -> serde_json::Value {
    let (status, body) = send(app, "GET", "/backtest/status", false).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).unwrap()
}

mod index_tests {
    use super::*;

    #[tokio::test]
    async fn lists_trained_assets_and_parameters() {
        let app = build_router(create_state(&["AAA", "BBB"]));

        let (status, html) = send(&app, "GET", "/", false).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Alpha Corp"));
        assert!(html.contains("Beta Inc"));
        assert!(html.contains("2017-01-02 to "));
        assert!(html.contains("Cash at risk"));
        assert!(html.contains("50%"));
        assert!(html.contains("hx-post"));
        assert!(!html.contains("Missing models"));
    }

    #[tokio::test]
    async fn lists_missing_models() {
        let app = build_router(create_state(&["AAA"]));

        let (status, html) = send(&app, "GET", "/", false).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Missing models: BBB"));
    }

    #[tokio::test]
    async fn embeds_current_status_fragment() {
        let state = create_state(&["AAA", "BBB"]);
        *state.job() = JobState::Failed {
            message: "no data for BBB".into(),
        };
        let app = build_router(state);

        let (status, html) = send(&app, "GET", "/", false).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<div id=\"status\" class=\"status failed\""));
        assert!(html.contains("no data for BBB"));
    }

    #[tokio::test]
    async fn embeds_polling_fragment_while_running() {
        let state = create_state(&[]);
        *state.job() = JobState::Running;
        let app = build_router(state);

        let (_, html) = send(&app, "GET", "/", false).await;

        assert!(html.contains("hx-trigger=\"every 2s\""));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = build_router(create_state(&[]));

        let (status, html) = send(&app, "GET", "/nowhere", false).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(html.contains("page not found"));
    }
}

mod backtest_tests {
    use super::*;

    #[tokio::test]
    async fn refuses_when_models_are_missing() {
        let app = build_router(create_state(&["AAA"]));

        let (status, html) = send(&app, "POST", "/backtest", false).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(html.contains("missing models: BBB"));
        assert_eq!(status_json(&app).await["state"], "ready");
    }

    #[tokio::test]
    async fn refuses_while_running() {
        let state = create_state(&["AAA", "BBB"]);
        *state.job() = JobState::Running;
        let app = build_router(Arc::clone(&state));

        let (status, _) = send(&app, "POST", "/backtest", false).await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn runs_in_background_and_serves_report() {
        let app = build_router(create_state(&["AAA", "BBB"]));

        let (status, body) = send(&app, "POST", "/backtest", false).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let started: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(started["state"], "running");

        let mut state = status_json(&app).await;
        for _ in 0..600 {
            if state["state"] != "running" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            state = status_json(&app).await;
        }
        assert_eq!(state["state"], "succeeded", "status: {state}");
        assert!(state["message"].is_null());

        let (status, html) = send(&app, "GET", "/backtest/report", false).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Backtest Report"));
        assert!(html.contains("Trade Log"));
    }

    #[tokio::test]
    async fn report_is_not_found_before_a_run() {
        let app = build_router(create_state(&[]));

        let (status, _) = send(&app, "GET", "/backtest/report", false).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod status_tests {
    use super::*;

    #[tokio::test]
    async fn failure_message_is_reported() {
        let state = create_state(&[]);
        *state.job() = JobState::Failed {
            message: "no data for AAA".into(),
        };
        let app = build_router(state);

        let json = status_json(&app).await;

        assert_eq!(json["state"], "failed");
        assert_eq!(json["message"], "no data for AAA");
    }

    #[tokio::test]
    async fn htmx_gets_polling_fragment_while_running() {
        let state = create_state(&[]);
        *state.job() = JobState::Running;
        let app = build_router(state);

        let (status, html) = send(&app, "GET", "/backtest/status", true).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.starts_with("<div id=\"status\""));
        assert!(html.contains("hx-trigger=\"every 2s\""));
        assert!(!html.contains("<html"));
    }

    #[tokio::test]
    async fn htmx_fragment_links_finished_report() {
        let state = create_state(&[]);
        *state.job() = JobState::Succeeded {
            report: "<html>report</html>".into(),
        };
        let app = build_router(state);

        let (_, html) = send(&app, "GET", "/backtest/status", true).await;

        assert!(html.contains("succeeded"));
        assert!(html.contains("href=\"/backtest/report\""));
        assert!(!html.contains("hx-trigger"));

        let (status, report) = send(&app, "GET", "/backtest/report", false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report, "<html>report</html>");
    }
}
