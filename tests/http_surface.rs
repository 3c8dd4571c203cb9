//! HTTP submission surface tests.
//!
//! Drives the warp routes in-process against the scripted surface.

use std::sync::Arc;
use std::time::Duration;

use clickreplay::driver::{ScriptedDriver, SurfaceCall};
use clickreplay::server::{AppState, routes};
use clickreplay::{EngineConfig, ReplayEngine};
use serde_json::{Value, json};
use warp::http::StatusCode;

fn app(driver: &ScriptedDriver) -> Arc<AppState> {
    let engine = ReplayEngine::new(
        Arc::new(driver.clone()),
        EngineConfig {
            teardown_grace: Duration::ZERO,
            base_char_delay: Duration::ZERO,
            ..Default::default()
        },
    );
    Arc::new(AppState {
        engine: Arc::new(engine),
        default_url: "about:blank".to_string(),
        metrics: true,
    })
}

async fn post(driver: &ScriptedDriver, body: Value) -> (StatusCode, Value) {
    let resp = warp::test::request()
        .method("POST")
        .path("/replay")
        .json(&body)
        .reply(&routes(app(driver)))
        .await;
    let parsed = serde_json::from_slice(resp.body()).unwrap();
    (resp.status(), parsed)
}

// ── Submissions ─────────────────────────────────────────────────────────────

mod submissions {
    use super::*;

    #[tokio::test]
    async fn test_completed_run_reports_ok() {
        let driver = ScriptedDriver::with_selectors(["#a", "#b"]);
        let (status, body) = post(
            &driver,
            json!({
                "url": "https://example.com",
                "speed": 1,
                "steps": [
                    { "type": "click", "selector": "#a", "delay": 0 },
                    { "type": "type", "selector": "#b", "value": "hi", "delay": 0 }
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["result"]["steps"].as_array().unwrap().len(), 2);
        assert_eq!(body["result"]["steps"][1]["outcome"]["status"], "executed");
    }

    #[tokio::test]
    async fn test_partial_failure_still_reports_ok() {
        let driver = ScriptedDriver::new();
        let (status, body) = post(
            &driver,
            json!({ "steps": [{ "type": "click", "selector": "#stale", "delay": 0 }] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["result"]["steps"][0]["outcome"]["status"], "failed");
    }

    #[tokio::test]
    async fn test_missing_url_uses_default_target() {
        let driver = ScriptedDriver::permissive();
        let (status, _) = post(
            &driver,
            json!({ "steps": [{ "type": "click", "x": 1, "y": 1 }] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(driver.journal().contains(&SurfaceCall::Navigate {
            session: 0,
            uri: "about:blank".into()
        }));
    }
}

// ── Rejections ──────────────────────────────────────────────────────────────

mod rejections {
    use super::*;

    #[tokio::test]
    async fn test_empty_steps_rejected() {
        let driver = ScriptedDriver::permissive();
        let (status, body) = post(&driver, json!({ "steps": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("invalid workflow"));
        assert_eq!(driver.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_missing_and_non_array_steps_rejected() {
        let driver = ScriptedDriver::permissive();
        for doc in [json!({ "url": "https://example.com" }), json!({ "steps": 3 })] {
            let (status, body) = post(&driver, doc).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["ok"], false);
        }
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let driver = ScriptedDriver::permissive();
        let resp = warp::test::request()
            .method("POST")
            .path("/replay")
            .body("{ not json")
            .reply(&routes(app(&driver)))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_error_object() {
        let driver = ScriptedDriver::permissive().failing_navigation();
        let (status, body) = post(
            &driver,
            json!({
                "url": "https://unreachable.example",
                "steps": [{ "type": "click", "selector": "#a" }]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().starts_with("navigation error"));
        assert_eq!(body["result"]["steps"], json!([]));
    }

    #[tokio::test]
    async fn test_get_replay_not_allowed() {
        let driver = ScriptedDriver::permissive();
        let resp = warp::test::request()
            .method("GET")
            .path("/replay")
            .reply(&routes(app(&driver)))
            .await;
        assert!(resp.status().is_client_error());
    }
}

// ── Metrics ─────────────────────────────────────────────────────────────────

mod metrics_endpoint {
    use super::*;

    #[tokio::test]
    async fn test_metrics_exposes_run_counters() {
        let driver = ScriptedDriver::permissive();
        post(
            &driver,
            json!({ "steps": [{ "type": "click", "selector": "#a" }] }),
        )
        .await;

        let resp = warp::test::request()
            .method("GET")
            .path("/metrics")
            .reply(&routes(app(&driver)))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let text = String::from_utf8_lossy(resp.body());
        assert!(text.contains("clickreplay_runs_total"));
        assert!(text.contains("clickreplay_steps_total"));
    }
}
