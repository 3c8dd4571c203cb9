//! HTTP surface for workflow submissions.
//!
//! - `POST /replay` - run a workflow, answer with the run outcome
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus exposition (when enabled)

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::engine::ReplayEngine;
use crate::error::ReplayError;
use crate::metrics;
use crate::workflow::Workflow;

/// Largest workflow document accepted.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub struct AppState {
    pub engine: Arc<ReplayEngine>,
    /// Target for submissions without a url
    pub default_url: String,
    pub metrics: bool,
}

pub type SharedState = Arc<AppState>;

/// All routes of the surface.
pub fn routes(
    state: SharedState,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    let with_state = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    let replay = warp::path("replay")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state.clone())
        .and_then(handle_replay);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            }))
            .into_response()
        });

    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state)
        .and_then(handle_metrics);

    replay.or(health).unify().or(metrics_route).unify()
}

async fn handle_replay(
    body: bytes::Bytes,
    state: SharedState,
) -> Result<warp::reply::Response, Infallible> {
    let workflow = match Workflow::from_json_slice(&body, &state.default_url) {
        Ok(workflow) => workflow,
        Err(e) => {
            metrics::record_invalid_workflow();
            return Ok(error_reply(StatusCode::BAD_REQUEST, &e.to_string(), None));
        }
    };

    match state.engine.replay(&workflow).await {
        Ok(result) => match result.failure() {
            None => Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "ok": true, "result": result })),
                StatusCode::OK,
            )
            .into_response()),
            Some(failure) => {
                let message = failure.to_string();
                let result = serde_json::to_value(&result).ok();
                Ok(error_reply(StatusCode::BAD_GATEWAY, &message, result))
            }
        },
        Err(e @ ReplayError::InvalidWorkflow(_)) => {
            Ok(error_reply(StatusCode::BAD_REQUEST, &e.to_string(), None))
        }
    }
}

async fn handle_metrics(state: SharedState) -> Result<warp::reply::Response, Infallible> {
    if !state.metrics {
        return Ok(
            warp::reply::with_status("metrics disabled", StatusCode::NOT_FOUND).into_response(),
        );
    }
    match metrics::render() {
        Ok(text) => Ok(warp::reply::with_status(text, StatusCode::OK).into_response()),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            Ok(warp::reply::with_status(
                "Error encoding metrics".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response())
        }
    }
}

fn error_reply(
    status: StatusCode,
    message: &str,
    result: Option<serde_json::Value>,
) -> warp::reply::Response {
    let mut body = json!({ "ok": false, "error": message });
    if let Some(result) = result {
        body["result"] = result;
    }
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Serve until `cancel` fires. Returns once in-flight requests have drained.
pub async fn serve(listen: &str, state: SharedState, cancel: CancellationToken) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", listen))?;

    let engine = state.engine.clone();
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })
        .context("Failed to bind replay server")?;

    info!(addr = %bound, "replay server listening");
    server.await;

    // Nothing else will use the sessions once the listener is gone.
    engine.shutdown();
    info!("replay server stopped");
    Ok(())
}
