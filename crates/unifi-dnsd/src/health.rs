//! Liveness, readiness and metrics endpoints
//!
//! Served on a separate listener so probes keep working while the webhook
//! listener is busy.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use unifi_dns_core::ReadinessCache;

use crate::metrics::PrometheusRecorder;

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    message: &'static str,
}

#[derive(Clone)]
struct HealthState {
    readiness: Arc<ReadinessCache>,
    recorder: Arc<PrometheusRecorder>,
    cancel: CancellationToken,
}

/// Build the health router
pub fn router(
    readiness: Arc<ReadinessCache>,
    recorder: Arc<PrometheusRecorder>,
    cancel: CancellationToken,
) -> Router {
    let routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics));

    crate::http_layers(routes).with_state(HealthState {
        readiness,
        recorder,
        cancel,
    })
}

async fn healthz() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        message: "Service is alive",
    })
}

async fn readyz(State(state): State<HealthState>) -> (StatusCode, Json<HealthStatus>) {
    let cancel = state.cancel.child_token();
    if state.readiness.check(&cancel).await {
        (
            StatusCode::OK,
            Json(HealthStatus {
                status: "ok",
                message: "Service is ready",
            }),
        )
    } else {
        debug!("readiness check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "error",
                message: "Service is not ready",
            }),
        )
    }
}

async fn metrics(State(state): State<HealthState>) -> Response {
    match state.recorder.encode() {
        Ok((content_type, body)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
