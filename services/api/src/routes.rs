use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use zhiyuan::admissions::{report_router, AdmissionStore, ReportService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ServiceStatus {
    pub(crate) status: &'static str,
    pub(crate) message: &'static str,
}

pub(crate) fn with_report_routes<S>(service: Arc<ReportService<S>>) -> axum::Router
where
    S: AdmissionStore + 'static,
{
    report_router(service)
        .route("/api/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .layer(cors())
}

/// Browser clients on any origin may call the API.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ])
}

pub(crate) async fn healthcheck() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok",
        message: "admission advisory service is running",
    })
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let (status, payload) = if ready {
        (
            StatusCode::OK,
            ServiceStatus {
                status: "ready",
                message: "distribution and store loaded",
            },
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ServiceStatus {
                status: "initializing",
                message: "loading distribution and store",
            },
        )
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
