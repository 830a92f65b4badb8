//! HTTP surface of the exporter.
//!
//! `/metrics` runs one collection cycle per scrape and renders it in the
//! Prometheus text format. `/healthz` and `/readyz` are the usual liveness
//! and readiness probes.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::collector::Engine;
use crate::exposition::{self, CONTENT_TYPE};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    db: Option<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

/// Scrape endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let samples = state.engine.collect().await;

    match exposition::render(&samples) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, samples = samples.len(), "Exposition render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", err)).into_response()
        }
    }
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        db: None,
    })
}

/// Readiness probe that checks the database is reachable.
async fn readyz_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok".to_string(),
            db: Some("ready".to_string()),
        })
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "not_ready".to_string(),
                    db: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{EngineConfig, MetricRegistry};
    use crate::collector::testing::ScriptedSource;
    use crate::row;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state(source: ScriptedSource) -> AppState {
        let config = EngineConfig {
            host_name: Some("db-01".into()),
            ..EngineConfig::default()
        };
        let engine = Engine::new_in(config, Arc::new(source), MetricRegistry::new())
            .expect("Failed to build engine");
        AppState {
            engine: Arc::new(engine),
        }
    }

    async fn send(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let source = ScriptedSource::new("db1")
            .with_rows("*/ 1 FROM DUAL", vec![row![1_i64]])
            .with_rows("SYSJOBHISTORIES2", vec![row![2_i64]]);
        let app = create_router(create_test_state(source));

        let (status, content_type, body) = send(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(body.contains("dmdbms_dual_info 1"), "body: {body}");
        assert!(body.contains(r#"dmdbms_joblog_error_num{host_name="db-01"} 2"#), "body: {body}");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_with_failing_probes() {
        // Nothing scripted: every query fails, DUAL still reports 0.
        let app = create_router(create_test_state(ScriptedSource::new("db1")));

        let (status, _, body) = send(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("dmdbms_dual_info 0"), "body: {body}");
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = create_router(create_test_state(ScriptedSource::new("db1").unreachable()));

        let (status, _, body) = send(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_readyz() {
        let app = create_router(create_test_state(ScriptedSource::new("db1")));
        let (status, _, body) = send(app, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""status":"ok""#));

        let app = create_router(create_test_state(ScriptedSource::new("db1").unreachable()));
        let (status, _, body) = send(app, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains(r#""status":"not_ready""#));
    }
}
