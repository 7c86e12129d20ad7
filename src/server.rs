//! Scrape endpoint — serves the registry in Prometheus text format.
//!
//! Read-only: handlers gather from the registry and never touch the poll
//! driver.

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::poller::wait_for_shutdown;

#[derive(Clone)]
struct AppState {
    registry: Registry,
}

pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .with_state(AppState { registry })
}

/// Serve until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    registry: Registry,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "Serving /metrics");
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
        .await?;
    Ok(())
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let families = state.registry.gather();
    let mut body = Vec::new();

    match encoder.encode(&families, &mut body) {
        Ok(()) => (
            [(http::header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::QuotaMetrics;
    use crate::normalize::{Metric, MetricPoint};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn registry_with(points: &[MetricPoint]) -> Registry {
        let registry = Registry::new();
        let metrics = QuotaMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        metrics.publish(points);
        registry
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(http::header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_generation() {
        let registry = registry_with(&[MetricPoint {
            metric: Metric::ComputeFlavorsUsed,
            region: "region-a".into(),
            project: "proj-1".into(),
            qualifier: Some("m1.small".into()),
            value: 1.0,
        }]);

        let (status, content_type, body) = get_body(router(registry), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/plain"));
        assert!(body.contains(
            r#"syseleven_compute_flavors_used{flavor="m1.small",project="proj-1",region="region-a"} 1"#
        ));
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, _, body) = get_body(router(Registry::new()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (status, _, _) = get_body(router(Registry::new()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(serve(listener, Registry::new(), rx));

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
