//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, info};

use crate::client::SensorSource;
use crate::collector::{OPENMETRICS_CONTENT_TYPE, SharedCollector};

/// Per-request deadline. Longer than a sensor fetch so a slow sensor still
/// yields `up 0` instead of a failed scrape.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const ROOT_PAGE: &str = include_str!("../assets/index.html");

/// Application state shared across handlers.
struct AppState<S> {
    collector: SharedCollector<S>,
    root_page: Arc<str>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
            root_page: self.root_page.clone(),
        }
    }
}

/// Create the HTTP router.
fn create_router<S>(collector: SharedCollector<S>, metrics_path: &str) -> Router
where
    S: SensorSource + 'static,
{
    let state = AppState {
        collector,
        root_page: ROOT_PAGE.replace("{metrics_path}", metrics_path).into(),
    };

    Router::new()
        .route("/", get(root_handler::<S>))
        .route(metrics_path, get(metrics_handler::<S>))
        .route("/health", get(health_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Handler for the root page.
async fn root_handler<S: SensorSource + 'static>(State(state): State<AppState<S>>) -> Html<String> {
    Html(state.root_page.to_string())
}

/// Handler for the metrics endpoint. Always answers 200; sensor trouble shows
/// up as `up 0`.
async fn metrics_handler<S: SensorSource + 'static>(State(state): State<AppState<S>>) -> Response {
    let body = state.collector.render().await;
    debug!(bytes = body.len(), "Served scrape");

    (
        StatusCode::OK,
        [("content-type", OPENMETRICS_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer<S> {
    collector: SharedCollector<S>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl<S: SensorSource + 'static> HttpServer<S> {
    /// Create a new HTTP server.
    pub fn new(collector: SharedCollector<S>, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.collector, &self.metrics_path);
        let addr = listener.local_addr()?;

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SensorError;
    use crate::collector::TemperatureCollector;
    use axum::body::Body;
    use axum::http::Request;
    use picotemp_common::Reading;
    use tower::ServiceExt;

    struct StaticSensor(Option<f64>);

    impl SensorSource for StaticSensor {
        async fn fetch(&self, _endpoint: &str) -> Result<Reading, SensorError> {
            self.0
                .map(Reading::from_celsius)
                .ok_or_else(|| SensorError::Unreachable("down".to_string()))
        }
    }

    fn make_collector(celsius: Option<f64>) -> SharedCollector<StaticSensor> {
        Arc::new(TemperatureCollector::new(
            StaticSensor(celsius),
            "http://sensor.invalid/",
            "pico",
        ))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let router = create_router(make_collector(Some(21.0)), "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("openmetrics-text"));

        let body = body_string(response).await;
        assert!(body.contains("pico_temperature{unit=\"celsius\"} 21"));
        assert!(body.contains("pico_up 1"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_sensor_down() {
        let router = create_router(make_collector(None), "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // Scrapes never fail because of the sensor
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("pico_up 0"));
    }

    #[tokio::test]
    async fn test_root_page_links_metrics_path() {
        let router = create_router(make_collector(Some(21.0)), "/prometheus/metrics");

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("href=\"/prometheus/metrics\""));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = create_router(make_collector(None), "/metrics");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = create_router(make_collector(Some(21.0)), "/prometheus/metrics");

        let response = router
            .clone()
            .oneshot(
                Request::get("/prometheus/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
