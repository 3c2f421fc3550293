//! Axum route handlers for the metrics endpoint and the status RPC.

use crate::gauge_registry::PrometheusGaugeRegistry;
use crate::series::SeriesRegistry;
use crate::worker::SharedWorkerStatus;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use ocp_metrics_types::*;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub gauges: Arc<PrometheusGaugeRegistry>,
    pub series: Arc<SeriesRegistry>,
    pub worker_status: SharedWorkerStatus,
    pub start_time: Instant,
    pub scan_interval_secs: u64,
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    let cors = tower_http::cors::CorsLayer::permissive();

    axum::Router::new()
        .route("/metrics", axum::routing::get(metrics))
        .route("/health", axum::routing::get(health))
        .route("/rpc/status", axum::routing::get(status))
        .route("/rpc/series", axum::routing::get(series_list))
        .with_state(state)
        .layer(cors)
}

// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.gauges.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.gauges.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            log::error!("[OCP_METRICS] Failed to render metrics: {}", e);
            let body = e.to_string();
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

// GET /health
pub async fn health() -> &'static str {
    "ok"
}

// GET /rpc/status
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<ServiceStatus>>) {
    let worker = state.worker_status.read();

    let status = ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        scan_interval_secs: state.scan_interval_secs,
        last_tick_at: worker.last_tick_at.clone(),
        last_cycle: worker.last_cycle.clone(),
        last_error: worker.last_error.clone(),
        cycles_completed: worker.cycles_completed,
        cycles_failed: worker.cycles_failed,
        families: state.series.family_status(),
    };

    (StatusCode::OK, Json(RpcResponse::ok(status)))
}

// GET /rpc/series
pub async fn series_list(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<Vec<SeriesSnapshot>>>) {
    let series = state.series.snapshot();
    (StatusCode::OK, Json(RpcResponse::ok(series)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge_registry::tests::sample;
    use crate::worker::WorkerStatus;

    fn state() -> Arc<AppState> {
        let gauges = Arc::new(PrometheusGaugeRegistry::new(APPLICATION_NAME).unwrap());
        let series = Arc::new(SeriesRegistry::new(gauges.clone()));
        Arc::new(AppState {
            gauges,
            series,
            worker_status: SharedWorkerStatus::default(),
            start_time: Instant::now(),
            scan_interval_secs: 60,
        })
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_reported_series() {
        let state = state();
        let key = IdentityKey::new("ns1", "app");
        state
            .series
            .report(MetricFamily::LastDeploymentFailed, key, true)
            .unwrap();

        let response = metrics(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/plain"));

        let text = body_text(response).await;
        let labels = [
            ("namespace", "ns1"),
            ("dc", "app"),
            ("application", APPLICATION_NAME),
        ];
        let value = sample(&text, "ocp_dc_last_deployment_failed", &labels);
        assert_eq!(value, Some(1.0));
    }

    #[tokio::test]
    async fn test_status_reports_worker_and_families() {
        let state = state();
        let key = IdentityKey::new("ns1", "app");
        state
            .series
            .report(MetricFamily::LastBuildFailed, key, true)
            .unwrap();
        {
            let mut worker = state.worker_status.write();
            *worker = WorkerStatus {
                last_tick_at: Some("2026-01-01T00:00:00+00:00".into()),
                last_error: Some("Failed to list projects: timeout".into()),
                cycles_completed: 3,
                cycles_failed: 1,
                ..Default::default()
            };
        }

        let (code, Json(response)) = status(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        let data = response.data.unwrap();
        assert_eq!(data.scan_interval_secs, 60);
        assert_eq!(data.cycles_completed, 3);
        assert_eq!(data.cycles_failed, 1);
        let last_error = data.last_error.as_deref();
        assert_eq!(last_error, Some("Failed to list projects: timeout"));

        let builds = &data.families[0];
        assert_eq!(builds.family, MetricFamily::LastBuildFailed);
        assert_eq!(builds.metric_name, "ocp_bc_last_build_failed");
        assert_eq!(builds.series, 1);
        assert_eq!(builds.failing, 1);
    }

    #[tokio::test]
    async fn test_series_list_is_sorted() {
        let state = state();
        for (namespace, name) in [("ns2", "web"), ("ns1", "db"), ("ns1", "app")] {
            let key = IdentityKey::new(namespace, name);
            state
                .series
                .report(MetricFamily::LastBuildFailed, key, false)
                .unwrap();
        }

        let (_, Json(response)) = series_list(State(state)).await;
        let series = response.data.unwrap();
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["app", "db", "web"]);
    }

    #[tokio::test]
    async fn test_router_serves_metrics_over_http() {
        let state = state();
        let key = IdentityKey::new("ns1", "app");
        state
            .series
            .report(MetricFamily::LastBuildFailed, key, false)
            .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let client = reqwest::Client::new();
        let health = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(health, "ok");

        let text = client
            .get(format!("http://{}/metrics", addr))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let labels = [("namespace", "ns1"), ("bc", "app")];
        let value = sample(&text, "ocp_bc_last_build_failed", &labels);
        assert_eq!(value, Some(0.0));
    }
}
