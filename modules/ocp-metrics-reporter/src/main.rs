//! OCP Project Metrics Reporter: scans every project in an OpenShift cluster
//! and exports "last build failed" / "last deployment failed" gauges.
//!
//! Serves the Prometheus exposition and a status RPC on the same port.
//! Default: http://0.0.0.0:8080/metrics

mod cluster;
mod config;
mod gauge_registry;
mod openshift_api;
mod routes;
mod scanner;
mod series;
mod status;
mod worker;

use cluster::ClusterClient;
use config::Config;
use gauge_registry::PrometheusGaugeRegistry;
use ocp_metrics_types::APPLICATION_NAME;
use openshift_api::OpenShiftClient;
use routes::AppState;
use scanner::Scanner;
use series::SeriesRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use worker::SharedWorkerStatus;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Using cluster API at: {}", config.api_url);
    if config.token.is_none() {
        log::warn!("No API token configured, requests will be anonymous");
    }

    let client: Arc<dyn ClusterClient> = match OpenShiftClient::from_config(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            log::error!("Failed to create cluster client: {}", e);
            std::process::exit(1);
        }
    };

    let gauges = match PrometheusGaugeRegistry::new(APPLICATION_NAME) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            log::error!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    let series = Arc::new(SeriesRegistry::new(gauges.clone()));
    let scanner = Arc::new(Scanner::new(client, series.clone()));

    let worker_status = SharedWorkerStatus::default();
    let interval = Duration::from_secs(config.scan_interval_secs);
    tokio::spawn(worker::run_worker(scanner, interval, worker_status.clone()));
    log::info!(
        "Background worker started (scan interval: {}s)",
        config.scan_interval_secs
    );

    let state = Arc::new(AppState {
        gauges,
        series,
        worker_status,
        start_time: Instant::now(),
        scan_interval_secs: config.scan_interval_secs,
    });

    let app = routes::router(state);

    let addr = config.listen_addr();
    log::info!("OCP Metrics Reporter listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
