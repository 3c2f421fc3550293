//! Scanner - one full pass over every project in the cluster.
//!
//! Failure to list projects aborts the cycle before anything is reported.
//! Everything below that is isolated: a namespace whose listing fails, or a
//! single entity whose status cannot be fetched or registered, is logged and
//! skipped while the rest of the cycle continues.

use crate::cluster::{ClusterClient, ClusterError};
use crate::series::{ReportOutcome, SeriesRegistry};
use crate::status;
use ocp_metrics_types::{BuildConfig, CycleSummary, IdentityKey, MetricFamily};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
pub enum ScanError {
    /// Projects could not be listed; nothing was reported
    ListProjects(ClusterError),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::ListProjects(e) => write!(f, "Failed to list projects: {}", e),
        }
    }
}

impl std::error::Error for ScanError {}

pub struct Scanner {
    client: Arc<dyn ClusterClient>,
    series: Arc<SeriesRegistry>,
}

impl Scanner {
    pub fn new(client: Arc<dyn ClusterClient>, series: Arc<SeriesRegistry>) -> Self {
        Self { client, series }
    }

    /// Run one scan cycle over all projects
    pub async fn run_cycle(&self) -> Result<CycleSummary, ScanError> {
        let started = Instant::now();
        let mut summary = CycleSummary {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        };

        log::info!("[OCP_METRICS] scanning projects");

        let projects = self.client.list_projects().await.map_err(|e| {
            log::error!(
                "[OCP_METRICS] Failed to list projects, skipping cycle: {}",
                e
            );
            ScanError::ListProjects(e)
        })?;

        for project in &projects {
            let namespace = project.name.as_str();
            self.scan_deployment_configs(namespace, &mut summary).await;
            self.scan_build_configs(namespace, &mut summary).await;
            summary.projects_scanned += 1;
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;

        log::info!(
            "[OCP_METRICS] Scanned {} projects ({} bc, {} dc, {} new series, {} errors) in {}ms",
            summary.projects_scanned,
            summary.build_configs_reported,
            summary.deployment_configs_reported,
            summary.series_registered,
            summary.errors,
            summary.duration_ms
        );

        Ok(summary)
    }

    async fn scan_deployment_configs(&self, namespace: &str, summary: &mut CycleSummary) {
        let deployment_configs = match self.client.list_deployment_configs(namespace).await {
            Ok(dcs) => dcs,
            Err(e) => {
                log::warn!(
                    "[OCP_METRICS] Error listing deployment configs in {}: {}",
                    namespace,
                    e
                );
                summary.errors += 1;
                return;
            }
        };

        for dc in &deployment_configs {
            let failed = status::deployment_failed(&dc.conditions);
            let key = IdentityKey::new(namespace, dc.name.as_str());
            if self.record(MetricFamily::LastDeploymentFailed, key, failed, summary) {
                summary.deployment_configs_reported += 1;
            }
        }
    }

    async fn scan_build_configs(&self, namespace: &str, summary: &mut CycleSummary) {
        let build_configs = match self.client.list_build_configs(namespace).await {
            Ok(bcs) => bcs,
            Err(e) => {
                log::warn!(
                    "[OCP_METRICS] Error listing build configs in {}: {}",
                    namespace,
                    e
                );
                summary.errors += 1;
                return;
            }
        };

        for bc in &build_configs {
            let failed = match self.last_build_failed(bc).await {
                Ok(failed) => failed,
                Err(e) => {
                    log::warn!(
                        "[OCP_METRICS] Error fetching last build of bc/{} in {}: {}",
                        bc.name,
                        namespace,
                        e
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            let key = IdentityKey::new(namespace, bc.name.as_str());
            if self.record(MetricFamily::LastBuildFailed, key, failed, summary) {
                summary.build_configs_reported += 1;
            }
        }
    }

    /// Never-built configs and missing builds count as not failed
    async fn last_build_failed(&self, bc: &BuildConfig) -> Result<bool, ClusterError> {
        let Some(build_name) = bc.last_build_name() else {
            return Ok(false);
        };
        let build = self.client.get_build(&bc.namespace, &build_name).await?;
        Ok(status::build_failed(build.as_ref()))
    }

    fn record(
        &self,
        family: MetricFamily,
        key: IdentityKey,
        failed: bool,
        summary: &mut CycleSummary,
    ) -> bool {
        let label = key.to_string();
        match self.series.report(family, key, failed) {
            Ok(outcome) => {
                if outcome == ReportOutcome::Registered {
                    summary.series_registered += 1;
                }
                true
            }
            Err(e) => {
                log::warn!(
                    "[OCP_METRICS] Failed to report {} for {}: {}",
                    family,
                    label,
                    e
                );
                summary.errors += 1;
                false
            }
        }
    }
}
