//! OpenShift REST API client.
//!
//! Implements [`ClusterClient`] with plain GET requests against the project,
//! build and apps API groups, authenticated with a bearer token.

use crate::cluster::{ClusterClient, ClusterError};
use crate::config::Config;
use async_trait::async_trait;
use ocp_metrics_types::{Build, BuildConfig, Condition, DeploymentConfig, Project};
use serde::de::DeserializeOwned;
use std::time::Duration;

const PROJECTS_PATH: &str = "/apis/project.openshift.io/v1/projects";

// =====================================================
// Wire Types
// =====================================================

#[derive(Debug, serde::Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, serde::Deserialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, serde::Deserialize)]
struct ProjectItem {
    metadata: ObjectMeta,
}

#[derive(Debug, serde::Deserialize)]
struct BuildConfigItem {
    metadata: ObjectMeta,
    status: Option<BuildConfigStatus>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildConfigStatus {
    last_version: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
struct BuildItem {
    metadata: ObjectMeta,
    status: Option<BuildStatus>,
}

#[derive(Debug, serde::Deserialize)]
struct BuildStatus {
    #[serde(default)]
    phase: String,
}

#[derive(Debug, serde::Deserialize)]
struct DeploymentConfigItem {
    metadata: ObjectMeta,
    status: Option<DeploymentConfigStatus>,
}

#[derive(Debug, serde::Deserialize)]
struct DeploymentConfigStatus {
    #[serde(default)]
    conditions: Vec<ConditionItem>,
}

#[derive(Debug, serde::Deserialize)]
struct ConditionItem {
    #[serde(rename = "type", default)]
    condition_type: String,
    #[serde(default)]
    status: String,
    reason: Option<String>,
}

impl From<ConditionItem> for Condition {
    fn from(item: ConditionItem) -> Self {
        Condition {
            condition_type: item.condition_type,
            status: item.status,
            reason: item.reason,
        }
    }
}

// =====================================================
// Client
// =====================================================

pub struct OpenShiftClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl OpenShiftClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a client with the TLS and timeout settings from the config
    pub fn from_config(config: &Config) -> Result<Self, ClusterError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));

        if let Some(ca_file) = &config.ca_file {
            let pem = std::fs::read(ca_file).map_err(|e| {
                let message = format!("Failed to read CA file {}: {}", ca_file.display(), e);
                ClusterError::Transport(message)
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClusterError::Transport(format!("Invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        if config.insecure_skip_tls_verify {
            log::warn!("[OCP_METRICS] TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| ClusterError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(http, &config.api_url, config.token.clone()))
    }

    /// GET a JSON resource. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ClusterError> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClusterError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ClusterError::Status {
                status: status.as_u16(),
                body: truncate_error(&body),
            });
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ClusterError::Decode(format!("{}: {}", path, e)))
    }

    /// GET a list resource. A 404 is an error here: the API group is missing.
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ClusterError> {
        match self.get_json::<ItemList<T>>(path).await? {
            Some(list) => Ok(list.items),
            None => Err(ClusterError::Status {
                status: 404,
                body: format!("{} not found", path),
            }),
        }
    }
}

#[async_trait]
impl ClusterClient for OpenShiftClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ClusterError> {
        let items: Vec<ProjectItem> = self.get_list(PROJECTS_PATH).await?;
        Ok(items
            .into_iter()
            .map(|item| Project {
                name: item.metadata.name,
            })
            .collect())
    }

    async fn list_build_configs(&self, namespace: &str) -> Result<Vec<BuildConfig>, ClusterError> {
        let path = format!(
            "/apis/build.openshift.io/v1/namespaces/{}/buildconfigs",
            namespace
        );
        let items: Vec<BuildConfigItem> = self.get_list(&path).await?;
        Ok(items
            .into_iter()
            .map(|item| BuildConfig {
                namespace: namespace.to_string(),
                name: item.metadata.name,
                last_version: item.status.and_then(|s| s.last_version),
            })
            .collect())
    }

    async fn get_build(&self, namespace: &str, name: &str) -> Result<Option<Build>, ClusterError> {
        let path = format!(
            "/apis/build.openshift.io/v1/namespaces/{}/builds/{}",
            namespace, name
        );
        let item: Option<BuildItem> = self.get_json(&path).await?;
        Ok(item.map(|item| Build {
            name: item.metadata.name,
            phase: item.status.map(|s| s.phase).unwrap_or_default(),
        }))
    }

    async fn list_deployment_configs(
        &self,
        namespace: &str,
    ) -> Result<Vec<DeploymentConfig>, ClusterError> {
        let path = format!(
            "/apis/apps.openshift.io/v1/namespaces/{}/deploymentconfigs",
            namespace
        );
        let items: Vec<DeploymentConfigItem> = self.get_list(&path).await?;
        Ok(items
            .into_iter()
            .map(|item| DeploymentConfig {
                namespace: namespace.to_string(),
                name: item.metadata.name,
                conditions: item
                    .status
                    .map(|s| s.conditions.into_iter().map(Condition::from).collect())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

/// Keep error bodies short enough for a log line
fn truncate_error(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
