//! Cluster API seam used by the scanner.

use async_trait::async_trait;
use ocp_metrics_types::{Build, BuildConfig, DeploymentConfig, Project};

#[derive(Debug)]
pub enum ClusterError {
    /// The request never produced a response (connect, TLS, timeout)
    Transport(String),
    /// The API answered with a non-success status
    Status { status: u16, body: String },
    /// The response body was not the expected JSON
    Decode(String),
}

impl std::fmt::Display for ClusterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterError::Transport(e) => write!(f, "Cluster API request failed: {}", e),
            ClusterError::Status { status, body } => {
                write!(f, "Cluster API error ({}): {}", status, body)
            }
            ClusterError::Decode(e) => write!(f, "Invalid cluster API response: {}", e),
        }
    }
}

impl std::error::Error for ClusterError {}

/// Read-only view of the cluster resources the scanner needs
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, ClusterError>;

    async fn list_build_configs(&self, namespace: &str) -> Result<Vec<BuildConfig>, ClusterError>;

    /// `Ok(None)` when the build does not exist
    async fn get_build(&self, namespace: &str, name: &str) -> Result<Option<Build>, ClusterError>;

    async fn list_deployment_configs(
        &self,
        namespace: &str,
    ) -> Result<Vec<DeploymentConfig>, ClusterError>;
}
