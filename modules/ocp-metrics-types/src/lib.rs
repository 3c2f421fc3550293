//! Shared types for the OCP metrics reporter and its RPC clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Common tag value applied to every exported series.
pub const APPLICATION_NAME: &str = "ocp-project-metrics-reporter";

// =====================================================
// Cluster Resources
// =====================================================

/// A project (namespace) visible to the reporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
}

/// A build config and the version of its most recent build, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub namespace: String,
    pub name: String,
    pub last_version: Option<i64>,
}

impl BuildConfig {
    /// Name of the build object produced by the last version, e.g. `app-3`
    pub fn last_build_name(&self) -> Option<String> {
        self.last_version.map(|v| format!("{}-{}", self.name, v))
    }
}

/// A single build and its phase (`New`, `Pending`, `Running`, `Complete`, `Failed`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub name: String,
    pub phase: String,
}

/// A deployment config with the conditions from its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub namespace: String,
    pub name: String,
    pub conditions: Vec<Condition>,
}

/// A status condition as reported by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    pub reason: Option<String>,
}

// =====================================================
// Metric Identity
// =====================================================

/// Identity of an exported series within one family: (namespace, resource name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub namespace: String,
    pub name: String,
}

impl IdentityKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// The metric families exported by the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    LastBuildFailed,
    LastDeploymentFailed,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 2] = [
        MetricFamily::LastBuildFailed,
        MetricFamily::LastDeploymentFailed,
    ];

    /// Exported metric name
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricFamily::LastBuildFailed => "ocp_bc_last_build_failed",
            MetricFamily::LastDeploymentFailed => "ocp_dc_last_deployment_failed",
        }
    }

    /// Short name used in logs and status output
    pub fn short_name(&self) -> &'static str {
        match self {
            MetricFamily::LastBuildFailed => "last_build_failed",
            MetricFamily::LastDeploymentFailed => "last_deployment_failed",
        }
    }

    /// Label carrying the resource name (`bc` or `dc`)
    pub fn resource_label(&self) -> &'static str {
        match self {
            MetricFamily::LastBuildFailed => "bc",
            MetricFamily::LastDeploymentFailed => "dc",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricFamily::LastBuildFailed => {
                "1 if the most recent build of the build config failed, 0 otherwise"
            }
            MetricFamily::LastDeploymentFailed => {
                "1 if the deployment config exceeded its progress deadline, 0 otherwise"
            }
        }
    }

    /// Ordered label tuple for a key: `[(namespace, ..), (bc|dc, ..)]`
    pub fn labels(&self, key: &IdentityKey) -> Vec<(String, String)> {
        vec![
            ("namespace".to_string(), key.namespace.clone()),
            (self.resource_label().to_string(), key.name.clone()),
        ]
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Current state of one exported series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub family: MetricFamily,
    pub namespace: String,
    pub name: String,
    pub value: u8,
}

// =====================================================
// Scan Results
// =====================================================

/// Outcome of one full scan cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: String,
    pub duration_ms: u64,
    pub projects_scanned: usize,
    pub build_configs_reported: usize,
    pub deployment_configs_reported: usize,
    pub series_registered: usize,
    pub errors: usize,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct FamilyStatus {
    pub family: MetricFamily,
    pub metric_name: String,
    pub series: usize,
    pub failing: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub scan_interval_secs: u64,
    pub last_tick_at: Option<String>,
    pub last_cycle: Option<CycleSummary>,
    pub last_error: Option<String>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub families: Vec<FamilyStatus>,
}
