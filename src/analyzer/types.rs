//! Analysis results derived from a [`ComposeProject`](crate::parser::ComposeProject).
//!
//! Everything here is computed once per project and read-only afterwards.

use crate::parser::{ComposeService, ComposeVolumeMount, PortProtocol};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Service category
// ============================================================================

/// Semantic role of a service, inferred from its image, env, ports and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Web,
    #[default]
    Api,
    Database,
    Cache,
    Queue,
    Worker,
    Proxy,
    Other,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::Queue => "queue",
            Self::Worker => "worker",
            Self::Proxy => "proxy",
            Self::Other => "other",
        }
    }

    /// Categories that always run as a StatefulSet.
    pub fn is_stateful(&self) -> bool {
        matches!(self, Self::Database | Self::Cache | Self::Queue)
    }

    /// Categories that serve requests and never own durable data.
    pub fn is_frontline(&self) -> bool {
        matches!(self, Self::Api | Self::Web | Self::Proxy)
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Workload type
// ============================================================================

/// Kubernetes workload kind a service is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkloadType {
    #[default]
    Deployment,
    StatefulSet,
}

impl WorkloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Volumes, ports, env
// ============================================================================

/// Kubernetes storage strategy for a single mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeClassification {
    ConfigMap,
    Secret,
    Pvc,
    EmptyDir,
}

impl VolumeClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMap => "configmap",
            Self::Secret => "secret",
            Self::Pvc => "pvc",
            Self::EmptyDir => "emptydir",
        }
    }

    /// Whether the mount is backed by a single projected file.
    pub fn is_projected(&self) -> bool {
        matches!(self, Self::ConfigMap | Self::Secret)
    }
}

impl fmt::Display for VolumeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedVolume {
    pub mount: ComposeVolumeMount,
    pub classification: VolumeClassification,
    /// Kubernetes-safe volume name, `<service>-<last target segment>`.
    pub suggested_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalyzedPort {
    pub container_port: u16,
    pub protocol: PortProtocol,
    pub published_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedEnvVar {
    pub name: String,
    pub value: String,
    pub sensitive: bool,
}

// ============================================================================
// Services and graph
// ============================================================================

/// A service together with everything the analyzer inferred about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedService {
    pub name: String,
    pub service: ComposeService,
    pub category: ServiceCategory,
    pub workload_type: WorkloadType,
    pub volumes: Vec<AnalyzedVolume>,
    pub ports: Vec<AnalyzedPort>,
    pub env_vars: Vec<AnalyzedEnvVar>,
    /// Declared dependencies, including ones that do not resolve.
    pub depends_on: Vec<String>,
}

/// Start-order graph built from `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DependencyGraph {
    /// Service to the dependencies that exist in the project.
    pub edges: IndexMap<String, Vec<String>>,
    /// Topological start order; services on a cycle are left out.
    pub order: Vec<String>,
    pub has_cycles: bool,
    pub warnings: Vec<String>,
}

/// Output of [`analyze_project`](super::analyze_project).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AnalysisResult {
    pub services: IndexMap<String, AnalyzedService>,
    pub dependency_graph: DependencyGraph,
    pub warnings: Vec<String>,
}
