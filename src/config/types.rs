use crate::analyzer::WorkloadType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Everything the generator needs besides the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Services to convert, in output order.
    pub selected_services: Vec<String>,
    #[serde(default)]
    pub workload_overrides: IndexMap<String, WorkloadOverride>,
    #[serde(default)]
    pub service_exposures: IndexMap<String, ServiceExposure>,
    #[serde(default)]
    pub ingress: IngressConfig,
    /// Service -> variable -> where the value lives.
    #[serde(default)]
    pub env_classification: IndexMap<String, IndexMap<String, EnvTarget>>,
    #[serde(default)]
    pub storage_config: Vec<StorageConfig>,
    #[serde(default)]
    pub init_containers: InitContainerStrategy,
    #[serde(default)]
    pub resource_overrides: IndexMap<String, ResourceDefaults>,
    #[serde(default)]
    pub pod_security_standard: PodSecurityStandard,
    #[serde(default)]
    pub deploy: DeployOptions,
}

impl Configuration {
    pub fn is_selected(&self, service: &str) -> bool {
        self.selected_services.iter().any(|s| s == service)
    }

    /// Storage settings for a Kubernetes volume name.
    pub fn storage_for(&self, volume_name: &str) -> Option<&StorageConfig> {
        self.storage_config.iter().find(|s| s.volume_name == volume_name)
    }

    /// Where a service's variable goes: the explicit classification if any,
    /// else the detector's verdict.
    pub fn env_target(&self, service: &str, var: &str, sensitive: bool) -> EnvTarget {
        self.env_classification
            .get(service)
            .and_then(|vars| vars.get(var))
            .copied()
            .unwrap_or(if sensitive { EnvTarget::Secret } else { EnvTarget::ConfigMap })
    }
}

// ============================================================================
// Workloads and exposure
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_type: Option<WorkloadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExposureType {
    #[default]
    #[serde(rename = "ClusterIP")]
    ClusterIp,
    NodePort,
    LoadBalancer,
    Ingress,
}

impl ExposureType {
    /// The explicit `spec.type` of the Service; `None` keeps the cluster default.
    pub fn service_type(&self) -> Option<&'static str> {
        match self {
            Self::NodePort => Some("NodePort"),
            Self::LoadBalancer => Some("LoadBalancer"),
            Self::ClusterIp | Self::Ingress => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExposure {
    #[serde(rename = "type", default)]
    pub exposure_type: ExposureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_path: Option<String>,
}

// ============================================================================
// Ingress / Gateway API
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngressMode {
    #[default]
    Ingress,
    GatewayApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngressController {
    Nginx,
    Traefik,
    Higress,
    #[default]
    None,
}

impl IngressController {
    /// `ingressClassName` for this controller, if any.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            Self::Nginx => Some("nginx"),
            Self::Traefik => Some("traefik"),
            Self::Higress => Some("higress"),
            Self::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRoute {
    pub service_name: String,
    pub path: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    pub enabled: bool,
    #[serde(default)]
    pub mode: IngressMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub cert_manager: bool,
    #[serde(default)]
    pub controller: IngressController,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_class: Option<String>,
    #[serde(default)]
    pub routes: Vec<IngressRoute>,
}

impl IngressConfig {
    pub const DEFAULT_DOMAIN: &'static str = "app.example.com";

    pub fn domain_or_default(&self) -> &str {
        self.domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(Self::DEFAULT_DOMAIN)
    }

    /// Routing objects are emitted only when enabled with at least one route.
    pub fn has_routes(&self) -> bool {
        self.enabled && !self.routes.is_empty()
    }
}

// ============================================================================
// Env, storage, init containers, security
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvTarget {
    ConfigMap,
    Secret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessMode {
    #[default]
    ReadWriteOnce,
    ReadWriteMany,
    ReadOnlyMany,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadWriteOnce => "ReadWriteOnce",
            Self::ReadWriteMany => "ReadWriteMany",
            Self::ReadOnlyMany => "ReadOnlyMany",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Kubernetes volume name the settings apply to.
    pub volume_name: String,
    /// Empty or absent uses the cluster's default class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    pub size: String,
    #[serde(default)]
    pub access_mode: AccessMode,
}

impl StorageConfig {
    pub fn storage_class_name(&self) -> Option<&str> {
        self.storage_class.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitContainerStrategy {
    #[default]
    WaitForPort,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodSecurityStandard {
    Restricted,
    Baseline,
    #[default]
    None,
}

// ============================================================================
// Deploy options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImagePullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl ImagePullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "Always",
            Self::IfNotPresent => "IfNotPresent",
            Self::Never => "Never",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One file per manifest
    #[default]
    Plain,
    /// Every manifest in a single `all-resources.yaml`
    SingleFile,
}

/// CPU / memory requests and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefaults {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for ResourceDefaults {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            cpu_limit: "500m".to_string(),
            memory_request: "128Mi".to_string(),
            memory_limit: "512Mi".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOptions {
    pub namespace: String,
    #[serde(default)]
    pub image_pull_policy: ImagePullPolicy,
    #[serde(default)]
    pub image_pull_secrets: Vec<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
    pub output_dir: String,
    #[serde(default = "default_true")]
    pub migration_scripts: bool,
    #[serde(default)]
    pub resource_defaults: ResourceDefaults,
}

fn default_true() -> bool {
    true
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            image_pull_policy: ImagePullPolicy::IfNotPresent,
            image_pull_secrets: Vec::new(),
            output_format: OutputFormat::Plain,
            output_dir: "./k8s".to_string(),
            migration_scripts: true,
            resource_defaults: ResourceDefaults::default(),
        }
    }
}

impl DeployOptions {
    /// Namespace for `metadata.namespace`; empty means unset.
    pub fn namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }
}
