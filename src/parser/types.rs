//! Canonical Docker Compose model.
//!
//! Every service field that has several equivalent YAML shapes in Compose is
//! stored here in exactly one shape. The normalizer is the only producer.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Ports
// ============================================================================

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
}

impl PortProtocol {
    /// Parse a protocol token (case-sensitive, as Compose requires).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }

    /// Lowercase form used in port names (`tcp-80`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    /// Uppercase form used in Kubernetes specs.
    pub fn as_k8s(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A container port, optionally published on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComposePort {
    pub target: u16,
    pub published: Option<u16>,
    pub protocol: PortProtocol,
}

impl ComposePort {
    pub fn new(target: u16) -> Self {
        Self {
            target,
            published: None,
            protocol: PortProtocol::Tcp,
        }
    }
}

// ============================================================================
// Volumes
// ============================================================================

/// How Compose mounts a volume into the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Bind,
    Volume,
    Tmpfs,
}

impl MountType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bind" => Some(Self::Bind),
            "volume" => Some(Self::Volume),
            "tmpfs" => Some(Self::Tmpfs),
            _ => None,
        }
    }
}

/// A single mount of a service.
///
/// A `Volume` mount with an empty `source` is an anonymous volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComposeVolumeMount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
    pub mount_type: MountType,
}

impl ComposeVolumeMount {
    /// Whether this is an anonymous (unnamed) volume.
    pub fn is_anonymous(&self) -> bool {
        self.mount_type == MountType::Volume && self.source.is_empty()
    }

    /// Whether this is a named volume.
    pub fn is_named_volume(&self) -> bool {
        self.mount_type == MountType::Volume && !self.source.is_empty()
    }
}

// ============================================================================
// Commands, build, dependencies
// ============================================================================

/// A `command` or `entrypoint` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandLine {
    /// Shell-style string that must be split into words.
    Shell(String),
    /// Exec form, passed through unchanged.
    Exec(Vec<String>),
}

/// Build configuration for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ComposeBuild {
    Context(String),
    Extended {
        context: Option<String>,
        dockerfile: Option<String>,
    },
}

/// Start condition attached to a `depends_on` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependsOnCondition {
    #[default]
    ServiceStarted,
    ServiceHealthy,
    ServiceCompletedSuccessfully,
}

impl DependsOnCondition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "service_started" => Some(Self::ServiceStarted),
            "service_healthy" => Some(Self::ServiceHealthy),
            "service_completed_successfully" => Some(Self::ServiceCompletedSuccessfully),
            _ => None,
        }
    }
}

// ============================================================================
// Healthcheck and deploy
// ============================================================================

/// A service health check.
///
/// `test` is always in list form: a plain string test is stored as
/// `["CMD-SHELL", <string>]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ComposeHealthcheck {
    pub test: Vec<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
    pub start_period: Option<String>,
    pub disable: bool,
}

impl ComposeHealthcheck {
    /// Whether the check is disabled explicitly or via `test: ["NONE"]`.
    pub fn is_disabled(&self) -> bool {
        self.disable || self.test.first().map(String::as_str) == Some("NONE")
    }
}

/// A cpu/memory pair from `deploy.resources`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResourceSpec {
    pub cpus: Option<String>,
    pub memory: Option<String>,
}

impl ResourceSpec {
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ComposeDeployResources {
    pub limits: Option<ResourceSpec>,
    pub reservations: Option<ResourceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ComposeDeploy {
    pub replicas: Option<u32>,
    pub resources: Option<ComposeDeployResources>,
    pub restart_condition: Option<String>,
}

// ============================================================================
// Service and project
// ============================================================================

/// A normalized Compose service.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComposeService {
    pub image: Option<String>,
    pub build: Option<ComposeBuild>,
    pub command: Option<CommandLine>,
    pub entrypoint: Option<CommandLine>,
    /// env_file contents overlaid by explicit `environment` entries.
    pub environment: IndexMap<String, String>,
    pub env_file: Vec<String>,
    pub ports: Vec<ComposePort>,
    pub volumes: Vec<ComposeVolumeMount>,
    pub depends_on: IndexMap<String, DependsOnCondition>,
    pub labels: IndexMap<String, String>,
    pub networks: Option<Vec<String>>,
    pub restart: Option<String>,
    pub healthcheck: Option<ComposeHealthcheck>,
    pub deploy: Option<ComposeDeploy>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub privileged: Option<bool>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
}

/// A top-level `volumes:` or `networks:` entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TopLevelResource {
    pub driver: Option<String>,
    pub external: bool,
    pub name: Option<String>,
}

/// A fully normalized Compose project. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComposeProject {
    pub version: Option<String>,
    /// Services in document order.
    pub services: IndexMap<String, ComposeService>,
    pub volumes: IndexMap<String, TopLevelResource>,
    pub networks: IndexMap<String, TopLevelResource>,
}

/// Result of parsing a compose document.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub project: ComposeProject,
    pub warnings: Vec<String>,
    pub source_file: PathBuf,
}
