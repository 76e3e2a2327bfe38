//! Conversion configuration.
//!
//! [`default_configuration`] derives a complete [`Configuration`] from an
//! analysis. [`load_config_file`] layers a TOML pre-answer file on top of
//! those defaults.

pub mod types;

pub use types::*;

use crate::analyzer::{AnalysisResult, ServiceCategory, VolumeClassification};
use crate::common::to_k8s_name;
use crate::error::{ConversionError, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DATABASE_STORAGE_SIZE: &str = "10Gi";
const DEFAULT_STORAGE_SIZE: &str = "1Gi";

/// Command-line values that replace configuration defaults.
#[derive(Debug, Clone, Default)]
pub struct DefaultsOverrides {
    pub namespace: Option<String>,
    pub output_dir: Option<String>,
    pub output_format: Option<OutputFormat>,
}

impl DefaultsOverrides {
    pub fn apply(&self, config: &mut Configuration) {
        if let Some(ns) = &self.namespace {
            config.deploy.namespace = ns.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.deploy.output_dir = dir.clone();
        }
        if let Some(format) = self.output_format {
            config.deploy.output_format = format;
        }
    }
}

/// Build the configuration used when nobody answers any question.
///
/// Every service is selected, variables follow the secret detector, and
/// each claim-backed volume gets a `ReadWriteOnce` entry sized 10Gi for
/// databases and 1Gi otherwise.
pub fn default_configuration(analysis: &AnalysisResult, overrides: &DefaultsOverrides) -> Configuration {
    let mut env_classification = IndexMap::new();
    let mut storage_config = Vec::new();

    for (name, svc) in &analysis.services {
        let vars = svc
            .env_vars
            .iter()
            .map(|var| {
                let target = if var.sensitive { EnvTarget::Secret } else { EnvTarget::ConfigMap };
                (var.name.clone(), target)
            })
            .collect();
        env_classification.insert(name.clone(), vars);

        for vol in svc
            .volumes
            .iter()
            .filter(|v| v.classification == VolumeClassification::Pvc)
        {
            let size = if svc.category == ServiceCategory::Database {
                DATABASE_STORAGE_SIZE
            } else {
                DEFAULT_STORAGE_SIZE
            };
            storage_config.push(StorageConfig {
                volume_name: to_k8s_name(&vol.suggested_name),
                storage_class: None,
                size: size.to_string(),
                access_mode: AccessMode::ReadWriteOnce,
            });
        }
    }

    let mut config = Configuration {
        selected_services: analysis.services.keys().cloned().collect(),
        workload_overrides: IndexMap::new(),
        service_exposures: IndexMap::new(),
        ingress: IngressConfig::default(),
        env_classification,
        storage_config,
        init_containers: InitContainerStrategy::WaitForPort,
        resource_overrides: IndexMap::new(),
        pod_security_standard: PodSecurityStandard::None,
        deploy: DeployOptions::default(),
    };
    overrides.apply(&mut config);
    config
}

// ============================================================================
// Pre-answer file
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    services: Option<Vec<String>>,
    ingress: Option<IngressSection>,
    secrets: Option<IndexMap<String, IndexMap<String, EnvTarget>>>,
    storage: Option<Vec<StorageSection>>,
    init_containers: InitContainerStrategy,
    pod_security_standard: PodSecurityStandard,
    workloads: IndexMap<String, WorkloadSection>,
    exposures: IndexMap<String, ExposureSection>,
    resources: IndexMap<String, ResourcesSection>,
    deploy: DeploySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IngressSection {
    mode: IngressMode,
    domain: Option<String>,
    tls: bool,
    cert_manager: bool,
    controller: Option<IngressController>,
    gateway_class: Option<String>,
    routes: Vec<RouteSection>,
}

#[derive(Debug, Deserialize)]
struct RouteSection {
    service: String,
    path: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    volume: String,
    #[serde(default = "default_file_storage_size")]
    size: String,
    #[serde(default)]
    access_mode: AccessMode,
    #[serde(default)]
    storage_class: Option<String>,
}

fn default_file_storage_size() -> String {
    "10Gi".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkloadSection {
    workload_type: Option<crate::analyzer::WorkloadType>,
    replicas: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExposureSection {
    #[serde(rename = "type")]
    exposure_type: ExposureType,
    node_port: Option<u16>,
    ingress_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ResourcesSection {
    cpu_request: String,
    cpu_limit: String,
    memory_request: String,
    memory_limit: String,
}

impl Default for ResourcesSection {
    fn default() -> Self {
        let d = ResourceDefaults::default();
        Self {
            cpu_request: d.cpu_request,
            cpu_limit: d.cpu_limit,
            memory_request: d.memory_request,
            memory_limit: d.memory_limit,
        }
    }
}

impl From<ResourcesSection> for ResourceDefaults {
    fn from(r: ResourcesSection) -> Self {
        Self {
            cpu_request: r.cpu_request,
            cpu_limit: r.cpu_limit,
            memory_request: r.memory_request,
            memory_limit: r.memory_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DeploySection {
    namespace: String,
    image_pull_policy: ImagePullPolicy,
    image_pull_secrets: Vec<String>,
    format: OutputFormat,
    output_dir: String,
    migration_scripts: bool,
    resources: ResourcesSection,
}

impl Default for DeploySection {
    fn default() -> Self {
        let d = DeployOptions::default();
        Self {
            namespace: d.namespace,
            image_pull_policy: d.image_pull_policy,
            image_pull_secrets: d.image_pull_secrets,
            format: d.output_format,
            output_dir: d.output_dir,
            migration_scripts: d.migration_scripts,
            resources: ResourcesSection::default(),
        }
    }
}

/// A loaded configuration plus the problems found while merging it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Configuration,
    pub warnings: Vec<String>,
}

/// Load a TOML pre-answer file and merge it over the analysis defaults.
pub fn load_config_file(path: &Path, analysis: &AnalysisResult) -> Result<LoadedConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConversionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loading configuration from {}", path.display());
    parse_config_str(&content, analysis)
}

/// Parse TOML configuration text and merge it over the analysis defaults.
pub fn parse_config_str(content: &str, analysis: &AnalysisResult) -> Result<LoadedConfig> {
    let file: ConfigFile =
        toml::from_str(content).map_err(|e| ConversionError::Config(e.to_string()))?;

    let mut warnings = Vec::new();
    let defaults = default_configuration(analysis, &DefaultsOverrides::default());
    let mut merge = Merge {
        analysis,
        warnings: &mut warnings,
    };

    let mut config = Configuration {
        selected_services: merge.services(file.services, &defaults),
        workload_overrides: merge.known_services("workloads", file.workloads, |w| WorkloadOverride {
            workload_type: w.workload_type,
            replicas: w.replicas,
        }),
        service_exposures: merge.known_services("exposures", file.exposures, |e| ServiceExposure {
            exposure_type: e.exposure_type,
            node_port: e.node_port,
            ingress_path: e.ingress_path,
        }),
        ingress: file.ingress.map(ingress_from_section).unwrap_or_default(),
        env_classification: merge.secrets(file.secrets, &defaults),
        storage_config: merge_storage(file.storage, &defaults),
        init_containers: file.init_containers,
        resource_overrides: merge.known_services("resources", file.resources, ResourceDefaults::from),
        pod_security_standard: file.pod_security_standard,
        deploy: DeployOptions {
            namespace: file.deploy.namespace,
            image_pull_policy: file.deploy.image_pull_policy,
            image_pull_secrets: file.deploy.image_pull_secrets,
            output_format: file.deploy.format,
            output_dir: file.deploy.output_dir,
            migration_scripts: file.deploy.migration_scripts,
            resource_defaults: file.deploy.resources.into(),
        },
    };

    merge.ingress_exposure_routes(&mut config);

    Ok(LoadedConfig { config, warnings })
}

fn ingress_from_section(section: IngressSection) -> IngressConfig {
    IngressConfig {
        enabled: true,
        mode: section.mode,
        domain: section.domain,
        tls: section.tls,
        cert_manager: section.cert_manager,
        controller: section.controller.unwrap_or(IngressController::Nginx),
        gateway_class: section.gateway_class,
        routes: section
            .routes
            .into_iter()
            .map(|r| IngressRoute {
                service_name: r.service,
                path: r.path,
                port: r.port,
            })
            .collect(),
    }
}

/// Storage entries from the file replace defaults with the same
/// normalized volume name; new names are appended.
fn merge_storage(items: Option<Vec<StorageSection>>, defaults: &Configuration) -> Vec<StorageConfig> {
    let mut result = defaults.storage_config.clone();
    for item in items.unwrap_or_default() {
        let volume_name = to_k8s_name(&item.volume);
        let entry = StorageConfig {
            volume_name: volume_name.clone(),
            storage_class: item.storage_class.filter(|c| !c.is_empty()),
            size: item.size,
            access_mode: item.access_mode,
        };
        match result.iter_mut().find(|s| s.volume_name == volume_name) {
            Some(existing) => *existing = entry,
            None => result.push(entry),
        }
    }
    result
}

struct Merge<'a> {
    analysis: &'a AnalysisResult,
    warnings: &'a mut Vec<String>,
}

impl Merge<'_> {
    fn warn(&mut self, msg: String) {
        warn!("{}", msg);
        self.warnings.push(msg);
    }

    fn services(&mut self, requested: Option<Vec<String>>, defaults: &Configuration) -> Vec<String> {
        let Some(requested) = requested else {
            return defaults.selected_services.clone();
        };

        let mut valid = Vec::with_capacity(requested.len());
        for name in requested {
            if self.analysis.services.contains_key(&name) {
                valid.push(name);
            } else {
                self.warn(format!("Unknown service \"{}\" in config - skipping.", name));
            }
        }

        if valid.is_empty() {
            defaults.selected_services.clone()
        } else {
            valid
        }
    }

    fn known_services<T, U>(
        &mut self,
        section: &str,
        entries: IndexMap<String, T>,
        convert: impl Fn(T) -> U,
    ) -> IndexMap<String, U> {
        let mut out = IndexMap::with_capacity(entries.len());
        for (name, entry) in entries {
            if self.analysis.services.contains_key(&name) {
                out.insert(name, convert(entry));
            } else {
                self.warn(format!(
                    "Unknown service \"{}\" in {} config - skipping.",
                    name, section
                ));
            }
        }
        out
    }

    fn secrets(
        &mut self,
        secrets: Option<IndexMap<String, IndexMap<String, EnvTarget>>>,
        defaults: &Configuration,
    ) -> IndexMap<String, IndexMap<String, EnvTarget>> {
        let mut result = defaults.env_classification.clone();

        for (svc_name, vars) in secrets.unwrap_or_default() {
            let Some(analyzed) = self.analysis.services.get(&svc_name) else {
                self.warn(format!(
                    "Unknown service \"{}\" in secrets config - skipping.",
                    svc_name
                ));
                continue;
            };

            let known: Vec<&str> = analyzed.env_vars.iter().map(|e| e.name.as_str()).collect();
            let mut unknown = Vec::new();
            let entry = result.entry(svc_name.clone()).or_default();
            for (var, target) in vars {
                if !known.contains(&var.as_str()) {
                    unknown.push(var.clone());
                }
                entry.insert(var, target);
            }
            for var in unknown {
                self.warn(format!(
                    "Unknown env var \"{}\" for service \"{}\" - applying anyway.",
                    var, svc_name
                ));
            }
        }

        result
    }

    /// Services exposed through ingress without an explicit route get one on
    /// their first port.
    fn ingress_exposure_routes(&mut self, config: &mut Configuration) {
        let mut added = Vec::new();
        for (name, exposure) in &config.service_exposures {
            if exposure.exposure_type != ExposureType::Ingress
                || config.ingress.routes.iter().any(|r| &r.service_name == name)
            {
                continue;
            }
            let Some(port) = self
                .analysis
                .services
                .get(name)
                .and_then(|s| s.ports.first())
            else {
                added.push(Err(name.clone()));
                continue;
            };
            added.push(Ok(IngressRoute {
                service_name: name.clone(),
                path: exposure.ingress_path.clone().unwrap_or_else(|| "/".to_string()),
                port: port.container_port,
            }));
        }

        for route in added {
            match route {
                Ok(route) => {
                    config.ingress.enabled = true;
                    config.ingress.routes.push(route);
                }
                Err(name) => self.warn(format!(
                    "Service \"{}\" is exposed through ingress but declares no ports - no route generated.",
                    name
                )),
            }
        }
    }
}
