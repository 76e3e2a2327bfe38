//! Kubernetes manifest generation.
//!
//! [`generate_manifests`] walks the selected services in order and emits,
//! per service: the workload (plus claims for Deployments), the Service,
//! ConfigMaps and Secrets. Routing objects, migration scripts and the README
//! follow once all services are done.

pub mod configmap;
pub mod container;
pub mod deployment;
pub mod gateway;
pub mod ingress;
pub mod init_container;
pub mod migration;
pub mod probes;
pub mod pvc;
pub mod readme;
pub mod secret;
pub mod security_context;
pub mod service;
pub mod statefulset;
pub mod types;

pub use types::*;

use crate::analyzer::{AnalysisResult, VolumeClassification, WorkloadType};
use crate::config::{Configuration, IngressMode};
use log::{debug, warn};
use std::path::Path;

/// Inputs to a generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerateInput<'a> {
    pub analysis: &'a AnalysisResult,
    pub config: &'a Configuration,
    /// Directory the compose file lives in; config mount sources resolve
    /// against it.
    pub working_dir: &'a Path,
}

/// Generate every manifest for the selected services.
pub fn generate_manifests(input: &GenerateInput<'_>) -> GeneratorOutput {
    let GenerateInput {
        analysis,
        config,
        working_dir,
    } = *input;
    let all_services = &analysis.services;
    let mut manifests = Vec::new();
    let mut warnings = Vec::new();

    for service_name in &config.selected_services {
        let Some(analyzed) = all_services.get(service_name) else {
            let msg = format!("Service \"{}\" not found in analysis.", service_name);
            warn!("{}", msg);
            warnings.push(msg);
            continue;
        };

        let workload_type = config
            .workload_overrides
            .get(service_name)
            .and_then(|o| o.workload_type)
            .unwrap_or(analyzed.workload_type);

        match workload_type {
            WorkloadType::StatefulSet => {
                manifests.extend(statefulset::generate_statefulset(
                    service_name,
                    analyzed,
                    config,
                    all_services,
                ));
            }
            WorkloadType::Deployment => {
                manifests.push(deployment::generate_deployment(
                    service_name,
                    analyzed,
                    config,
                    all_services,
                ));
                manifests.extend(
                    analyzed
                        .volumes
                        .iter()
                        .filter(|v| v.classification == VolumeClassification::Pvc)
                        .map(|v| pvc::generate_pvc(service_name, v, config)),
                );
            }
        }

        manifests.extend(service::generate_service(service_name, analyzed, config));

        let (configmaps, configmap_warnings) =
            configmap::generate_configmaps(service_name, analyzed, config, working_dir);
        manifests.extend(configmaps);
        warnings.extend(configmap_warnings);

        manifests.extend(secret::generate_secrets(service_name, analyzed, config));
    }

    match config.ingress.mode {
        IngressMode::GatewayApi => manifests.extend(gateway::generate_gateway_api(config)),
        IngressMode::Ingress => manifests.extend(ingress::generate_ingress(config)),
    }

    let migration_scripts = if config.deploy.migration_scripts {
        migration::generate_migration_scripts(analysis, config)
    } else {
        Vec::new()
    };

    let readme = readme::generate_readme(&manifests, &migration_scripts, config);

    debug!(
        "generated {} manifests and {} migration scripts for {} services",
        manifests.len(),
        migration_scripts.len(),
        config.selected_services.len()
    );

    GeneratorOutput {
        manifests,
        migration_scripts,
        readme,
        warnings,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analyzer::{AnalyzedService, analyze_service};
    use crate::config::{Configuration, InitContainerStrategy};
    use crate::parser::ComposeService;
    use indexmap::IndexMap;

    /// A plain configuration selecting `selected`, with no storage entries.
    pub fn config_for(selected: &[&str]) -> Configuration {
        Configuration {
            selected_services: selected.iter().map(|s| s.to_string()).collect(),
            workload_overrides: IndexMap::new(),
            service_exposures: IndexMap::new(),
            ingress: Default::default(),
            env_classification: IndexMap::new(),
            storage_config: Vec::new(),
            init_containers: InitContainerStrategy::WaitForPort,
            resource_overrides: IndexMap::new(),
            pod_security_standard: Default::default(),
            deploy: Default::default(),
        }
    }

    pub fn analyzed(entries: Vec<(&str, ComposeService)>) -> IndexMap<String, AnalyzedService> {
        entries
            .into_iter()
            .map(|(name, svc)| (name.to_string(), analyze_service(name, &svc)))
            .collect()
    }
}
