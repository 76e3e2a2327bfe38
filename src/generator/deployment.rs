//! Deployments for stateless services.

use super::container::{build_container_spec, pod_template, resolve_replicas};
use super::types::{DeploymentSpec, GeneratedManifest, K8sManifest, LabelSelector, ObjectMeta};
use crate::analyzer::AnalyzedService;
use crate::common::{selector_labels, standard_labels, to_k8s_name};
use crate::config::Configuration;
use indexmap::IndexMap;

pub fn generate_deployment(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
    all_services: &IndexMap<String, AnalyzedService>,
) -> GeneratedManifest {
    let k8s_name = to_k8s_name(service_name);
    let mut container = build_container_spec(service_name, analyzed, config, all_services);
    let volumes = std::mem::take(&mut container.volumes);

    let spec = DeploymentSpec {
        replicas: resolve_replicas(service_name, analyzed, config),
        selector: LabelSelector {
            match_labels: selector_labels(service_name),
        },
        template: pod_template(service_name, container, volumes, config),
    };

    let manifest = K8sManifest::new(
        "apps/v1",
        "Deployment",
        ObjectMeta::new(&k8s_name, config.deploy.namespace(), standard_labels(service_name)),
    )
    .with_spec(spec);

    GeneratedManifest::new(
        format!("{}-deployment.yaml", k8s_name),
        manifest,
        service_name,
        format!("Deployment for {}", service_name),
    )
}
