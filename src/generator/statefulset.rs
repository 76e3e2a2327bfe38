//! StatefulSets and their headless Services.
//!
//! Claim-backed volumes move out of the pod spec into per-pod
//! `volumeClaimTemplates`.

use super::container::{build_container_spec, pod_template, resolve_replicas};
use super::pvc::claim_spec;
use super::service::{exposed_ports, service_ports};
use super::types::{
    GeneratedManifest, K8sManifest, LabelSelector, LocalObjectReference, ObjectMeta, ServiceSpec,
    StatefulSetSpec, VolumeClaimTemplate, VolumeSource,
};
use crate::analyzer::{AnalyzedService, VolumeClassification};
use crate::common::{selector_labels, standard_labels, to_k8s_name};
use crate::config::Configuration;
use indexmap::IndexMap;

pub const DEFAULT_CLAIM_SIZE: &str = "10Gi";

pub fn headless_service_name(k8s_name: &str) -> String {
    format!("{}-headless", k8s_name)
}

/// The StatefulSet, followed by its headless Service when the service exposes
/// ports.
pub fn generate_statefulset(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
    all_services: &IndexMap<String, AnalyzedService>,
) -> Vec<GeneratedManifest> {
    let k8s_name = to_k8s_name(service_name);
    let namespace = config.deploy.namespace();
    let mut container = build_container_spec(service_name, analyzed, config, all_services);

    let pod_volumes = std::mem::take(&mut container.volumes)
        .into_iter()
        .filter(|v| !matches!(v.source, VolumeSource::PersistentVolumeClaim { .. }))
        .collect();

    let volume_claim_templates = analyzed
        .volumes
        .iter()
        .filter(|v| v.classification == VolumeClassification::Pvc)
        .map(|v| {
            let name = to_k8s_name(&v.suggested_name);
            VolumeClaimTemplate {
                spec: claim_spec(&name, config, DEFAULT_CLAIM_SIZE),
                metadata: LocalObjectReference { name },
            }
        })
        .collect();

    let spec = StatefulSetSpec {
        service_name: headless_service_name(&k8s_name),
        replicas: resolve_replicas(service_name, analyzed, config),
        selector: LabelSelector {
            match_labels: selector_labels(service_name),
        },
        template: pod_template(service_name, container, pod_volumes, config),
        volume_claim_templates,
    };

    let statefulset = K8sManifest::new(
        "apps/v1",
        "StatefulSet",
        ObjectMeta::new(&k8s_name, namespace, standard_labels(service_name)),
    )
    .with_spec(spec);

    let mut manifests = vec![GeneratedManifest::new(
        format!("{}-statefulset.yaml", k8s_name),
        statefulset,
        service_name,
        format!("StatefulSet for {}", service_name),
    )];

    let ports = exposed_ports(analyzed);
    if !ports.is_empty() {
        let headless = K8sManifest::new(
            "v1",
            "Service",
            ObjectMeta::new(headless_service_name(&k8s_name), namespace, standard_labels(service_name)),
        )
        .with_spec(ServiceSpec {
            type_: None,
            cluster_ip: Some("None".to_string()),
            selector: selector_labels(service_name),
            ports: service_ports(&ports, None),
        });

        manifests.push(GeneratedManifest::new(
            format!("{}-headless-service.yaml", k8s_name),
            headless,
            service_name,
            format!("Headless Service for {} StatefulSet", service_name),
        ));
    }

    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessMode, StorageConfig};
    use crate::generator::test_support::{analyzed, config_for};
    use crate::generator::types::ManifestSpec;
    use crate::parser::{ComposePort, ComposeService, ComposeVolumeMount, MountType};

    fn postgres(ports: Vec<ComposePort>) -> ComposeService {
        ComposeService {
            image: Some("postgres:16".into()),
            ports,
            volumes: vec![
                ComposeVolumeMount {
                    source: "pgdata".into(),
                    target: "/var/lib/postgresql/data".into(),
                    read_only: false,
                    mount_type: MountType::Volume,
                },
                ComposeVolumeMount {
                    source: "./init.sql".into(),
                    target: "/docker-entrypoint-initdb.d/init.sql".into(),
                    read_only: true,
                    mount_type: MountType::Bind,
                },
            ],
            ..Default::default()
        }
    }

    fn statefulset_spec(generated: &GeneratedManifest) -> &StatefulSetSpec {
        match generated.manifest.spec.as_ref() {
            Some(ManifestSpec::StatefulSet(spec)) => spec,
            other => panic!("expected a StatefulSet spec, got {:?}", other),
        }
    }

    #[test]
    fn test_claims_move_to_templates() {
        let services = analyzed(vec![("db", postgres(vec![ComposePort::new(5432)]))]);
        let manifests = generate_statefulset("db", &services["db"], &config_for(&["db"]), &services);

        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].filename, "db-statefulset.yaml");
        let spec = statefulset_spec(&manifests[0]);
        assert_eq!(spec.service_name, "db-headless");

        let pod = &spec.template.spec;
        assert_eq!(pod.volumes.len(), 1);
        assert_eq!(pod.volumes[0].name, "db-init-sql");
        assert_eq!(pod.containers[0].volume_mounts.len(), 2);

        assert_eq!(spec.volume_claim_templates.len(), 1);
        let claim = &spec.volume_claim_templates[0];
        assert_eq!(claim.metadata.name, "db-data");
        assert_eq!(claim.spec.resources.requests.storage, "10Gi");
        assert_eq!(claim.spec.access_modes, vec!["ReadWriteOnce"]);
    }

    #[test]
    fn test_headless_service() {
        let services = analyzed(vec![("db", postgres(vec![ComposePort::new(5432)]))]);
        let manifests = generate_statefulset("db", &services["db"], &config_for(&["db"]), &services);

        let headless = &manifests[1];
        assert_eq!(headless.filename, "db-headless-service.yaml");
        assert_eq!(headless.manifest.name(), "db-headless");
        assert_eq!(headless.description, "Headless Service for db StatefulSet");
        let Some(ManifestSpec::Service(spec)) = &headless.manifest.spec else {
            panic!("expected a Service spec");
        };
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.ports[0].name, "tcp-5432");
    }

    #[test]
    fn test_no_ports_no_headless_service() {
        let mut ledger = postgres(Vec::new());
        ledger.image = Some("myorg/ledger:2".into());
        let services = analyzed(vec![("ledger", ledger)]);
        let manifests = generate_statefulset("ledger", &services["ledger"], &config_for(&["ledger"]), &services);
        assert_eq!(manifests.len(), 1);
    }

    #[test]
    fn test_headless_service_on_family_port() {
        let services = analyzed(vec![("db", postgres(Vec::new()))]);
        let manifests = generate_statefulset("db", &services["db"], &config_for(&["db"]), &services);
        assert_eq!(manifests[1].filename, "db-headless-service.yaml");
        let Some(ManifestSpec::Service(spec)) = manifests[1].manifest.spec.as_ref() else {
            panic!("expected a Service spec");
        };
        assert_eq!(spec.ports[0].port, 5432);
    }

    #[test]
    fn test_storage_config_for_templates() {
        let services = analyzed(vec![("db", postgres(Vec::new()))]);
        let mut config = config_for(&["db"]);
        config.storage_config.push(StorageConfig {
            volume_name: "db-data".into(),
            storage_class: Some("gp3".into()),
            size: "50Gi".into(),
            access_mode: AccessMode::ReadWriteOnce,
        });
        let manifests = generate_statefulset("db", &services["db"], &config, &services);
        let claim = &statefulset_spec(&manifests[0]).volume_claim_templates[0];
        assert_eq!(claim.spec.resources.requests.storage, "50Gi");
        assert_eq!(claim.spec.storage_class_name.as_deref(), Some("gp3"));
    }
}
