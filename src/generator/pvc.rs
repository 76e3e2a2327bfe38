//! Standalone PersistentVolumeClaims for Deployment volumes.

use super::types::{GeneratedManifest, K8sManifest, ObjectMeta, PvcSpec};
use crate::analyzer::AnalyzedVolume;
use crate::common::{standard_labels, to_k8s_name};
use crate::config::{AccessMode, Configuration};

pub const DEFAULT_PVC_SIZE: &str = "1Gi";

/// Claim spec for a volume, using its storage settings when configured.
pub fn claim_spec(volume_name: &str, config: &Configuration, default_size: &str) -> PvcSpec {
    let storage = config.storage_for(volume_name);
    PvcSpec::new(
        storage.map(|s| s.access_mode).unwrap_or_default().as_str(),
        storage.map(|s| s.size.as_str()).unwrap_or(default_size),
        storage.and_then(|s| s.storage_class_name()),
    )
}

pub fn generate_pvc(service_name: &str, volume: &AnalyzedVolume, config: &Configuration) -> GeneratedManifest {
    let volume_name = to_k8s_name(&volume.suggested_name);
    let manifest = K8sManifest::new(
        "v1",
        "PersistentVolumeClaim",
        ObjectMeta::new(&volume_name, config.deploy.namespace(), standard_labels(service_name)),
    )
    .with_spec(claim_spec(&volume_name, config, DEFAULT_PVC_SIZE));

    GeneratedManifest::new(
        format!("{}-pvc.yaml", volume_name),
        manifest,
        service_name,
        format!("PersistentVolumeClaim for {}: {}", service_name, volume.mount.target),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::generator::test_support::{analyzed, config_for};
    use crate::generator::types::ManifestSpec;
    use crate::parser::{ComposeService, ComposeVolumeMount, MountType};

    fn uploads() -> ComposeService {
        ComposeService {
            image: Some("myorg/api".into()),
            volumes: vec![ComposeVolumeMount {
                source: "uploads".into(),
                target: "/srv/uploads".into(),
                read_only: false,
                mount_type: MountType::Volume,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_claim() {
        let services = analyzed(vec![("api", uploads())]);
        let volume = &services["api"].volumes[0];
        let generated = generate_pvc("api", volume, &config_for(&["api"]));

        assert_eq!(generated.filename, "api-uploads-pvc.yaml");
        assert_eq!(generated.description, "PersistentVolumeClaim for api: /srv/uploads");
        let Some(ManifestSpec::PersistentVolumeClaim(spec)) = &generated.manifest.spec else {
            panic!("expected a claim spec");
        };
        assert_eq!(spec.access_modes, vec!["ReadWriteOnce"]);
        assert_eq!(spec.resources.requests.storage, "1Gi");
        assert_eq!(spec.storage_class_name, None);
    }

    #[test]
    fn test_storage_config_applies() {
        let mut config = config_for(&["api"]);
        config.storage_config.push(StorageConfig {
            volume_name: "api-uploads".into(),
            storage_class: Some("fast".into()),
            size: "20Gi".into(),
            access_mode: AccessMode::ReadWriteMany,
        });
        let spec = claim_spec("api-uploads", &config, DEFAULT_PVC_SIZE);
        assert_eq!(spec.access_modes, vec!["ReadWriteMany"]);
        assert_eq!(spec.resources.requests.storage, "20Gi");
        assert_eq!(spec.storage_class_name.as_deref(), Some("fast"));

        config.storage_config[0].storage_class = Some(String::new());
        assert_eq!(claim_spec("api-uploads", &config, DEFAULT_PVC_SIZE).storage_class_name, None);
    }
}
