//! Secrets. Values are never copied from the compose project: every key is
//! written with [`PLACEHOLDER`] for the operator to fill in.

use super::container::{env_secret_name, file_object_name, target_basename};
use super::types::{GeneratedManifest, K8sManifest, ObjectMeta};
use crate::analyzer::{AnalyzedService, VolumeClassification};
use crate::common::{standard_labels, to_k8s_name};
use crate::config::{Configuration, EnvTarget};
use indexmap::IndexMap;

pub const PLACEHOLDER: &str = "REPLACE_ME";

fn opaque_secret(name: String, service_name: &str, config: &Configuration, keys: IndexMap<String, String>) -> K8sManifest {
    let mut manifest = K8sManifest::new(
        "v1",
        "Secret",
        ObjectMeta::new(name, config.deploy.namespace(), standard_labels(service_name)),
    );
    manifest.type_ = Some("Opaque".to_string());
    manifest.string_data = Some(keys);
    manifest
}

pub fn generate_secrets(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
) -> Vec<GeneratedManifest> {
    let k8s_name = to_k8s_name(service_name);
    let mut manifests = Vec::new();

    let env_keys: IndexMap<String, String> = analyzed
        .env_vars
        .iter()
        .filter(|v| config.env_target(service_name, &v.name, v.sensitive) == EnvTarget::Secret)
        .map(|v| (v.name.clone(), PLACEHOLDER.to_string()))
        .collect();

    if !env_keys.is_empty() {
        manifests.push(GeneratedManifest::new(
            format!("{}-secret.yaml", k8s_name),
            opaque_secret(env_secret_name(&k8s_name), service_name, config, env_keys),
            service_name,
            format!("Secret for {} (replace {} with real values)", service_name, PLACEHOLDER),
        ));
    }

    for vol in analyzed
        .volumes
        .iter()
        .filter(|v| v.classification == VolumeClassification::Secret)
    {
        let volume_name = to_k8s_name(&vol.suggested_name);
        let file_name = target_basename(&vol.mount.target);
        let keys = IndexMap::from([(file_name.to_string(), PLACEHOLDER.to_string())]);

        manifests.push(GeneratedManifest::new(
            format!("{}-secret-{}.yaml", k8s_name, volume_name),
            opaque_secret(file_object_name(&k8s_name, &volume_name), service_name, config, keys),
            service_name,
            format!(
                "File secret for {}: {} (replace {} with real content)",
                service_name, file_name, PLACEHOLDER
            ),
        ));
    }

    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{analyzed, config_for};
    use crate::parser::{ComposeService, ComposeVolumeMount, MountType};

    #[test]
    fn test_env_secret_uses_placeholders() {
        let mut svc = ComposeService::default();
        svc.environment.insert("POSTGRES_PASSWORD".into(), "hunter2".into());
        svc.environment.insert("POSTGRES_DB".into(), "app".into());
        svc.environment.insert("JWT_SECRET".into(), "abc".into());
        let services = analyzed(vec![("db", svc)]);

        let manifests = generate_secrets("db", &services["db"], &config_for(&["db"]));
        assert_eq!(manifests.len(), 1);
        let secret = &manifests[0].manifest;
        assert_eq!(manifests[0].filename, "db-secret.yaml");
        assert_eq!(secret.name(), "db-secret");
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));

        let data = secret.string_data.as_ref().unwrap();
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["POSTGRES_PASSWORD", "JWT_SECRET"]);
        assert!(data.values().all(|v| v == PLACEHOLDER));
    }

    #[test]
    fn test_file_secret() {
        let svc = ComposeService {
            volumes: vec![ComposeVolumeMount {
                source: "./certs/server.key".into(),
                target: "/etc/ssl/private/server.key".into(),
                read_only: true,
                mount_type: MountType::Bind,
            }],
            ..Default::default()
        };
        let services = analyzed(vec![("web", svc)]);
        let manifests = generate_secrets("web", &services["web"], &config_for(&["web"]));

        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].filename, "web-secret-web-server-key.yaml");
        assert_eq!(manifests[0].manifest.name(), "web-web-server-key");
        let data = manifests[0].manifest.string_data.as_ref().unwrap();
        assert_eq!(data["server.key"], PLACEHOLDER);
    }

    #[test]
    fn test_no_secrets() {
        let mut svc = ComposeService::default();
        svc.environment.insert("NODE_ENV".into(), "production".into());
        let services = analyzed(vec![("web", svc)]);
        assert!(generate_secrets("web", &services["web"], &config_for(&["web"])).is_empty());
    }
}
