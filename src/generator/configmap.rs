//! ConfigMaps: one per single-file config mount plus one for plain env vars.

use super::container::{env_configmap_name, file_object_name, target_basename};
use super::types::{GeneratedManifest, K8sManifest, ObjectMeta};
use crate::analyzer::{AnalyzedService, AnalyzedVolume, VolumeClassification};
use crate::common::{standard_labels, to_k8s_name};
use crate::config::{Configuration, EnvTarget};
use crate::parser::resolve_within;
use indexmap::IndexMap;
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Kubernetes caps a ConfigMap at 1 MiB.
pub const MAX_CONFIGMAP_SIZE: u64 = 1_048_576;

/// ConfigMaps for a service and the warnings raised while reading sources.
pub fn generate_configmaps(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
    compose_dir: &Path,
) -> (Vec<GeneratedManifest>, Vec<String>) {
    let k8s_name = to_k8s_name(service_name);
    let mut manifests = Vec::new();
    let mut warnings = Vec::new();

    for vol in analyzed
        .volumes
        .iter()
        .filter(|v| v.classification == VolumeClassification::ConfigMap)
    {
        let volume_name = to_k8s_name(&vol.suggested_name);
        let file_name = target_basename(&vol.mount.target).to_string();
        let content = match load_config_source(service_name, vol, compose_dir) {
            Ok(content) => content,
            Err(msg) => {
                warn!("{}", msg);
                warnings.push(msg);
                placeholder(&file_name)
            }
        };

        let mut manifest = K8sManifest::new(
            "v1",
            "ConfigMap",
            ObjectMeta::new(
                file_object_name(&k8s_name, &volume_name),
                config.deploy.namespace(),
                standard_labels(service_name),
            ),
        );
        manifest.data = Some(IndexMap::from([(file_name.clone(), content)]));

        manifests.push(GeneratedManifest::new(
            format!("{}-configmap-{}.yaml", k8s_name, volume_name),
            manifest,
            service_name,
            format!("ConfigMap for {} file: {}", service_name, file_name),
        ));
    }

    let env_data: IndexMap<String, String> = analyzed
        .env_vars
        .iter()
        .filter(|v| config.env_target(service_name, &v.name, v.sensitive) == EnvTarget::ConfigMap)
        .map(|v| (v.name.clone(), v.value.clone()))
        .collect();

    if !env_data.is_empty() {
        let mut manifest = K8sManifest::new(
            "v1",
            "ConfigMap",
            ObjectMeta::new(
                env_configmap_name(&k8s_name),
                config.deploy.namespace(),
                standard_labels(service_name),
            ),
        );
        manifest.data = Some(env_data);

        manifests.push(GeneratedManifest::new(
            format!("{}-configmap-env.yaml", k8s_name),
            manifest,
            service_name,
            format!("Environment ConfigMap for {}", service_name),
        ));
    }

    (manifests, warnings)
}

fn placeholder(file_name: &str) -> String {
    format!("# TODO: Add content for {}", file_name)
}

/// Read a mount's source file, or describe why the placeholder is used.
fn load_config_source(service_name: &str, vol: &AnalyzedVolume, compose_dir: &Path) -> Result<String, String> {
    let source = &vol.mount.source;
    let not_found = || {
        format!(
            "Config file not found: {} (for {}). Using placeholder.",
            source, service_name
        )
    };

    let path = resolve_within(compose_dir, source).ok_or_else(not_found)?;
    let metadata = fs::metadata(&path).map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    if metadata.len() > MAX_CONFIGMAP_SIZE {
        return Err(format!(
            "Config file too large: {} ({:.1}MB) exceeds Kubernetes 1MB ConfigMap limit. Using placeholder.",
            source,
            metadata.len() as f64 / 1024.0 / 1024.0
        ));
    }

    let raw = fs::read(&path).map_err(|_| not_found())?;
    if raw.contains(&0) {
        return Err(format!(
            "Config file appears to be binary: {} (for {}). Using placeholder.",
            source, service_name
        ));
    }

    debug!("loaded {} bytes from {}", raw.len(), path.display());
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{analyzed, config_for};
    use crate::parser::{ComposeService, ComposeVolumeMount, MountType};
    use tempfile::TempDir;

    fn nginx(source: &str) -> ComposeService {
        let mut svc = ComposeService {
            image: Some("nginx:1.27".into()),
            volumes: vec![ComposeVolumeMount {
                source: source.into(),
                target: "/etc/nginx/nginx.conf".into(),
                read_only: true,
                mount_type: MountType::Bind,
            }],
            ..Default::default()
        };
        svc.environment.insert("WORKERS".into(), "4".into());
        svc.environment.insert("ADMIN_PASSWORD".into(), "s3cret".into());
        svc
    }

    fn run(source: &str, dir: &Path) -> (Vec<GeneratedManifest>, Vec<String>) {
        let services = analyzed(vec![("proxy", nginx(source))]);
        generate_configmaps("proxy", &services["proxy"], &config_for(&["proxy"]), dir)
    }

    #[test]
    fn test_file_content_is_embedded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nginx.conf"), "worker_processes 1;\n").unwrap();

        let (manifests, warnings) = run("./nginx.conf", dir.path());
        assert!(warnings.is_empty());
        assert_eq!(manifests.len(), 2);

        let file_cm = &manifests[0];
        assert_eq!(file_cm.filename, "proxy-configmap-proxy-nginx-conf.yaml");
        assert_eq!(file_cm.manifest.name(), "proxy-proxy-nginx-conf");
        let data = file_cm.manifest.data.as_ref().unwrap();
        assert_eq!(data["nginx.conf"], "worker_processes 1;\n");
    }

    #[test]
    fn test_env_configmap_excludes_secrets() {
        let dir = TempDir::new().unwrap();
        let (manifests, _) = run("./missing.conf", dir.path());
        let env_cm = &manifests[1];
        assert_eq!(env_cm.filename, "proxy-configmap-env.yaml");
        assert_eq!(env_cm.manifest.name(), "proxy-env");
        let data = env_cm.manifest.data.as_ref().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["WORKERS"], "4");
    }

    #[test]
    fn test_missing_file_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        let (manifests, warnings) = run("./missing.conf", dir.path());
        assert_eq!(
            manifests[0].manifest.data.as_ref().unwrap()["nginx.conf"],
            "# TODO: Add content for nginx.conf"
        );
        assert_eq!(
            warnings,
            vec!["Config file not found: ./missing.conf (for proxy). Using placeholder."]
        );
    }

    #[test]
    fn test_binary_and_oversized_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.conf"), [0x7f, 0x45, 0x00, 0x46]).unwrap();
        let (_, warnings) = run("./blob.conf", dir.path());
        assert!(warnings[0].starts_with("Config file appears to be binary: ./blob.conf"));

        let big = vec![b'a'; (MAX_CONFIGMAP_SIZE + 1) as usize];
        fs::write(dir.path().join("big.conf"), big).unwrap();
        let (manifests, warnings) = run("./big.conf", dir.path());
        assert!(warnings[0].starts_with("Config file too large: ./big.conf (1.0MB)"));
        assert!(manifests[0].manifest.data.as_ref().unwrap()["nginx.conf"].starts_with("# TODO"));
    }

    #[test]
    fn test_source_outside_compose_dir_is_not_read() {
        let outer = TempDir::new().unwrap();
        let project = outer.path().join("project");
        fs::create_dir(&project).unwrap();
        fs::write(outer.path().join("nginx.conf"), "leak").unwrap();

        let (manifests, warnings) = run("../nginx.conf", &project);
        assert_eq!(warnings.len(), 1);
        assert!(manifests[0].manifest.data.as_ref().unwrap()["nginx.conf"].starts_with("# TODO"));
    }
}
