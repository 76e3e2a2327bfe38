//! Container spec shared by Deployments and StatefulSets.

use super::init_container::generate_init_containers;
use super::probes::healthcheck_to_probes;
use super::security_context::{container_security_context, pod_security_context};
use super::types::{
    Container, ContainerPort, EnvFromSource, EnvVar, EnvVarSource, KeySelector,
    LocalObjectReference, PodSpec, PodTemplateSpec, ResourceList, ResourceRequirements,
    TemplateMeta, Volume, VolumeMount, VolumeSource,
};
use crate::analyzer::{AnalyzedService, AnalyzedVolume, VolumeClassification};
use crate::common::{standard_labels, to_k8s_name};
use crate::config::{Configuration, EnvTarget, ResourceDefaults};
use crate::parser::{CommandLine, ResourceSpec};
use indexmap::IndexMap;

/// Everything a workload generator needs from one compose service.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub main: Container,
    pub init_containers: Vec<Container>,
    /// Pod volumes, one per mount, in mount order.
    pub volumes: Vec<Volume>,
}

/// Name of the Secret holding a service's sensitive variables.
pub fn env_secret_name(k8s_name: &str) -> String {
    format!("{}-secret", k8s_name)
}

/// Name of the ConfigMap holding a service's plain variables.
pub fn env_configmap_name(k8s_name: &str) -> String {
    format!("{}-env", k8s_name)
}

/// Name of the ConfigMap or Secret projected for a single-file mount.
pub fn file_object_name(k8s_name: &str, volume_name: &str) -> String {
    format!("{}-{}", k8s_name, volume_name)
}

/// Final path segment of a mount target.
pub fn target_basename(target: &str) -> &str {
    target.rsplit('/').next().unwrap_or(target)
}

/// Build the main container, its init containers and the pod volumes.
pub fn build_container_spec(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
    all_services: &IndexMap<String, AnalyzedService>,
) -> ContainerSpec {
    let k8s_name = to_k8s_name(service_name);
    let service = &analyzed.service;

    let ports = analyzed
        .ports
        .iter()
        .map(|p| ContainerPort {
            container_port: p.container_port,
            protocol: p.protocol.as_k8s().to_string(),
        })
        .collect();

    let (env, env_from) = partition_env(service_name, &k8s_name, analyzed, config);

    let mut volume_mounts = Vec::with_capacity(analyzed.volumes.len());
    let mut volumes = Vec::with_capacity(analyzed.volumes.len());
    for vol in &analyzed.volumes {
        let volume_name = to_k8s_name(&vol.suggested_name);
        volume_mounts.push(volume_mount(&volume_name, vol));
        volumes.push(Volume {
            source: volume_source(&k8s_name, &volume_name, vol.classification),
            name: volume_name,
        });
    }

    let probes = service
        .healthcheck
        .as_ref()
        .map(|hc| healthcheck_to_probes(hc, &analyzed.ports))
        .unwrap_or_default();

    let main = Container {
        name: k8s_name.clone(),
        image: service
            .image
            .clone()
            .unwrap_or_else(|| format!("{}:latest", k8s_name)),
        image_pull_policy: Some(config.deploy.image_pull_policy.as_str().to_string()),
        ports,
        env,
        env_from,
        volume_mounts,
        command: service.entrypoint.as_ref().map(command_words),
        args: service.command.as_ref().map(command_words),
        resources: build_resources(service_name, analyzed, config),
        liveness_probe: probes.liveness,
        readiness_probe: probes.readiness,
        security_context: container_security_context(config.pod_security_standard),
    };

    ContainerSpec {
        main,
        init_containers: generate_init_containers(analyzed, config, all_services),
        volumes,
    }
}

/// Secret-backed variables become individual `secretKeyRef` entries; the
/// rest are pulled in wholesale from the env ConfigMap.
fn partition_env(
    service_name: &str,
    k8s_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
) -> (Vec<EnvVar>, Vec<EnvFromSource>) {
    let mut env = Vec::new();
    let mut has_configmap_vars = false;

    for var in &analyzed.env_vars {
        match config.env_target(service_name, &var.name, var.sensitive) {
            EnvTarget::Secret => env.push(EnvVar {
                name: var.name.clone(),
                value: None,
                value_from: Some(EnvVarSource {
                    secret_key_ref: KeySelector {
                        name: env_secret_name(k8s_name),
                        key: var.name.clone(),
                    },
                }),
            }),
            EnvTarget::ConfigMap => has_configmap_vars = true,
        }
    }

    let env_from = if has_configmap_vars {
        vec![EnvFromSource {
            config_map_ref: LocalObjectReference {
                name: env_configmap_name(k8s_name),
            },
        }]
    } else {
        Vec::new()
    };

    (env, env_from)
}

fn volume_mount(volume_name: &str, vol: &AnalyzedVolume) -> VolumeMount {
    let basename = target_basename(&vol.mount.target);
    let sub_path = (basename.contains('.') && vol.classification.is_projected())
        .then(|| basename.to_string());

    VolumeMount {
        name: volume_name.to_string(),
        mount_path: vol.mount.target.clone(),
        read_only: vol.mount.read_only.then_some(true),
        sub_path,
    }
}

fn volume_source(k8s_name: &str, volume_name: &str, classification: VolumeClassification) -> VolumeSource {
    match classification {
        VolumeClassification::ConfigMap => VolumeSource::ConfigMap {
            name: file_object_name(k8s_name, volume_name),
        },
        VolumeClassification::Secret => VolumeSource::Secret {
            secret_name: file_object_name(k8s_name, volume_name),
        },
        VolumeClassification::EmptyDir => VolumeSource::EmptyDir {},
        VolumeClassification::Pvc => VolumeSource::PersistentVolumeClaim {
            claim_name: volume_name.to_string(),
        },
    }
}

fn command_words(command: &CommandLine) -> Vec<String> {
    match command {
        CommandLine::Shell(line) => split_shell_words(line),
        CommandLine::Exec(words) => words.clone(),
    }
}

/// Split a command line into words.
///
/// Handles single quotes, double quotes and backslash escapes outside single
/// quotes. Unterminated quotes run to the end of the input.
pub fn split_shell_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_single => {
                escaped = true;
                in_word = true;
            }
            '\'' if !in_double => {
                in_single = !in_single;
                in_word = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                in_word = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    words
}

// ============================================================================
// Pod template
// ============================================================================

/// Replica count: the configured override, else `deploy.replicas`. `None`
/// when the result is 1 so the field is left at its default.
pub fn resolve_replicas(service_name: &str, analyzed: &AnalyzedService, config: &Configuration) -> Option<u32> {
    config
        .workload_overrides
        .get(service_name)
        .and_then(|o| o.replicas)
        .or_else(|| analyzed.service.deploy.as_ref().and_then(|d| d.replicas))
        .filter(|r| *r != 1)
}

/// Pod template around a built container spec, with `volumes` as the pod
/// volumes.
pub fn pod_template(
    service_name: &str,
    spec: ContainerSpec,
    volumes: Vec<Volume>,
    config: &Configuration,
) -> PodTemplateSpec {
    let image_pull_secrets = config
        .deploy
        .image_pull_secrets
        .iter()
        .filter(|s| !s.is_empty())
        .map(|name| LocalObjectReference { name: name.clone() })
        .collect();

    PodTemplateSpec {
        metadata: TemplateMeta {
            labels: standard_labels(service_name),
        },
        spec: PodSpec {
            security_context: pod_security_context(config.pod_security_standard),
            image_pull_secrets,
            init_containers: spec.init_containers,
            containers: vec![spec.main],
            volumes,
        },
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Resources: the service's own `deploy.resources` block, else the
/// per-service override, else the configured defaults.
pub fn build_resources(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
) -> Option<ResourceRequirements> {
    if let Some(declared) = analyzed
        .service
        .deploy
        .as_ref()
        .and_then(|d| d.resources.as_ref())
    {
        let requirements = ResourceRequirements {
            requests: non_empty(&declared.reservations).map(resource_list),
            limits: non_empty(&declared.limits).map(resource_list),
        };
        if requirements.requests.is_none() && requirements.limits.is_none() {
            return None;
        }
        return Some(requirements);
    }

    let defaults = config
        .resource_overrides
        .get(service_name)
        .unwrap_or(&config.deploy.resource_defaults);
    Some(from_defaults(defaults))
}

fn non_empty(spec: &Option<ResourceSpec>) -> Option<&ResourceSpec> {
    spec.as_ref().filter(|s| !s.is_empty())
}

fn resource_list(spec: &ResourceSpec) -> ResourceList {
    ResourceList {
        cpu: spec.cpus.clone(),
        memory: spec.memory.clone(),
    }
}

fn from_defaults(defaults: &ResourceDefaults) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(ResourceList {
            cpu: Some(defaults.cpu_request.clone()),
            memory: Some(defaults.memory_request.clone()),
        }),
        limits: Some(ResourceList {
            cpu: Some(defaults.cpu_limit.clone()),
            memory: Some(defaults.memory_limit.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_service;
    use crate::config::{ImagePullPolicy, PodSecurityStandard};
    use crate::generator::test_support::config_for;
    use crate::parser::{
        ComposeDeploy, ComposeDeployResources, ComposeHealthcheck, ComposePort, ComposeService,
        ComposeVolumeMount, MountType,
    };

    fn bind(source: &str, target: &str, read_only: bool) -> ComposeVolumeMount {
        ComposeVolumeMount {
            source: source.to_string(),
            target: target.to_string(),
            read_only,
            mount_type: MountType::Bind,
        }
    }

    fn spec_for(name: &str, service: ComposeService, config: &mut Configuration) -> ContainerSpec {
        let analyzed = analyze_service(name, &service);
        let all: IndexMap<String, AnalyzedService> =
            [(name.to_string(), analyzed.clone())].into_iter().collect();
        if config.selected_services.is_empty() {
            config.selected_services.push(name.to_string());
        }
        build_container_spec(name, &analyzed, config, &all)
    }

    #[test]
    fn test_split_shell_words() {
        assert_eq!(split_shell_words("npm run start"), vec!["npm", "run", "start"]);
        assert_eq!(
            split_shell_words(r#"sh -c 'echo "hi there"' x"#),
            vec!["sh", "-c", r#"echo "hi there""#, "x"]
        );
        assert_eq!(split_shell_words(r#"say "a b" c\ d"#), vec!["say", "a b", "c d"]);
        assert_eq!(split_shell_words(r"'a\b'"), vec![r"a\b"]);
        assert_eq!(split_shell_words("  spaced   out "), vec!["spaced", "out"]);
        assert_eq!(split_shell_words("empty '' arg"), vec!["empty", "", "arg"]);
        assert!(split_shell_words("   ").is_empty());
    }

    #[test]
    fn test_env_partition() {
        let mut service = ComposeService {
            image: Some("node:20".into()),
            ..Default::default()
        };
        service.environment.insert("NODE_ENV".into(), "production".into());
        service.environment.insert("DB_PASSWORD".into(), "hunter2".into());
        service.environment.insert("FEATURE_FLAG".into(), "on".into());

        let mut config = config_for(&[]);
        config
            .env_classification
            .entry("api".into())
            .or_default()
            .insert("FEATURE_FLAG".into(), EnvTarget::Secret);

        let spec = spec_for("api", service, &mut config);
        let names: Vec<&str> = spec.main.env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["DB_PASSWORD", "FEATURE_FLAG"]);
        let secret_ref = &spec.main.env[0].value_from.as_ref().unwrap().secret_key_ref;
        assert_eq!(secret_ref.name, "api-secret");
        assert_eq!(secret_ref.key, "DB_PASSWORD");
        assert_eq!(spec.main.env_from[0].config_map_ref.name, "api-env");
    }

    #[test]
    fn test_no_env_from_without_plain_vars() {
        let mut service = ComposeService::default();
        service.environment.insert("API_TOKEN".into(), "t".into());
        let spec = spec_for("api", service, &mut config_for(&[]));
        assert!(spec.main.env_from.is_empty());
        assert_eq!(spec.main.env.len(), 1);
    }

    #[test]
    fn test_volumes_and_sub_path() {
        let service = ComposeService {
            image: Some("nginx:1.27".into()),
            volumes: vec![
                bind("./nginx.conf", "/etc/nginx/nginx.conf", true),
                bind("./certs/tls.crt", "/etc/ssl/tls.crt", false),
                bind("./site", "/usr/share/nginx/html", false),
                ComposeVolumeMount {
                    source: String::new(),
                    target: "/tmp/cache".into(),
                    read_only: false,
                    mount_type: MountType::Tmpfs,
                },
            ],
            ..Default::default()
        };
        let spec = spec_for("proxy", service, &mut config_for(&[]));
        let mounts = &spec.main.volume_mounts;

        assert_eq!(mounts[0].name, "proxy-nginx-conf");
        assert_eq!(mounts[0].sub_path.as_deref(), Some("nginx.conf"));
        assert_eq!(mounts[0].read_only, Some(true));
        assert_eq!(mounts[1].sub_path.as_deref(), Some("tls.crt"));
        assert_eq!(mounts[1].read_only, None);
        assert_eq!(mounts[2].sub_path, None);

        assert_eq!(
            spec.volumes[0].source,
            VolumeSource::ConfigMap {
                name: "proxy-proxy-nginx-conf".into()
            }
        );
        assert_eq!(
            spec.volumes[1].source,
            VolumeSource::Secret {
                secret_name: "proxy-proxy-tls-crt".into()
            }
        );
        assert_eq!(
            spec.volumes[2].source,
            VolumeSource::PersistentVolumeClaim {
                claim_name: "proxy-html".into()
            }
        );
        assert_eq!(spec.volumes[3].source, VolumeSource::EmptyDir {});
    }

    #[test]
    fn test_entrypoint_and_command() {
        let service = ComposeService {
            entrypoint: Some(CommandLine::Shell("/docker-entrypoint.sh --verbose".into())),
            command: Some(CommandLine::Exec(vec!["serve".into(), "--port=80".into()])),
            ..Default::default()
        };
        let spec = spec_for("web", service, &mut config_for(&[]));
        assert_eq!(
            spec.main.command,
            Some(vec!["/docker-entrypoint.sh".to_string(), "--verbose".to_string()])
        );
        assert_eq!(spec.main.args, Some(vec!["serve".to_string(), "--port=80".to_string()]));
        assert_eq!(spec.main.image, "web:latest");
    }

    #[test]
    fn test_resource_precedence() {
        let mut config = config_for(&[]);
        let spec = spec_for("api", ComposeService::default(), &mut config);
        let resources = spec.main.resources.unwrap();
        assert_eq!(resources.requests.unwrap().cpu.as_deref(), Some("100m"));
        assert_eq!(resources.limits.unwrap().memory.as_deref(), Some("512Mi"));

        config.resource_overrides.insert(
            "api".into(),
            ResourceDefaults {
                cpu_request: "250m".into(),
                cpu_limit: "1".into(),
                memory_request: "256Mi".into(),
                memory_limit: "1Gi".into(),
            },
        );
        let spec = spec_for("api", ComposeService::default(), &mut config);
        assert_eq!(spec.main.resources.unwrap().limits.unwrap().cpu.as_deref(), Some("1"));

        let declared = ComposeService {
            deploy: Some(ComposeDeploy {
                resources: Some(ComposeDeployResources {
                    limits: Some(ResourceSpec {
                        cpus: Some("0.5".into()),
                        memory: None,
                    }),
                    reservations: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let resources = spec_for("api", declared, &mut config).main.resources.unwrap();
        assert_eq!(resources.requests, None);
        let limits = resources.limits.unwrap();
        assert_eq!(limits.cpu.as_deref(), Some("0.5"));
        assert_eq!(limits.memory, None);
    }

    #[test]
    fn test_probes_pull_policy_and_security() {
        let service = ComposeService {
            ports: vec![ComposePort::new(3000)],
            healthcheck: Some(ComposeHealthcheck {
                test: vec!["CMD-SHELL".into(), "curl -f http://localhost:3000/health".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut config = config_for(&[]);
        config.deploy.image_pull_policy = ImagePullPolicy::Always;
        config.pod_security_standard = PodSecurityStandard::Baseline;

        let spec = spec_for("api", service, &mut config);
        assert_eq!(spec.main.image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(spec.main.ports[0].protocol, "TCP");
        let http = spec.main.readiness_probe.unwrap().http_get.unwrap();
        assert_eq!((http.port, http.path.as_str()), (3000, "/health"));
        assert!(spec.main.security_context.is_some());
    }
}
