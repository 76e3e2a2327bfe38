//! Project analysis.
//!
//! Turns a normalized [`ComposeProject`] into an [`AnalysisResult`]: a
//! category, workload kind and classified volumes/ports/env per service,
//! plus the dependency graph.

pub mod dependency;
pub mod secrets;
pub mod service;
pub mod types;
pub mod volume;

pub use dependency::analyze_dependencies;
pub use secrets::is_sensitive_env_var;
pub use service::{image_basename, infer_service_category, infer_workload_type};
pub use types::*;
pub use volume::{classify_volume, suggested_volume_name, suggested_volume_names};

use crate::parser::{ComposeProject, ComposeService};
use indexmap::IndexMap;
use log::{debug, warn};

/// Analyze every service of a project.
pub fn analyze_project(project: &ComposeProject) -> AnalysisResult {
    let mut warnings = Vec::new();
    let mut services = IndexMap::with_capacity(project.services.len());

    for (name, service) in &project.services {
        if service.image.is_none() && service.build.is_some() {
            let msg = format!(
                "Service \"{}\" uses build without image. You'll need to push the image to a registry and set the image field.",
                name
            );
            warn!("{}", msg);
            warnings.push(msg);
        }
        services.insert(name.clone(), analyze_service(name, service));
    }

    let dependency_graph = analyze_dependencies(&project.services);
    warnings.extend(dependency_graph.warnings.iter().cloned());

    debug!(
        "analyzed {} services, start order {:?}",
        services.len(),
        dependency_graph.order
    );

    AnalysisResult {
        services,
        dependency_graph,
        warnings,
    }
}

/// Analyze a single service in isolation.
pub fn analyze_service(name: &str, service: &ComposeService) -> AnalyzedService {
    let category = infer_service_category(name, service);
    let workload_type = infer_workload_type(service, category);

    let volume_names = suggested_volume_names(name, service.volumes.iter().map(|m| m.target.as_str()));
    let volumes = service
        .volumes
        .iter()
        .zip(volume_names)
        .map(|(mount, suggested_name)| AnalyzedVolume {
            classification: classify_volume(mount),
            suggested_name,
            mount: mount.clone(),
        })
        .collect();

    let ports = service
        .ports
        .iter()
        .map(|p| AnalyzedPort {
            container_port: p.target,
            protocol: p.protocol,
            published_port: p.published,
        })
        .collect();

    let env_vars = service
        .environment
        .iter()
        .map(|(key, value)| AnalyzedEnvVar {
            name: key.clone(),
            value: value.clone(),
            sensitive: is_sensitive_env_var(key, value),
        })
        .collect();

    AnalyzedService {
        name: name.to_string(),
        service: service.clone(),
        category,
        workload_type,
        volumes,
        ports,
        env_vars,
        depends_on: service.depends_on.keys().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseContext, parse_compose_str};

    fn analyze(yaml: &str) -> AnalysisResult {
        let result = parse_compose_str(yaml, "compose.yml", &ParseContext::default()).unwrap();
        analyze_project(&result.project)
    }

    #[test]
    fn test_web_api_db_project() {
        let analysis = analyze(
            r#"
services:
  web:
    image: nginx:1.27
    ports: ["80:80"]
    depends_on: [api]
  api:
    build: ./api
    environment:
      DATABASE_URL: postgres://app:secret@db:5432/app
      NODE_ENV: production
    depends_on: [db]
  db:
    image: postgres:16
    volumes: ["pgdata:/var/lib/postgresql/data"]
volumes:
  pgdata:
"#,
        );

        assert_eq!(analysis.dependency_graph.order, vec!["db", "api", "web"]);
        let db = &analysis.services["db"];
        assert_eq!(db.category, ServiceCategory::Database);
        assert_eq!(db.workload_type, WorkloadType::StatefulSet);
        assert_eq!(db.volumes[0].classification, VolumeClassification::Pvc);
        assert_eq!(db.volumes[0].suggested_name, "db-data");

        let api = &analysis.services["api"];
        assert_eq!(api.workload_type, WorkloadType::Deployment);
        assert!(api.env_vars.iter().any(|e| e.name == "DATABASE_URL" && e.sensitive));
        assert!(api.env_vars.iter().any(|e| e.name == "NODE_ENV" && !e.sensitive));

        assert_eq!(analysis.services["web"].category, ServiceCategory::Proxy);
        assert_eq!(analysis.warnings.len(), 1);
        assert!(analysis.warnings[0].contains("uses build without image"));
    }

    #[test]
    fn test_colliding_mount_names_get_suffixes() {
        let analysis = analyze(
            "services:\n  db:\n    image: postgres:16\n    volumes:\n      - pgdata:/var/lib/postgresql/data\n      - ./seed:/data\nvolumes:\n  pgdata:\n",
        );
        let names: Vec<&str> = analysis.services["db"]
            .volumes
            .iter()
            .map(|v| v.suggested_name.as_str())
            .collect();
        assert_eq!(names, vec!["db-data", "db-data-2"]);
    }

    #[test]
    fn test_cycle_warning_reaches_result() {
        let analysis = analyze("services:\n  a: {image: x, depends_on: [b]}\n  b: {image: y, depends_on: [a]}\n");
        assert!(analysis.dependency_graph.has_cycles);
        assert!(analysis.warnings.iter().any(|w| w.contains("Circular dependency detected")));
    }
}
