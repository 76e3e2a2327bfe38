//! Init containers that hold a pod until its dependencies accept connections.
//!
//! Dependencies whose image family ships a readiness CLI are polled with that
//! tool from the dependency's own image. Anything else gets a TCP port check
//! from a small utility image.

use super::security_context::container_security_context;
use super::types::Container;
use crate::analyzer::{AnalyzedService, ServiceCategory, image_basename};
use crate::common::to_k8s_name;
use crate::config::{Configuration, InitContainerStrategy};
use indexmap::IndexMap;
use log::debug;

/// Attempts before a wait loop gives up and fails the pod.
pub const MAX_RETRIES: u32 = 150;

/// Seconds between attempts.
pub const RETRY_INTERVAL_SECS: u32 = 2;

pub const FALLBACK_IMAGE: &str = "busybox:1.37";

type ReadinessCommand = fn(&str, u16) -> String;

struct NativeReadiness {
    family: &'static str,
    default_port: u16,
    command: ReadinessCommand,
}

/// Image families with a native readiness check, in match order.
const NATIVE_READINESS: &[NativeReadiness] = &[
    NativeReadiness { family: "postgres", default_port: 5432, command: pg_isready },
    NativeReadiness { family: "redis", default_port: 6379, command: redis_ping },
    NativeReadiness { family: "mariadb", default_port: 3306, command: mariadb_ping },
    NativeReadiness { family: "mysql", default_port: 3306, command: mysql_ping },
    NativeReadiness { family: "mongo", default_port: 27017, command: mongosh_ping },
];

fn native_readiness(service: &AnalyzedService) -> Option<&'static NativeReadiness> {
    let base = image_basename(service.service.image.as_deref()?);
    NATIVE_READINESS.iter().find(|n| base.contains(n.family))
}

/// Listen port of a service whose image family is known, for services that
/// declare no ports of their own.
pub fn native_default_port(service: &AnalyzedService) -> Option<u16> {
    native_readiness(service).map(|n| n.default_port)
}

fn pg_isready(host: &str, port: u16) -> String {
    format!("pg_isready -h {} -p {} -q", host, port)
}

fn redis_ping(host: &str, port: u16) -> String {
    format!("redis-cli -h {} -p {} ping | grep -q PONG", host, port)
}

fn mariadb_ping(host: &str, port: u16) -> String {
    format!("mariadb-admin ping -h {} -P {} --silent", host, port)
}

fn mysql_ping(host: &str, port: u16) -> String {
    format!("mysqladmin ping -h {} -P {} --silent", host, port)
}

fn mongosh_ping(host: &str, port: u16) -> String {
    format!(
        "mongosh --host {} --port {} --quiet --eval \"db.adminCommand('ping')\"",
        host, port
    )
}

fn category_default_port(category: ServiceCategory) -> Option<u16> {
    match category {
        ServiceCategory::Database => Some(5432),
        ServiceCategory::Cache => Some(6379),
        ServiceCategory::Queue => Some(5672),
        ServiceCategory::Web | ServiceCategory::Proxy => Some(80),
        ServiceCategory::Api => Some(3000),
        ServiceCategory::Worker | ServiceCategory::Other => None,
    }
}

/// Port to probe on a dependency: its first declared port, else its image
/// family's port, else the category's conventional port, else 80.
pub fn dependency_port(dependency: &AnalyzedService) -> u16 {
    dependency
        .ports
        .first()
        .map(|p| p.container_port)
        .or_else(|| native_default_port(dependency))
        .or_else(|| category_default_port(dependency.category))
        .unwrap_or(80)
}

/// Wrap a readiness command in the bounded retry loop.
pub fn wait_script(check: &str, dependency: &str) -> String {
    format!(
        "i=0; until {check}; do i=$((i+1)); if [ $i -ge {max} ]; then echo \"Timeout waiting for {dep} after {max} attempts\"; exit 1; fi; echo \"Waiting for {dep}... ($i/{max})\"; sleep {sleep}; done",
        check = check,
        max = MAX_RETRIES,
        dep = dependency,
        sleep = RETRY_INTERVAL_SECS,
    )
}

/// Image and readiness command used to wait for `dependency`.
fn readiness_check(dependency: &AnalyzedService, host: &str, port: u16) -> (String, String) {
    let native = native_readiness(dependency).zip(dependency.service.image.as_deref());
    native
        .map(|(n, image)| (image.to_string(), (n.command)(host, port)))
        .unwrap_or_else(|| (FALLBACK_IMAGE.to_string(), format!("nc -z {} {}", host, port)))
}

/// One init container per selected dependency that exists in the project.
pub fn generate_init_containers(
    analyzed: &AnalyzedService,
    config: &Configuration,
    all_services: &IndexMap<String, AnalyzedService>,
) -> Vec<Container> {
    if config.init_containers == InitContainerStrategy::None {
        return Vec::new();
    }

    let security_context = container_security_context(config.pod_security_standard);

    analyzed
        .depends_on
        .iter()
        .filter(|dep| config.is_selected(dep))
        .filter_map(|dep| all_services.get(dep).map(|svc| (dep, svc)))
        .map(|(dep, dependency)| {
            let host = to_k8s_name(dep);
            let port = dependency_port(dependency);
            let (image, check) = readiness_check(dependency, &host, port);
            debug!("{} waits for {} via `{}`", analyzed.name, dep, check);

            Container {
                name: format!("wait-for-{}", host),
                image,
                command: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    wait_script(&check, dep),
                ]),
                security_context: security_context.clone(),
                ..Default::default()
            }
        })
        .collect()
}
