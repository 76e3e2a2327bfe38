//! Service category and workload inference.
//!
//! Category inference walks [`CATEGORY_RULES`] in order and stops at the
//! first rule that matches. Each rule consults one static lookup table.

use super::types::{ServiceCategory, WorkloadType};
use crate::parser::ComposeService;
use log::trace;
use regex::Regex;
use std::sync::LazyLock;

use ServiceCategory::*;

// ============================================================================
// Lookup tables
// ============================================================================

/// Image basename substrings, checked in order.
const IMAGE_CATEGORIES: &[(&str, ServiceCategory)] = &[
    ("postgres", Database),
    ("postgresql", Database),
    ("mysql", Database),
    ("mariadb", Database),
    ("mongo", Database),
    ("mongodb", Database),
    ("redis", Cache),
    ("memcached", Cache),
    ("rabbitmq", Queue),
    ("kafka", Queue),
    ("nats", Queue),
    ("nginx", Proxy),
    ("traefik", Proxy),
    ("haproxy", Proxy),
    ("caddy", Proxy),
    ("httpd", Web),
    ("apache", Web),
];

/// Server-side configuration variables. Client variables such as
/// `DATABASE_URL` or `REDIS_URL` are deliberately absent: they mark a
/// consumer of the backing service, not the service itself.
static ENV_CATEGORIES: LazyLock<Vec<(Regex, ServiceCategory)>> = LazyLock::new(|| {
    [
        (r"^POSTGRES_(USER|PASSWORD|DB|HOST_AUTH_METHOD|INITDB)", Database),
        (r"^MYSQL_(ROOT_PASSWORD|DATABASE|USER|PASSWORD|ALLOW)", Database),
        (r"^MONGO_INITDB", Database),
        (r"^REDIS_(PASSWORD|MAXMEMORY|APPENDONLY)$", Cache),
        (r"^RABBITMQ_(DEFAULT_USER|DEFAULT_PASS|DEFAULT_VHOST)", Queue),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(pattern).unwrap(), category))
    .collect()
});

const PORT_CATEGORIES: &[(u16, ServiceCategory)] = &[
    (5432, Database),
    (3306, Database),
    (27017, Database),
    (6379, Cache),
    (11211, Cache),
    (5672, Queue),
    (15672, Queue),
    (9092, Queue),
    (80, Web),
    (443, Web),
    (8080, Api),
    (3000, Api),
    (4000, Api),
    (8000, Api),
];

/// Service-name substrings, checked in order.
const NAME_CATEGORIES: &[(&str, ServiceCategory)] = &[
    ("db", Database),
    ("database", Database),
    ("postgres", Database),
    ("mysql", Database),
    ("mongo", Database),
    ("redis", Cache),
    ("cache", Cache),
    ("memcached", Cache),
    ("rabbitmq", Queue),
    ("kafka", Queue),
    ("queue", Queue),
    ("worker", Worker),
    ("celery", Worker),
    ("cron", Worker),
    ("scheduler", Worker),
    ("nginx", Proxy),
    ("proxy", Proxy),
    ("traefik", Proxy),
    ("web", Web),
    ("frontend", Web),
    ("api", Api),
    ("backend", Api),
    ("app", Api),
    ("server", Api),
];

// ============================================================================
// Rule chain
// ============================================================================

type CategoryRule = fn(&str, &ComposeService) -> Option<ServiceCategory>;

/// Category rules in priority order. The first match wins; [`Api`] is the
/// fallback when none match.
pub const CATEGORY_RULES: &[(&str, CategoryRule)] = &[
    ("image", category_from_image),
    ("environment", category_from_env),
    ("port", category_from_ports),
    ("name", category_from_name),
];

/// Lowercased image basename without registry path or tag.
///
/// `registry.example.com:5000/team/postgres:16` -> `postgres`
pub fn image_basename(image: &str) -> String {
    let without_digest = image.split('@').next().unwrap_or(image);
    let last = without_digest.rsplit('/').next().unwrap_or(without_digest);
    last.split(':').next().unwrap_or(last).to_lowercase()
}

pub fn category_from_image(_name: &str, service: &ComposeService) -> Option<ServiceCategory> {
    let base = image_basename(service.image.as_deref()?);
    IMAGE_CATEGORIES
        .iter()
        .find(|(pattern, _)| base.contains(pattern))
        .map(|(_, category)| *category)
}

pub fn category_from_env(_name: &str, service: &ComposeService) -> Option<ServiceCategory> {
    service.environment.keys().find_map(|key| {
        ENV_CATEGORIES
            .iter()
            .find(|(pattern, _)| pattern.is_match(key))
            .map(|(_, category)| *category)
    })
}

pub fn category_from_ports(_name: &str, service: &ComposeService) -> Option<ServiceCategory> {
    service.ports.iter().find_map(|port| {
        PORT_CATEGORIES
            .iter()
            .find(|(p, _)| *p == port.target)
            .map(|(_, category)| *category)
    })
}

pub fn category_from_name(name: &str, _service: &ComposeService) -> Option<ServiceCategory> {
    let lower = name.to_lowercase();
    NAME_CATEGORIES
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, category)| *category)
}

/// Infer a service's category.
pub fn infer_service_category(name: &str, service: &ComposeService) -> ServiceCategory {
    for (rule, check) in CATEGORY_RULES {
        if let Some(category) = check(name, service) {
            trace!("service {} classified as {} by {} rule", name, category, rule);
            return category;
        }
    }
    trace!("service {} classified as api by fallback", name);
    Api
}

/// Infer whether a service should run as a Deployment or a StatefulSet.
///
/// Database, cache and queue services are always stateful. Any other
/// non-frontline service that mounts a named volume is stateful too.
pub fn infer_workload_type(service: &ComposeService, category: ServiceCategory) -> WorkloadType {
    if category.is_stateful() {
        return WorkloadType::StatefulSet;
    }

    let has_named_volume = service.volumes.iter().any(|v| v.is_named_volume());
    if has_named_volume && !category.is_frontline() {
        return WorkloadType::StatefulSet;
    }

    WorkloadType::Deployment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ComposePort, ComposeVolumeMount, MountType};

    fn with_image(image: &str) -> ComposeService {
        ComposeService {
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_basename() {
        assert_eq!(image_basename("postgres:16-alpine"), "postgres");
        assert_eq!(image_basename("registry.local:5000/team/Redis:7"), "redis");
        assert_eq!(image_basename("bitnami/mongodb@sha256:abc"), "mongodb");
    }

    #[test]
    fn test_image_rule_wins() {
        // Name says "worker", image says database: image has priority.
        let svc = with_image("mysql:8");
        assert_eq!(infer_service_category("worker", &svc), Database);
        assert_eq!(infer_service_category("x", &with_image("bitnami/rabbitmq")), Queue);
        assert_eq!(infer_service_category("x", &with_image("httpd:2.4")), Web);
        assert_eq!(infer_service_category("x", &with_image("caddy")), Proxy);
    }

    #[test]
    fn test_env_rule_ignores_client_variables() {
        let mut svc = with_image("myorg/custom");
        svc.environment.insert("DATABASE_URL".into(), "postgres://db".into());
        svc.environment.insert("REDIS_URL".into(), "redis://cache".into());
        assert_eq!(infer_service_category("svc", &svc), Api);

        svc.environment.insert("POSTGRES_PASSWORD".into(), "x".into());
        assert_eq!(infer_service_category("svc", &svc), Database);
    }

    #[test]
    fn test_port_then_name_rules() {
        let mut svc = with_image("myorg/custom");
        svc.ports.push(ComposePort::new(6379));
        assert_eq!(infer_service_category("frontend", &svc), Cache);

        let plain = with_image("myorg/custom");
        assert_eq!(infer_service_category("celery-beat", &plain), Worker);
        assert_eq!(infer_service_category("frontend", &plain), Web);
        assert_eq!(infer_service_category("zzz", &plain), Api);
    }

    #[test]
    fn test_workload_type() {
        let svc = ComposeService::default();
        assert_eq!(infer_workload_type(&svc, Database), WorkloadType::StatefulSet);
        assert_eq!(infer_workload_type(&svc, Worker), WorkloadType::Deployment);

        let mut with_volume = ComposeService::default();
        with_volume.volumes.push(ComposeVolumeMount {
            source: "uploads".into(),
            target: "/srv/uploads".into(),
            read_only: false,
            mount_type: MountType::Volume,
        });
        assert_eq!(infer_workload_type(&with_volume, Worker), WorkloadType::StatefulSet);
        assert_eq!(infer_workload_type(&with_volume, Api), WorkloadType::Deployment);

        let mut anonymous = ComposeService::default();
        anonymous.volumes.push(ComposeVolumeMount {
            source: String::new(),
            target: "/data".into(),
            read_only: false,
            mount_type: MountType::Volume,
        });
        assert_eq!(infer_workload_type(&anonymous, Worker), WorkloadType::Deployment);
    }
}
