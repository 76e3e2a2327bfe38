//! Data migration helper scripts for database services.
//!
//! Each script dumps the database from the running Compose container and
//! restores it into the first pod of the generated workload.

use super::types::MigrationScript;
use crate::analyzer::{AnalysisResult, AnalyzedService, ServiceCategory, WorkloadType, image_basename};
use crate::common::to_k8s_name;
use crate::config::Configuration;
use log::debug;

struct DumpStrategy {
    family: &'static str,
    label: &'static str,
    extension: &'static str,
    /// Run inside the Compose container, writes the dump to stdout.
    dump: &'static str,
    /// Run inside the pod, reads the dump from stdin.
    restore: &'static str,
}

/// Checked in order; `mariadb` must precede `mysql`.
const STRATEGIES: &[DumpStrategy] = &[
    DumpStrategy {
        family: "postgres",
        label: "PostgreSQL",
        extension: "sql",
        dump: r#"sh -c 'exec pg_dumpall -U "${POSTGRES_USER:-postgres}"'"#,
        restore: r#"sh -c 'exec psql -U "${POSTGRES_USER:-postgres}" -d postgres'"#,
    },
    DumpStrategy {
        family: "mariadb",
        label: "MariaDB",
        extension: "sql",
        dump: r#"sh -c 'exec mariadb-dump --all-databases -uroot -p"${MARIADB_ROOT_PASSWORD:-$MYSQL_ROOT_PASSWORD}"'"#,
        restore: r#"sh -c 'exec mariadb -uroot -p"${MARIADB_ROOT_PASSWORD:-$MYSQL_ROOT_PASSWORD}"'"#,
    },
    DumpStrategy {
        family: "mysql",
        label: "MySQL",
        extension: "sql",
        dump: r#"sh -c 'exec mysqldump --all-databases -uroot -p"$MYSQL_ROOT_PASSWORD"'"#,
        restore: r#"sh -c 'exec mysql -uroot -p"$MYSQL_ROOT_PASSWORD"'"#,
    },
    DumpStrategy {
        family: "mongo",
        label: "MongoDB",
        extension: "archive",
        dump: "mongodump --archive",
        restore: "mongorestore --archive --drop",
    },
];

fn strategy_for(service: &AnalyzedService) -> Option<&'static DumpStrategy> {
    if service.category != ServiceCategory::Database {
        return None;
    }
    let base = image_basename(service.service.image.as_deref()?);
    STRATEGIES.iter().find(|s| base.contains(s.family))
}

/// One script per selected database service with a known dump strategy.
pub fn generate_migration_scripts(analysis: &AnalysisResult, config: &Configuration) -> Vec<MigrationScript> {
    let namespace = config.deploy.namespace().unwrap_or("default");

    config
        .selected_services
        .iter()
        .filter_map(|name| analysis.services.get(name).map(|svc| (name, svc)))
        .filter_map(|(name, svc)| {
            let strategy = strategy_for(svc)?;
            let workload = config
                .workload_overrides
                .get(name)
                .and_then(|o| o.workload_type)
                .unwrap_or(svc.workload_type);
            debug!("migration script for {} ({})", name, strategy.label);

            let k8s_name = to_k8s_name(name);
            Some(MigrationScript {
                filename: format!("migrate-{}.sh", k8s_name),
                content: render_script(name, &k8s_name, namespace, workload, strategy),
                service_name: name.clone(),
                description: format!("{} data migration for {}", strategy.label, name),
            })
        })
        .collect()
}

fn render_script(
    service_name: &str,
    k8s_name: &str,
    namespace: &str,
    workload: WorkloadType,
    strategy: &DumpStrategy,
) -> String {
    let (target, wait) = match workload {
        WorkloadType::StatefulSet => (
            format!("{}-0", k8s_name),
            r#"kubectl wait -n "$NAMESPACE" --for=condition=Ready "pod/$TARGET" --timeout=300s"#,
        ),
        WorkloadType::Deployment => (
            format!("deploy/{}", k8s_name),
            r#"kubectl rollout status -n "$NAMESPACE" "$TARGET" --timeout=300s"#,
        ),
    };

    let mut script = String::new();
    script.push_str("#!/usr/bin/env bash\n");
    script.push_str(&format!(
        "# Copy {} data of \"{}\" from Docker Compose into Kubernetes.\n",
        strategy.label, service_name
    ));
    script.push_str("# Run next to the compose file, with kubectl pointed at the target cluster.\n");
    script.push_str("set -euo pipefail\n\n");
    script.push_str(&format!("COMPOSE_SERVICE=\"{}\"\n", service_name));
    script.push_str(&format!("NAMESPACE=\"${{NAMESPACE:-{}}}\"\n", namespace));
    script.push_str(&format!("TARGET=\"{}\"\n", target));
    script.push_str(&format!(
        "DUMP=\"${{DUMP:-{}-dump.{}}}\"\n\n",
        k8s_name, strategy.extension
    ));
    script.push_str("echo \"Waiting for $TARGET...\"\n");
    script.push_str(wait);
    script.push_str("\n\n");
    script.push_str("echo \"Dumping $COMPOSE_SERVICE to $DUMP...\"\n");
    script.push_str(&format!(
        "docker compose exec -T \"$COMPOSE_SERVICE\" {} > \"$DUMP\"\n\n",
        strategy.dump
    ));
    script.push_str("echo \"Restoring into $TARGET...\"\n");
    script.push_str(&format!(
        "kubectl exec -i -n \"$NAMESPACE\" \"$TARGET\" -- {} < \"$DUMP\"\n\n",
        strategy.restore
    ));
    script.push_str("echo \"Done. The dump is kept at $DUMP.\"\n");
    script
}
