//! Start-order dependency graph with cycle detection.

use super::types::DependencyGraph;
use crate::parser::ComposeService;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::VecDeque;

/// Build the dependency graph and a topological start order.
///
/// Edges to services that do not exist are dropped with a warning. Kahn's
/// algorithm runs over a reverse index (dependency -> dependents) derived
/// from the forward edges, so each edge is visited once. Ties are broken by
/// the services' declaration order.
pub fn analyze_dependencies(services: &IndexMap<String, ComposeService>) -> DependencyGraph {
    let mut warnings = Vec::new();

    let mut edges: IndexMap<String, Vec<String>> = IndexMap::with_capacity(services.len());
    for (name, service) in services {
        let mut deps = Vec::with_capacity(service.depends_on.len());
        for dep in service.depends_on.keys() {
            if services.contains_key(dep) {
                deps.push(dep.clone());
            } else {
                let msg = format!(
                    "Service \"{}\" depends on \"{}\", which is not defined. The dependency is ignored.",
                    name, dep
                );
                warn!("{}", msg);
                warnings.push(msg);
            }
        }
        edges.insert(name.clone(), deps);
    }

    let dependents = reverse_index(&edges);

    let mut in_degree: Vec<usize> = edges.values().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(edges.len());
    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    let has_cycles = order.len() != edges.len();
    if has_cycles {
        let cyclic: Vec<&str> = edges
            .keys()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, name)| name.as_str())
            .collect();
        let msg = format!(
            "Circular dependency detected in service dependencies: {}",
            cyclic.join(", ")
        );
        warn!("{}", msg);
        warnings.push(msg);
    }

    let order: Vec<String> = order
        .into_iter()
        .filter_map(|i| edges.get_index(i).map(|(name, _)| name.clone()))
        .collect();
    debug!("dependency order: {:?} (cycles: {})", order, has_cycles);

    DependencyGraph {
        edges,
        order,
        has_cycles,
        warnings,
    }
}

/// For each service index, the indices of services that depend on it, in
/// declaration order.
fn reverse_index(edges: &IndexMap<String, Vec<String>>) -> Vec<Vec<usize>> {
    let mut dependents = vec![Vec::new(); edges.len()];
    for (idx, deps) in edges.values().enumerate() {
        for dep in deps {
            if let Some(dep_idx) = edges.get_index_of(dep) {
                dependents[dep_idx].push(idx);
            }
        }
    }
    dependents
}
