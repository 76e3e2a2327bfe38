//! Kubernetes resource naming and the fixed label set.

use std::collections::BTreeMap;

/// Value of the `app.kubernetes.io/managed-by` label on every generated object.
pub const MANAGED_BY: &str = "compose2k8s";

/// Label carrying the owning service's Kubernetes name.
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label identifying this tool as the manager of the object.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

const MAX_NAME_LEN: usize = 63;

/// Convert a compose name into a valid Kubernetes resource name.
///
/// Lowercases, maps `_` and `.` to `-`, drops anything outside `[a-z0-9-]`,
/// collapses dash runs, trims edge dashes and truncates to 63 characters.
///
/// # Examples
/// - "My_Service" -> "my-service"
/// - "api.v2" -> "api-v2"
/// - "___" -> "unnamed"
pub fn to_k8s_name(compose_name: &str) -> String {
    let mut name = String::with_capacity(compose_name.len());
    for ch in compose_name.chars().flat_map(char::to_lowercase) {
        let mapped = match ch {
            '_' | '.' => '-',
            'a'..='z' | '0'..='9' | '-' => ch,
            _ => continue,
        };
        if mapped == '-' && name.ends_with('-') {
            continue;
        }
        name.push(mapped);
    }

    let mut name = name.trim_matches('-').to_string();
    if name.len() > MAX_NAME_LEN {
        name.truncate(MAX_NAME_LEN);
        while name.ends_with('-') {
            name.pop();
        }
    }

    if name.is_empty() {
        return "unnamed".to_string();
    }
    name
}

/// The label set stamped on every object that belongs to a service.
pub fn standard_labels(service_name: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(service_name);
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels
}

/// Labels used to select a service's pods.
pub fn selector_labels(service_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(NAME_LABEL.to_string(), to_k8s_name(service_name))])
}

/// Labels for objects that are not owned by a single service (routing).
pub fn managed_by_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_maps_separators() {
        assert_eq!(to_k8s_name("My_Service"), "my-service");
        assert_eq!(to_k8s_name("api.v2"), "api-v2");
    }

    #[test]
    fn test_collapses_and_trims_dashes() {
        assert_eq!(to_k8s_name("--web__app--"), "web-app");
        assert_eq!(to_k8s_name("a@b#c"), "abc");
    }

    #[test]
    fn test_truncates_to_63() {
        let long = "a".repeat(70);
        assert_eq!(to_k8s_name(&long).len(), 63);

        let dashed = format!("{}_b", "a".repeat(62));
        assert_eq!(to_k8s_name(&dashed), "a".repeat(62));
    }

    #[test]
    fn test_empty_becomes_unnamed() {
        assert_eq!(to_k8s_name(""), "unnamed");
        assert_eq!(to_k8s_name("___"), "unnamed");
    }

    #[test]
    fn test_standard_labels() {
        let labels = standard_labels("My_Api");
        assert_eq!(labels.get(NAME_LABEL).map(String::as_str), Some("my-api"));
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some("compose2k8s"));
        assert_eq!(selector_labels("My_Api").len(), 1);
    }
}
