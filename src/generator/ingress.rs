//! Ingress routing.

use super::types::{
    GeneratedManifest, HttpIngressPath, HttpIngressRuleValue, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTls, K8sManifest, ObjectMeta, ServiceBackendPort,
};
use crate::common::{managed_by_labels, to_k8s_name};
use crate::config::{Configuration, IngressConfig};
use std::collections::BTreeMap;

pub const INGRESS_NAME: &str = "app-ingress";
pub const INGRESS_TLS_SECRET: &str = "app-tls-secret";

/// Annotations shared by Ingress and Gateway objects.
pub fn routing_annotations(ingress: &IngressConfig) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    if ingress.tls && ingress.cert_manager {
        annotations.insert(
            "cert-manager.io/cluster-issuer".to_string(),
            "letsencrypt-prod".to_string(),
        );
    }
    annotations
}

/// A single Ingress for every configured route, or `None` when routing is
/// disabled or has no routes.
pub fn generate_ingress(config: &Configuration) -> Option<GeneratedManifest> {
    let ingress = &config.ingress;
    if !ingress.has_routes() {
        return None;
    }
    let domain = ingress.domain_or_default();

    let paths = ingress
        .routes
        .iter()
        .map(|route| HttpIngressPath {
            path: route.path.clone(),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: IngressServiceBackend {
                    name: to_k8s_name(&route.service_name),
                    port: ServiceBackendPort { number: route.port },
                },
            },
        })
        .collect();

    let tls = if ingress.tls {
        vec![IngressTls {
            hosts: vec![domain.to_string()],
            secret_name: INGRESS_TLS_SECRET.to_string(),
        }]
    } else {
        Vec::new()
    };

    let mut metadata = ObjectMeta::new(INGRESS_NAME, config.deploy.namespace(), managed_by_labels());
    metadata.annotations = routing_annotations(ingress);

    let manifest = K8sManifest::new("networking.k8s.io/v1", "Ingress", metadata).with_spec(IngressSpec {
        ingress_class_name: ingress.controller.class_name().map(str::to_string),
        tls,
        rules: vec![IngressRule {
            host: domain.to_string(),
            http: HttpIngressRuleValue { paths },
        }],
    });

    Some(GeneratedManifest::new(
        "ingress.yaml",
        manifest,
        "_ingress",
        "Ingress for routing external traffic",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngressController, IngressRoute};
    use crate::generator::test_support::config_for;
    use crate::generator::types::ManifestSpec;

    fn routed_config() -> Configuration {
        let mut config = config_for(&["web", "api"]);
        config.ingress.enabled = true;
        config.ingress.controller = IngressController::Nginx;
        config.ingress.routes = vec![
            IngressRoute {
                service_name: "web".into(),
                path: "/".into(),
                port: 80,
            },
            IngressRoute {
                service_name: "api_v2".into(),
                path: "/api".into(),
                port: 3000,
            },
        ];
        config
    }

    fn spec_of(generated: &GeneratedManifest) -> &IngressSpec {
        match generated.manifest.spec.as_ref() {
            Some(ManifestSpec::Ingress(spec)) => spec,
            other => panic!("expected an Ingress spec, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_or_empty() {
        let mut config = routed_config();
        config.ingress.enabled = false;
        assert!(generate_ingress(&config).is_none());

        let mut config = routed_config();
        config.ingress.routes.clear();
        assert!(generate_ingress(&config).is_none());
    }

    #[test]
    fn test_routes_and_defaults() {
        let generated = generate_ingress(&routed_config()).unwrap();
        assert_eq!(generated.filename, "ingress.yaml");
        assert_eq!(generated.service_name, "_ingress");
        assert_eq!(generated.manifest.name(), "app-ingress");
        assert!(generated.manifest.metadata.annotations.is_empty());
        assert_eq!(generated.manifest.metadata.labels, managed_by_labels());

        let spec = spec_of(&generated);
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        assert!(spec.tls.is_empty());
        assert_eq!(spec.rules[0].host, "app.example.com");
        let paths = &spec.rules[0].http.paths;
        assert_eq!(paths[1].path, "/api");
        assert_eq!(paths[1].path_type, "Prefix");
        assert_eq!(paths[1].backend.service.name, "api-v2");
        assert_eq!(paths[1].backend.service.port.number, 3000);
    }

    #[test]
    fn test_tls_and_cert_manager() {
        let mut config = routed_config();
        config.ingress.domain = Some("shop.example.org".into());
        config.ingress.tls = true;
        config.ingress.cert_manager = true;
        config.ingress.controller = IngressController::None;

        let generated = generate_ingress(&config).unwrap();
        assert_eq!(
            generated.manifest.metadata.annotations["cert-manager.io/cluster-issuer"],
            "letsencrypt-prod"
        );
        let spec = spec_of(&generated);
        assert_eq!(spec.ingress_class_name, None);
        assert_eq!(spec.tls[0].hosts, vec!["shop.example.org"]);
        assert_eq!(spec.tls[0].secret_name, "app-tls-secret");
        assert_eq!(spec.rules[0].host, "shop.example.org");
    }
}
