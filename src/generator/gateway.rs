//! Gateway API routing: a `Gateway` and an `HTTPRoute`.

use super::ingress::routing_annotations;
use super::types::{
    AllowedRoutes, BackendRef, CertificateRef, GatewaySpec, GatewayTls, GeneratedManifest,
    HttpPathMatch, HttpRouteMatch, HttpRouteRule, HttpRouteSpec, K8sManifest, Listener,
    LocalObjectReference, ObjectMeta, RouteNamespaces,
};
use crate::common::{managed_by_labels, to_k8s_name};
use crate::config::Configuration;

const GATEWAY_API_VERSION: &str = "gateway.networking.k8s.io/v1";
pub const DEFAULT_GATEWAY_CLASS: &str = "istio";

fn listener(name: &str, protocol: &str, port: u16, hostname: &str, tls: Option<GatewayTls>) -> Listener {
    Listener {
        name: name.to_string(),
        protocol: protocol.to_string(),
        port,
        hostname: hostname.to_string(),
        tls,
        allowed_routes: AllowedRoutes {
            namespaces: RouteNamespaces {
                from: "Same".to_string(),
            },
        },
    }
}

/// Gateway and HTTPRoute for every configured route; empty when routing is
/// disabled or has no routes.
pub fn generate_gateway_api(config: &Configuration) -> Vec<GeneratedManifest> {
    let ingress = &config.ingress;
    if !ingress.has_routes() {
        return Vec::new();
    }

    let namespace = config.deploy.namespace();
    let prefix = to_k8s_name(namespace.unwrap_or("app"));
    let gateway_name = format!("{}-gateway", prefix);
    let domain = ingress.domain_or_default();
    let gateway_class = ingress
        .gateway_class
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_GATEWAY_CLASS);

    let mut listeners = Vec::with_capacity(2);
    if ingress.tls {
        let tls = GatewayTls {
            mode: "Terminate".to_string(),
            certificate_refs: vec![CertificateRef {
                kind: "Secret".to_string(),
                name: format!("{}-tls-secret", prefix),
            }],
        };
        listeners.push(listener("https", "HTTPS", 443, domain, Some(tls)));
    }
    listeners.push(listener("http", "HTTP", 80, domain, None));

    let mut gateway_meta = ObjectMeta::new(&gateway_name, namespace, managed_by_labels());
    gateway_meta.annotations = routing_annotations(ingress);
    let gateway = K8sManifest::new(GATEWAY_API_VERSION, "Gateway", gateway_meta).with_spec(GatewaySpec {
        gateway_class_name: gateway_class.to_string(),
        listeners,
    });

    let rules = ingress
        .routes
        .iter()
        .map(|route| HttpRouteRule {
            matches: vec![HttpRouteMatch {
                path: HttpPathMatch {
                    type_: "PathPrefix".to_string(),
                    value: route.path.clone(),
                },
            }],
            backend_refs: vec![BackendRef {
                name: to_k8s_name(&route.service_name),
                port: route.port,
            }],
        })
        .collect();

    let route = K8sManifest::new(
        GATEWAY_API_VERSION,
        "HTTPRoute",
        ObjectMeta::new(format!("{}-httproute", prefix), namespace, managed_by_labels()),
    )
    .with_spec(HttpRouteSpec {
        parent_refs: vec![LocalObjectReference { name: gateway_name }],
        hostnames: vec![domain.to_string()],
        rules,
    });

    vec![
        GeneratedManifest::new(
            "gateway.yaml",
            gateway,
            "_gateway",
            "Gateway for external traffic routing",
        ),
        GeneratedManifest::new(
            "httproute.yaml",
            route,
            "_gateway",
            "HTTPRoute for path-based routing",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngressMode, IngressRoute};
    use crate::generator::test_support::config_for;
    use crate::generator::types::ManifestSpec;

    fn gateway_config() -> Configuration {
        let mut config = config_for(&["web"]);
        config.ingress.enabled = true;
        config.ingress.mode = IngressMode::GatewayApi;
        config.ingress.routes = vec![IngressRoute {
            service_name: "web".into(),
            path: "/".into(),
            port: 8080,
        }];
        config
    }

    #[test]
    fn test_http_only_gateway() {
        let manifests = generate_gateway_api(&gateway_config());
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].filename, "gateway.yaml");
        assert_eq!(manifests[0].manifest.name(), "default-gateway");
        assert_eq!(manifests[0].manifest.api_version, "gateway.networking.k8s.io/v1");

        let Some(ManifestSpec::Gateway(spec)) = &manifests[0].manifest.spec else {
            panic!("expected a Gateway spec");
        };
        assert_eq!(spec.gateway_class_name, "istio");
        assert_eq!(spec.listeners.len(), 1);
        assert_eq!(spec.listeners[0].name, "http");
        assert_eq!(spec.listeners[0].hostname, "app.example.com");
        assert!(spec.listeners[0].tls.is_none());
    }

    #[test]
    fn test_tls_listeners() {
        let mut config = gateway_config();
        config.ingress.tls = true;
        config.ingress.cert_manager = true;
        config.ingress.gateway_class = Some("cilium".into());
        config.deploy.namespace = "Shop_Prod".into();

        let manifests = generate_gateway_api(&config);
        assert_eq!(manifests[0].manifest.name(), "shop-prod-gateway");
        assert!(!manifests[0].manifest.metadata.annotations.is_empty());
        let Some(ManifestSpec::Gateway(spec)) = &manifests[0].manifest.spec else {
            panic!("expected a Gateway spec");
        };
        assert_eq!(spec.gateway_class_name, "cilium");
        let names: Vec<&str> = spec.listeners.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["https", "http"]);
        let tls = spec.listeners[0].tls.as_ref().unwrap();
        assert_eq!(tls.mode, "Terminate");
        assert_eq!(tls.certificate_refs[0].name, "shop-prod-tls-secret");
    }

    #[test]
    fn test_http_route() {
        let mut config = gateway_config();
        config.deploy.namespace = String::new();
        let manifests = generate_gateway_api(&config);

        let route = &manifests[1];
        assert_eq!(route.filename, "httproute.yaml");
        assert_eq!(route.service_name, "_gateway");
        assert_eq!(route.manifest.name(), "app-httproute");
        assert_eq!(route.manifest.metadata.namespace, None);
        let Some(ManifestSpec::HttpRoute(spec)) = &route.manifest.spec else {
            panic!("expected an HTTPRoute spec");
        };
        assert_eq!(spec.parent_refs[0].name, "app-gateway");
        assert_eq!(spec.hostnames, vec!["app.example.com"]);
        assert_eq!(spec.rules[0].matches[0].path.type_, "PathPrefix");
        assert_eq!(spec.rules[0].backend_refs[0].port, 8080);
    }

    #[test]
    fn test_no_routes() {
        let mut config = gateway_config();
        config.ingress.routes.clear();
        assert!(generate_gateway_api(&config).is_empty());
    }
}
