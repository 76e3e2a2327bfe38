//! Cluster Services.

use super::init_container::native_default_port;
use super::types::{GeneratedManifest, K8sManifest, ObjectMeta, ServicePort, ServiceSpec};
use crate::analyzer::AnalyzedPort;
use crate::analyzer::AnalyzedService;
use crate::common::{selector_labels, standard_labels, to_k8s_name};
use crate::config::{Configuration, ExposureType};
use crate::parser::PortProtocol;
use log::debug;

/// Service ports named `<proto>-<port>`; the protocol is only spelled out
/// when it is not TCP.
pub fn service_ports(ports: &[AnalyzedPort], node_port: Option<u16>) -> Vec<ServicePort> {
    ports
        .iter()
        .map(|p| ServicePort {
            port: p.container_port,
            protocol: (p.protocol != PortProtocol::Tcp).then(|| p.protocol.as_k8s().to_string()),
            name: format!("{}-{}", p.protocol.as_str(), p.container_port),
            node_port,
        })
        .collect()
}

/// Ports a Service should expose: the declared ones, else the listen port
/// of a known image family so dependents can still reach it by name.
pub fn exposed_ports(analyzed: &AnalyzedService) -> Vec<AnalyzedPort> {
    if !analyzed.ports.is_empty() {
        return analyzed.ports.clone();
    }
    native_default_port(analyzed)
        .map(|port| {
            debug!("{} declares no ports, exposing {}", analyzed.name, port);
            vec![AnalyzedPort {
                container_port: port,
                protocol: PortProtocol::Tcp,
                published_port: None,
            }]
        })
        .unwrap_or_default()
}

/// Service for a compose service's ports. Services with nothing to expose
/// get none.
pub fn generate_service(
    service_name: &str,
    analyzed: &AnalyzedService,
    config: &Configuration,
) -> Option<GeneratedManifest> {
    let ports = exposed_ports(analyzed);
    if ports.is_empty() {
        return None;
    }

    let k8s_name = to_k8s_name(service_name);
    let exposure = config.service_exposures.get(service_name);
    let exposure_type = exposure.map(|e| e.exposure_type).unwrap_or_default();
    let node_port = exposure
        .filter(|e| e.exposure_type == ExposureType::NodePort)
        .and_then(|e| e.node_port);

    let spec = ServiceSpec {
        type_: exposure_type.service_type().map(str::to_string),
        cluster_ip: None,
        selector: selector_labels(service_name),
        ports: service_ports(&ports, node_port),
    };

    let manifest = K8sManifest::new(
        "v1",
        "Service",
        ObjectMeta::new(&k8s_name, config.deploy.namespace(), standard_labels(service_name)),
    )
    .with_spec(spec);

    Some(GeneratedManifest::new(
        format!("{}-service.yaml", k8s_name),
        manifest,
        service_name,
        format!("Service for {}", service_name),
    ))
}
