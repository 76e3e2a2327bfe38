//! Canonicalization of Compose field shapes.
//!
//! Each function takes a value that already passed schema validation and
//! returns its single canonical form. Shapes the schema rejects are treated
//! as absent rather than panicking.

use crate::error::{ConversionError, Result};
use crate::parser::types::*;
use indexmap::IndexMap;
use log::{trace, warn};
use regex::Regex;
use serde_yaml::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

static IPV4_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").unwrap());

/// Render a YAML scalar as a string. `null` becomes empty.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(t) => scalar_to_string(&t.value),
        Value::Sequence(_) | Value::Mapping(_) => String::new(),
    }
}

fn string_items(value: &Value) -> impl Iterator<Item = &str> {
    value
        .as_sequence()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Split `KEY=VALUE`; a bare `KEY` maps to the empty string.
fn split_assignment(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((k, v)) => (k.to_string(), v.to_string()),
        None => (entry.to_string(), String::new()),
    }
}

// ============================================================================
// Environment and labels
// ============================================================================

/// Normalize `environment` from a `KEY=VAL` list or a mapping.
pub fn normalize_environment(value: &Value) -> IndexMap<String, String> {
    normalize_key_values(value)
}

/// Normalize `labels` from a `key=value` list or a mapping.
pub fn normalize_labels(value: &Value) -> IndexMap<String, String> {
    normalize_key_values(value)
}

fn normalize_key_values(value: &Value) -> IndexMap<String, String> {
    match value {
        Value::Sequence(_) => string_items(value).map(split_assignment).collect(),
        Value::Mapping(map) => map
            .iter()
            .map(|(k, v)| (scalar_to_string(k), scalar_to_string(v)))
            .collect(),
        _ => IndexMap::new(),
    }
}

// ============================================================================
// Ports
// ============================================================================

fn validate_port(raw: &str) -> Result<u16> {
    let raw = raw.trim();
    let value: i64 = raw
        .parse()
        .map_err(|_| ConversionError::InvalidPort(format!("\"{}\" is not a valid integer", raw)))?;
    if !(1..=65535).contains(&value) {
        return Err(ConversionError::InvalidPort(format!(
            "{} is out of range (must be 1-65535)",
            value
        )));
    }
    Ok(value as u16)
}

/// Parse a port string such as `80`, `8080:80`, `8080:80/udp` or
/// `127.0.0.1:8080:80`.
pub fn parse_port_string(raw: &str) -> Result<ComposePort> {
    let (port_part, protocol) = match raw.split_once('/') {
        Some((port, proto)) => {
            let protocol = PortProtocol::parse(proto)
                .ok_or_else(|| ConversionError::InvalidPortProtocol(proto.to_string()))?;
            (port, protocol)
        }
        None => (raw, PortProtocol::Tcp),
    };

    // "[::1]:8080:80"
    if let Some(rest) = port_part.strip_prefix('[') {
        let (_, mapping) = rest
            .split_once("]:")
            .ok_or_else(|| ConversionError::InvalidPortMapping(raw.to_string()))?;
        let (published, target) = mapping
            .split_once(':')
            .ok_or_else(|| ConversionError::InvalidPortMapping(raw.to_string()))?;
        return Ok(ComposePort {
            target: validate_port(target)?,
            published: Some(validate_port(published)?),
            protocol,
        });
    }

    let segments: Vec<&str> = port_part.split(':').collect();
    let port = match segments.as_slice() {
        [target] => ComposePort {
            target: validate_port(target)?,
            published: None,
            protocol,
        },
        [published, target] => ComposePort {
            target: validate_port(target)?,
            published: Some(validate_port(published)?),
            protocol,
        },
        [ip, published, target] => {
            if !IPV4_REGEX.is_match(ip) {
                return Err(ConversionError::InvalidPortMapping(raw.to_string()));
            }
            ComposePort {
                target: validate_port(target)?,
                published: Some(validate_port(published)?),
                protocol,
            }
        }
        _ => return Err(ConversionError::InvalidPortMapping(raw.to_string())),
    };
    Ok(port)
}

/// Normalize `ports` from integers, strings and long-form mappings.
pub fn normalize_ports(value: &Value) -> Result<Vec<ComposePort>> {
    let Some(items) = value.as_sequence() else {
        return Ok(Vec::new());
    };

    let mut ports = Vec::with_capacity(items.len());
    for item in items {
        let port = match item {
            Value::Number(n) => ComposePort::new(validate_port(&n.to_string())?),
            Value::String(s) => parse_port_string(s)?,
            Value::Mapping(map) => {
                let target = map
                    .get("target")
                    .map(scalar_to_string)
                    .unwrap_or_default();
                let published = match map.get("published") {
                    Some(p) if !p.is_null() => Some(validate_port(&scalar_to_string(p))?),
                    _ => None,
                };
                let protocol = match map.get("protocol").and_then(Value::as_str) {
                    Some(proto) => PortProtocol::parse(proto)
                        .ok_or_else(|| ConversionError::InvalidPortProtocol(proto.to_string()))?,
                    None => PortProtocol::Tcp,
                };
                ComposePort {
                    target: validate_port(&target)?,
                    published,
                    protocol,
                }
            }
            _ => continue,
        };
        ports.push(port);
    }
    Ok(ports)
}

// ============================================================================
// Volumes
// ============================================================================

fn parse_volume_string(raw: &str, top_level_volumes: &HashSet<String>) -> ComposeVolumeMount {
    let parts: Vec<&str> = raw.split(':').collect();

    let [source, target, rest @ ..] = parts.as_slice() else {
        // A lone path is an anonymous volume.
        return ComposeVolumeMount {
            source: String::new(),
            target: raw.to_string(),
            read_only: false,
            mount_type: MountType::Volume,
        };
    };

    let mount_type = if top_level_volumes.contains(*source) {
        MountType::Volume
    } else if source.starts_with('.') || source.starts_with('/') || source.starts_with('~') {
        MountType::Bind
    } else {
        // Named volume that was not declared at the top level.
        MountType::Volume
    };

    ComposeVolumeMount {
        source: source.to_string(),
        target: target.to_string(),
        read_only: rest.first().is_some_and(|mode| mode.split(',').any(|m| m == "ro")),
        mount_type,
    }
}

/// Normalize service `volumes`, using the declared top-level volume names to
/// tell named volumes from bind mounts.
pub fn normalize_volume_mounts(
    value: &Value,
    top_level_volumes: &HashSet<String>,
) -> Vec<ComposeVolumeMount> {
    let Some(items) = value.as_sequence() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(parse_volume_string(s, top_level_volumes)),
            Value::Mapping(map) => {
                let target = map.get("target").and_then(Value::as_str)?;
                Some(ComposeVolumeMount {
                    source: map
                        .get("source")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    target: target.to_string(),
                    read_only: map
                        .get("read_only")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    mount_type: map
                        .get("type")
                        .and_then(Value::as_str)
                        .and_then(MountType::parse)
                        .unwrap_or(MountType::Volume),
                })
            }
            _ => None,
        })
        .collect()
}

// ============================================================================
// depends_on and networks
// ============================================================================

/// Normalize `depends_on`; list entries get the `service_started` condition.
pub fn normalize_depends_on(value: &Value) -> IndexMap<String, DependsOnCondition> {
    match value {
        Value::Sequence(_) => string_items(value)
            .map(|name| (name.to_string(), DependsOnCondition::ServiceStarted))
            .collect(),
        Value::Mapping(map) => map
            .iter()
            .map(|(name, entry)| {
                let condition = entry
                    .get("condition")
                    .and_then(Value::as_str)
                    .and_then(DependsOnCondition::parse)
                    .unwrap_or_default();
                (scalar_to_string(name), condition)
            })
            .collect(),
        _ => IndexMap::new(),
    }
}

/// Normalize service `networks` to a list of names.
///
/// Per-network settings (aliases, static addresses) cannot be expressed in
/// Kubernetes; each non-empty one produces a warning and is dropped.
pub fn normalize_networks(
    service_name: &str,
    value: &Value,
    warnings: &mut Vec<String>,
) -> Option<Vec<String>> {
    match value {
        Value::Sequence(_) => Some(string_items(value).map(str::to_string).collect()),
        Value::Mapping(map) => {
            let mut names = Vec::with_capacity(map.len());
            for (net, config) in map {
                let net = scalar_to_string(net);
                let has_config = match config {
                    Value::Mapping(m) => !m.is_empty(),
                    Value::Null => false,
                    _ => true,
                };
                if has_config {
                    let msg = format!(
                        "Network configuration for \"{}\" on network \"{}\" is not supported and will be ignored",
                        service_name, net
                    );
                    warn!("{}", msg);
                    warnings.push(msg);
                }
                names.push(net);
            }
            Some(names)
        }
        _ => None,
    }
}

// ============================================================================
// Remaining service fields
// ============================================================================

pub fn normalize_command(value: &Value) -> Option<CommandLine> {
    match value {
        Value::String(s) => Some(CommandLine::Shell(s.clone())),
        Value::Sequence(_) => Some(CommandLine::Exec(
            string_items(value).map(str::to_string).collect(),
        )),
        _ => None,
    }
}

pub fn normalize_build(value: &Value) -> Option<ComposeBuild> {
    match value {
        Value::String(s) => Some(ComposeBuild::Context(s.clone())),
        Value::Mapping(map) => Some(ComposeBuild::Extended {
            context: map.get("context").and_then(Value::as_str).map(str::to_string),
            dockerfile: map
                .get("dockerfile")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        _ => None,
    }
}

/// Normalize `healthcheck`; a string test becomes `["CMD-SHELL", test]`.
pub fn normalize_healthcheck(value: &Value) -> Option<ComposeHealthcheck> {
    let map = value.as_mapping()?;
    let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    let test = match map.get("test") {
        Some(Value::String(s)) => vec!["CMD-SHELL".to_string(), s.clone()],
        Some(seq @ Value::Sequence(_)) => string_items(seq).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    Some(ComposeHealthcheck {
        test,
        interval: text("interval"),
        timeout: text("timeout"),
        retries: map
            .get("retries")
            .and_then(Value::as_u64)
            .and_then(|r| u32::try_from(r).ok()),
        start_period: text("start_period"),
        disable: map.get("disable").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn normalize_resource_spec(value: Option<&Value>) -> Option<ResourceSpec> {
    let map = value?.as_mapping()?;
    let spec = ResourceSpec {
        cpus: map.get("cpus").map(scalar_to_string),
        memory: map.get("memory").map(scalar_to_string),
    };
    Some(spec)
}

pub fn normalize_deploy(value: &Value) -> Option<ComposeDeploy> {
    let map = value.as_mapping()?;

    let resources = map.get("resources").and_then(Value::as_mapping).map(|res| {
        ComposeDeployResources {
            limits: normalize_resource_spec(res.get("limits")),
            reservations: normalize_resource_spec(res.get("reservations")),
        }
    });

    let deploy = ComposeDeploy {
        replicas: map
            .get("replicas")
            .and_then(Value::as_u64)
            .and_then(|r| u32::try_from(r).ok()),
        resources,
        restart_condition: map
            .get("restart_policy")
            .and_then(|p| p.get("condition"))
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    trace!("normalized deploy block: {:?}", deploy);
    Some(deploy)
}

/// Collect `env_file` paths from a string, a list of strings or a list of
/// `{path: ...}` entries.
pub fn env_file_paths(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Mapping(m) => m.get("path").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_port_string_forms() {
        assert_eq!(parse_port_string("80").unwrap(), ComposePort::new(80));
        let mapped = parse_port_string("8080:80/udp").unwrap();
        assert_eq!(mapped.target, 80);
        assert_eq!(mapped.published, Some(8080));
        assert_eq!(mapped.protocol, PortProtocol::Udp);
        let bound = parse_port_string("127.0.0.1:5433:5432").unwrap();
        assert_eq!((bound.published, bound.target), (Some(5433), 5432));
        let v6 = parse_port_string("[::1]:8080:80").unwrap();
        assert_eq!((v6.published, v6.target), (Some(8080), 80));
    }

    #[test]
    fn test_port_errors() {
        assert!(matches!(
            parse_port_string("80/sctp"),
            Err(ConversionError::InvalidPortProtocol(p)) if p == "sctp"
        ));
        assert!(matches!(
            parse_port_string("host:8080:80"),
            Err(ConversionError::InvalidPortMapping(_))
        ));
        assert!(matches!(parse_port_string("0"), Err(ConversionError::InvalidPort(_))));
        assert!(matches!(parse_port_string("70000"), Err(ConversionError::InvalidPort(_))));
        assert!(matches!(parse_port_string("http"), Err(ConversionError::InvalidPort(_))));
    }

    #[test]
    fn test_normalize_ports_mixed() {
        let ports = normalize_ports(&yaml(
            "[3000, \"8080:80\", {target: 53, published: \"5353\", protocol: udp}]",
        ))
        .unwrap();
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0], ComposePort::new(3000));
        assert_eq!(ports[2].published, Some(5353));
        assert_eq!(ports[2].protocol, PortProtocol::Udp);
    }

    #[test]
    fn test_volume_type_disambiguation() {
        let declared: HashSet<String> = ["pgdata".to_string()].into_iter().collect();
        let mounts = normalize_volume_mounts(
            &yaml("[\"pgdata:/var/lib/postgresql/data\", \"./conf:/etc/conf:ro\", \"~/x:/x\", \"cache:/cache\", \"/anon\"]"),
            &declared,
        );
        assert_eq!(mounts[0].mount_type, MountType::Volume);
        assert_eq!(mounts[1].mount_type, MountType::Bind);
        assert!(mounts[1].read_only);
        assert_eq!(mounts[2].mount_type, MountType::Bind);
        assert_eq!(mounts[3].mount_type, MountType::Volume);
        assert!(mounts[4].is_anonymous());
        assert_eq!(mounts[4].target, "/anon");
    }

    #[test]
    fn test_volume_object_form_defaults() {
        let mounts = normalize_volume_mounts(
            &yaml("[{target: /scratch, type: tmpfs}, {target: /data}]"),
            &HashSet::new(),
        );
        assert_eq!(mounts[0].mount_type, MountType::Tmpfs);
        assert!(mounts[1].is_anonymous());
    }

    #[test]
    fn test_environment_shapes() {
        let from_list = normalize_environment(&yaml("[\"A=1\", \"B\", \"C=x=y\"]"));
        assert_eq!(from_list["A"], "1");
        assert_eq!(from_list["B"], "");
        assert_eq!(from_list["C"], "x=y");

        let from_map = normalize_environment(&yaml("{PORT: 8080, DEBUG: false, EMPTY: null}"));
        assert_eq!(from_map["PORT"], "8080");
        assert_eq!(from_map["DEBUG"], "false");
        assert_eq!(from_map["EMPTY"], "");
    }

    #[test]
    fn test_depends_on_shapes() {
        let list = normalize_depends_on(&yaml("[db, cache]"));
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["db", "cache"]);
        assert_eq!(list["db"], DependsOnCondition::ServiceStarted);

        let map = normalize_depends_on(&yaml("{db: {condition: service_healthy}, cache: {}}"));
        assert_eq!(map["db"], DependsOnCondition::ServiceHealthy);
        assert_eq!(map["cache"], DependsOnCondition::ServiceStarted);
    }

    #[test]
    fn test_networks_warn_on_inline_config() {
        let mut warnings = Vec::new();
        let nets = normalize_networks(
            "web",
            &yaml("{front: {aliases: [site]}, back: null}"),
            &mut warnings,
        );
        assert_eq!(nets, Some(vec!["front".to_string(), "back".to_string()]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("\"web\" on network \"front\""));
    }

    #[test]
    fn test_healthcheck_string_test() {
        let hc = normalize_healthcheck(&yaml("{test: \"pg_isready\", interval: 10s, retries: 5}")).unwrap();
        assert_eq!(hc.test, vec!["CMD-SHELL", "pg_isready"]);
        assert_eq!(hc.interval.as_deref(), Some("10s"));
        assert_eq!(hc.retries, Some(5));
        assert!(!hc.is_disabled());

        let none = normalize_healthcheck(&yaml("{test: [NONE]}")).unwrap();
        assert!(none.is_disabled());
    }

    #[test]
    fn test_deploy_numeric_cpus() {
        let deploy = normalize_deploy(&yaml(
            "{replicas: 3, resources: {limits: {cpus: 0.5, memory: 512M}}}",
        ))
        .unwrap();
        assert_eq!(deploy.replicas, Some(3));
        let limits = deploy.resources.unwrap().limits.unwrap();
        assert_eq!(limits.cpus.as_deref(), Some("0.5"));
        assert_eq!(limits.memory.as_deref(), Some("512M"));
    }
}
