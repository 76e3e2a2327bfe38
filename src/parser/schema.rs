//! Structural validation of the supported Compose subset.
//!
//! The walker never stops at the first problem: every offending field path
//! is collected so the user can fix the file in one pass. Unknown keys are
//! allowed everywhere.

use crate::error::SchemaIssue;
use serde_yaml::{Mapping, Value};

const PORT_PROTOCOLS: &[&str] = &["tcp", "udp"];
const MOUNT_TYPES: &[&str] = &["bind", "volume", "tmpfs"];
const DEPENDS_ON_CONDITIONS: &[&str] = &[
    "service_started",
    "service_healthy",
    "service_completed_successfully",
];

/// Validate an interpolated compose document.
///
/// Returns every schema violation found; an empty list means the document
/// can be normalized.
pub fn validate_compose(root: &Value) -> Vec<SchemaIssue> {
    let mut v = Validator::default();

    let Some(root) = root.as_mapping() else {
        v.issue("", "expected mapping");
        return v.issues;
    };

    if let Some(version) = root.get("version") {
        v.scalar_string("version", version);
    }

    match root.get("services") {
        None => v.issue("services", "required"),
        Some(Value::Mapping(services)) => {
            for (name, service) in services {
                let path = format!("services.{}", key_name(name));
                v.service(&path, service);
            }
        }
        Some(_) => v.issue("services", "expected mapping"),
    }

    for section in ["volumes", "networks"] {
        if let Some(value) = root.get(section) {
            v.top_level_section(section, value);
        }
    }

    v.issues
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => "?".to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[derive(Default)]
struct Validator {
    issues: Vec<SchemaIssue>,
}

impl Validator {
    fn issue(&mut self, path: &str, message: impl Into<String>) {
        self.issues.push(SchemaIssue::new(path, message));
    }

    fn mismatch(&mut self, path: &str, expected: &str, got: &Value) {
        self.issue(path, format!("expected {}, received {}", expected, type_name(got)));
    }

    // ------------------------------------------------------------------------
    // Primitive checks
    // ------------------------------------------------------------------------

    fn string(&mut self, path: &str, value: &Value) {
        if !value.is_string() {
            self.mismatch(path, "string", value);
        }
    }

    /// A string, also accepting numbers (`version: 3.8`, `cpus: 0.5`).
    fn scalar_string(&mut self, path: &str, value: &Value) {
        if !value.is_string() && !value.is_number() {
            self.mismatch(path, "string", value);
        }
    }

    fn boolean(&mut self, path: &str, value: &Value) {
        if !value.is_bool() {
            self.mismatch(path, "boolean", value);
        }
    }

    fn unsigned(&mut self, path: &str, value: &Value) {
        if value.as_u64().is_none() {
            self.mismatch(path, "non-negative integer", value);
        }
    }

    fn string_list(&mut self, path: &str, value: &Value) {
        match value {
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.string(&format!("{}.{}", path, i), item);
                }
            }
            other => self.mismatch(path, "sequence of strings", other),
        }
    }

    fn string_or_list(&mut self, path: &str, value: &Value) {
        if !value.is_string() {
            match value {
                Value::Sequence(_) => self.string_list(path, value),
                other => self.mismatch(path, "string or sequence", other),
            }
        }
    }

    fn one_of(&mut self, path: &str, value: &Value, allowed: &[&str]) {
        match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => self.issue(
                path,
                format!("invalid value \"{}\", expected one of: {}", s, allowed.join(", ")),
            ),
            None => self.mismatch(path, "string", value),
        }
    }

    /// Check optional fields of a mapping with a per-field validator.
    fn field(&mut self, map: &Mapping, path: &str, key: &str, check: fn(&mut Self, &str, &Value)) {
        if let Some(value) = map.get(key) {
            check(self, &format!("{}.{}", path, key), value);
        }
    }

    // ------------------------------------------------------------------------
    // Service
    // ------------------------------------------------------------------------

    fn service(&mut self, path: &str, value: &Value) {
        let Some(svc) = value.as_mapping() else {
            self.mismatch(path, "mapping", value);
            return;
        };

        self.field(svc, path, "image", Self::string);
        self.field(svc, path, "build", Self::build);
        self.field(svc, path, "command", Self::string_or_list);
        self.field(svc, path, "entrypoint", Self::string_or_list);
        self.field(svc, path, "environment", Self::environment);
        self.field(svc, path, "env_file", Self::env_file);
        self.field(svc, path, "ports", Self::ports);
        self.field(svc, path, "volumes", Self::volumes);
        self.field(svc, path, "depends_on", Self::depends_on);
        self.field(svc, path, "labels", Self::labels);
        self.field(svc, path, "networks", Self::service_networks);
        self.field(svc, path, "restart", Self::string);
        self.field(svc, path, "healthcheck", Self::healthcheck);
        self.field(svc, path, "deploy", Self::deploy);
        self.field(svc, path, "working_dir", Self::string);
        self.field(svc, path, "user", Self::scalar_string);
        self.field(svc, path, "privileged", Self::boolean);
        self.field(svc, path, "cap_add", Self::string_list);
        self.field(svc, path, "cap_drop", Self::string_list);
    }

    fn build(&mut self, path: &str, value: &Value) {
        match value {
            Value::String(_) => {}
            Value::Mapping(map) => {
                self.field(map, path, "context", Self::string);
                self.field(map, path, "dockerfile", Self::string);
            }
            other => self.mismatch(path, "string or mapping", other),
        }
    }

    fn environment(&mut self, path: &str, value: &Value) {
        match value {
            Value::Sequence(_) => self.string_list(path, value),
            Value::Mapping(map) => {
                for (k, v) in map {
                    if matches!(v, Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_)) {
                        self.mismatch(
                            &format!("{}.{}", path, key_name(k)),
                            "string, number, boolean or null",
                            v,
                        );
                    }
                }
            }
            other => self.mismatch(path, "sequence or mapping", other),
        }
    }

    fn env_file(&mut self, path: &str, value: &Value) {
        match value {
            Value::String(_) => {}
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    match item {
                        Value::String(_) => {}
                        Value::Mapping(map) => match map.get("path") {
                            Some(p) => self.string(&format!("{}.path", item_path), p),
                            None => self.issue(&format!("{}.path", item_path), "required"),
                        },
                        other => self.mismatch(&item_path, "string or mapping", other),
                    }
                }
            }
            other => self.mismatch(path, "string or sequence", other),
        }
    }

    fn ports(&mut self, path: &str, value: &Value) {
        let Value::Sequence(items) = value else {
            self.mismatch(path, "sequence", value);
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}.{}", path, i);
            match item {
                Value::String(_) | Value::Number(_) => {}
                Value::Mapping(map) => {
                    match map.get("target") {
                        Some(t) => self.unsigned(&format!("{}.target", item_path), t),
                        None => self.issue(&format!("{}.target", item_path), "required"),
                    }
                    self.field(map, &item_path, "published", Self::scalar_string);
                    if let Some(proto) = map.get("protocol") {
                        self.one_of(&format!("{}.protocol", item_path), proto, PORT_PROTOCOLS);
                    }
                }
                other => self.mismatch(&item_path, "string, integer or mapping", other),
            }
        }
    }

    fn volumes(&mut self, path: &str, value: &Value) {
        let Value::Sequence(items) = value else {
            self.mismatch(path, "sequence", value);
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}.{}", path, i);
            match item {
                Value::String(_) => {}
                Value::Mapping(map) => {
                    match map.get("target") {
                        Some(t) => self.string(&format!("{}.target", item_path), t),
                        None => self.issue(&format!("{}.target", item_path), "required"),
                    }
                    if let Some(kind) = map.get("type") {
                        self.one_of(&format!("{}.type", item_path), kind, MOUNT_TYPES);
                    }
                    self.field(map, &item_path, "source", Self::string);
                    self.field(map, &item_path, "read_only", Self::boolean);
                }
                other => self.mismatch(&item_path, "string or mapping", other),
            }
        }
    }

    fn depends_on(&mut self, path: &str, value: &Value) {
        match value {
            Value::Sequence(_) => self.string_list(path, value),
            Value::Mapping(map) => {
                for (name, entry) in map {
                    let entry_path = format!("{}.{}", path, key_name(name));
                    match entry {
                        Value::Null => {}
                        Value::Mapping(m) => {
                            if let Some(cond) = m.get("condition") {
                                self.one_of(
                                    &format!("{}.condition", entry_path),
                                    cond,
                                    DEPENDS_ON_CONDITIONS,
                                );
                            }
                        }
                        other => self.mismatch(&entry_path, "mapping", other),
                    }
                }
            }
            other => self.mismatch(path, "sequence or mapping", other),
        }
    }

    fn labels(&mut self, path: &str, value: &Value) {
        match value {
            Value::Sequence(_) => self.string_list(path, value),
            Value::Mapping(map) => {
                for (k, v) in map {
                    self.scalar_string(&format!("{}.{}", path, key_name(k)), v);
                }
            }
            other => self.mismatch(path, "sequence or mapping", other),
        }
    }

    fn service_networks(&mut self, path: &str, value: &Value) {
        match value {
            Value::Sequence(_) => self.string_list(path, value),
            Value::Mapping(_) => {}
            other => self.mismatch(path, "sequence or mapping", other),
        }
    }

    fn healthcheck(&mut self, path: &str, value: &Value) {
        let Some(hc) = value.as_mapping() else {
            self.mismatch(path, "mapping", value);
            return;
        };
        self.field(hc, path, "test", Self::string_or_list);
        self.field(hc, path, "interval", Self::string);
        self.field(hc, path, "timeout", Self::string);
        self.field(hc, path, "retries", Self::unsigned);
        self.field(hc, path, "start_period", Self::string);
        self.field(hc, path, "disable", Self::boolean);
    }

    fn deploy(&mut self, path: &str, value: &Value) {
        let Some(deploy) = value.as_mapping() else {
            self.mismatch(path, "mapping", value);
            return;
        };
        self.field(deploy, path, "replicas", Self::unsigned);
        self.field(deploy, path, "resources", Self::resources);
        self.field(deploy, path, "restart_policy", Self::restart_policy);
    }

    fn resources(&mut self, path: &str, value: &Value) {
        let Some(res) = value.as_mapping() else {
            self.mismatch(path, "mapping", value);
            return;
        };
        self.field(res, path, "limits", Self::resource_spec);
        self.field(res, path, "reservations", Self::resource_spec);
    }

    fn resource_spec(&mut self, path: &str, value: &Value) {
        let Some(spec) = value.as_mapping() else {
            self.mismatch(path, "mapping", value);
            return;
        };
        self.field(spec, path, "cpus", Self::scalar_string);
        self.field(spec, path, "memory", Self::string);
    }

    fn restart_policy(&mut self, path: &str, value: &Value) {
        let Some(policy) = value.as_mapping() else {
            self.mismatch(path, "mapping", value);
            return;
        };
        self.field(policy, path, "condition", Self::string);
    }

    // ------------------------------------------------------------------------
    // Top-level volumes / networks
    // ------------------------------------------------------------------------

    fn top_level_section(&mut self, section: &str, value: &Value) {
        let Some(entries) = value.as_mapping() else {
            self.mismatch(section, "mapping", value);
            return;
        };
        for (name, entry) in entries {
            let path = format!("{}.{}", section, key_name(name));
            match entry {
                Value::Null => {}
                Value::Mapping(map) => {
                    self.field(map, &path, "driver", Self::string);
                    self.field(map, &path, "external", Self::boolean);
                    self.field(map, &path, "name", Self::string);
                }
                other => self.mismatch(&path, "mapping or null", other),
            }
        }
    }
}
