//! Docker Compose parsing.
//!
//! Reads a compose document, interpolates variables, validates the supported
//! schema subset and normalizes every service into [`ComposeService`].

pub mod interpolate;
pub mod normalize;
pub mod schema;
pub mod types;

pub use interpolate::{EnvMap, interpolate_str, interpolate_value, parse_env_file};
pub use types::*;

use crate::error::{ConversionError, Result};
use log::{debug, warn};
use normalize::*;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Compose file names probed by [`detect_compose_file`], in priority order.
pub const COMPOSE_FILE_NAMES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yml",
    "docker-compose.yaml",
];

/// Options for [`parse_compose_file`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Path to the compose file.
    pub file: PathBuf,
    /// Explicit env file; defaults to `.env` next to the project when present.
    pub env_file: Option<PathBuf>,
    /// Project directory; defaults to the compose file's directory.
    pub working_dir: Option<PathBuf>,
}

/// Everything parsing needs besides the document itself.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Directory that `env_file` paths resolve against and must stay inside.
    pub base_dir: PathBuf,
    /// Interpolation environment.
    pub env: EnvMap,
}

/// Find the compose file in `dir`, if any.
pub fn detect_compose_file(dir: &Path) -> Option<PathBuf> {
    COMPOSE_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Parse a compose file from disk.
///
/// The interpolation environment is the process environment overlaid with
/// the explicit env file, or the project's `.env` when none is given.
pub fn parse_compose_file(options: &ParseOptions) -> Result<ParseResult> {
    let content = fs::read_to_string(&options.file).map_err(|source| ConversionError::Io {
        path: options.file.clone(),
        source,
    })?;

    let base_dir = match &options.working_dir {
        Some(dir) => absolute(dir),
        None => absolute(&options.file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let mut env: EnvMap = std::env::vars().collect();
    let env_path = options
        .env_file
        .clone()
        .or_else(|| Some(base_dir.join(".env")).filter(|p| p.is_file()));
    if let Some(path) = env_path {
        if path.is_file() {
            let env_content = fs::read_to_string(&path).map_err(|source| ConversionError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("loading interpolation variables from {}", path.display());
            env.extend(parse_env_file(&env_content));
        }
    }

    let ctx = ParseContext { base_dir, env };
    let mut result = parse_compose_str(&content, &options.file.display().to_string(), &ctx)?;
    result.source_file = options.file.clone();
    Ok(result)
}

/// Parse compose YAML text. `source_name` is only used in error messages.
pub fn parse_compose_str(content: &str, source_name: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let raw: Value = serde_yaml::from_str(content).map_err(|e| ConversionError::Yaml {
        path: source_name.to_string(),
        message: e.to_string(),
    })?;

    if !raw.is_mapping() {
        return Err(ConversionError::NotAnObject {
            path: source_name.to_string(),
        });
    }

    let doc = interpolate_value(raw, &ctx.env);

    let issues = schema::validate_compose(&doc);
    if !issues.is_empty() {
        return Err(ConversionError::Schema {
            path: source_name.to_string(),
            issues,
        });
    }

    let mut warnings = Vec::new();
    let top_level_volumes: HashSet<String> = doc
        .get("volumes")
        .and_then(Value::as_mapping)
        .map(|m| m.keys().map(scalar_to_string).collect())
        .unwrap_or_default();

    let mut project = ComposeProject {
        version: doc.get("version").map(scalar_to_string),
        volumes: top_level_resources(doc.get("volumes")),
        networks: top_level_resources(doc.get("networks")),
        ..Default::default()
    };

    if let Some(services) = doc.get("services").and_then(Value::as_mapping) {
        for (name, raw_service) in services {
            let name = scalar_to_string(name);
            let service = normalize_service(&name, raw_service, &top_level_volumes, ctx, &mut warnings)?;
            project.services.insert(name, service);
        }
    }

    debug!(
        "parsed {} services from {} ({} warnings)",
        project.services.len(),
        source_name,
        warnings.len()
    );

    Ok(ParseResult {
        project,
        warnings,
        source_file: PathBuf::from(source_name),
    })
}

fn normalize_service(
    name: &str,
    raw: &Value,
    top_level_volumes: &HashSet<String>,
    ctx: &ParseContext,
    warnings: &mut Vec<String>,
) -> Result<ComposeService> {
    let field = |key: &str| raw.get(key).filter(|v| !v.is_null());
    let text = |key: &str| field(key).map(scalar_to_string);

    let env_files = field("env_file").map(env_file_paths).unwrap_or_default();
    let mut environment = load_env_files(name, &env_files, &ctx.base_dir, warnings);
    if let Some(env) = field("environment") {
        environment.extend(normalize_environment(env));
    }

    let string_list = |key: &str| -> Vec<String> {
        field(key)
            .and_then(Value::as_sequence)
            .map(|items| items.iter().map(scalar_to_string).collect())
            .unwrap_or_default()
    };

    Ok(ComposeService {
        image: text("image"),
        build: field("build").and_then(normalize_build),
        command: field("command").and_then(normalize_command),
        entrypoint: field("entrypoint").and_then(normalize_command),
        environment,
        env_file: env_files,
        ports: field("ports").map(normalize_ports).transpose()?.unwrap_or_default(),
        volumes: field("volumes")
            .map(|v| normalize_volume_mounts(v, top_level_volumes))
            .unwrap_or_default(),
        depends_on: field("depends_on").map(normalize_depends_on).unwrap_or_default(),
        labels: field("labels").map(normalize_labels).unwrap_or_default(),
        networks: field("networks").and_then(|v| normalize_networks(name, v, warnings)),
        restart: text("restart"),
        healthcheck: field("healthcheck").and_then(normalize_healthcheck),
        deploy: field("deploy").and_then(normalize_deploy),
        working_dir: text("working_dir"),
        user: text("user"),
        privileged: field("privileged").and_then(Value::as_bool),
        cap_add: string_list("cap_add"),
        cap_drop: string_list("cap_drop"),
    })
}

/// Load `env_file` entries in order; later files override earlier ones.
fn load_env_files(
    service: &str,
    paths: &[String],
    base_dir: &Path,
    warnings: &mut Vec<String>,
) -> indexmap::IndexMap<String, String> {
    let mut env = indexmap::IndexMap::new();

    for rel in paths {
        let Some(full) = resolve_within(base_dir, rel) else {
            let msg = format!(
                "env_file path escapes compose directory for service \"{}\": {} (skipped)",
                service, rel
            );
            warn!("{}", msg);
            warnings.push(msg);
            continue;
        };

        match fs::read_to_string(&full) {
            Ok(content) => env.extend(parse_env_file(&content)),
            Err(_) => {
                let msg = format!("env_file not found for service \"{}\": {}", service, rel);
                warn!("{}", msg);
                warnings.push(msg);
            }
        }
    }

    env
}

fn top_level_resources(section: Option<&Value>) -> indexmap::IndexMap<String, TopLevelResource> {
    let Some(map) = section.and_then(Value::as_mapping) else {
        return indexmap::IndexMap::new();
    };
    map.iter()
        .map(|(name, config)| {
            let resource = TopLevelResource {
                driver: config.get("driver").and_then(Value::as_str).map(str::to_string),
                external: config.get("external").and_then(Value::as_bool).unwrap_or(false),
                name: config.get("name").and_then(Value::as_str).map(str::to_string),
            };
            (scalar_to_string(name), resource)
        })
        .collect()
}

// ============================================================================
// Path helpers
// ============================================================================

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Lexically normalize a path, resolving `.` and `..` without touching the
/// filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `relative` against `base_dir`, returning `None` when the result
/// would land outside `base_dir`.
pub fn resolve_within(base_dir: &Path, relative: &str) -> Option<PathBuf> {
    let base = normalize_lexically(&absolute(base_dir));
    let full = normalize_lexically(&base.join(relative));
    full.starts_with(&base).then_some(full)
}
