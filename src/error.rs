//! Error types for the compose-to-Kubernetes conversion pipeline.
//!
//! Only hard failures live here. Recoverable problems (missing env files,
//! dangling dependencies, dependency cycles) are collected as warning strings
//! on the stage results instead.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single schema violation, addressed by its dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Dotted path to the offending field, e.g. `services.web.ports.0`.
    pub path: String,
    /// What was wrong with the value.
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  - {}: {}", self.path, self.message)
    }
}

/// Errors that abort a conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Reading an input file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing generated output failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compose document is not well-formed YAML
    #[error("Failed to parse YAML in {path}: {message}")]
    Yaml { path: String, message: String },

    /// The compose document parsed but is not a mapping
    #[error("Invalid compose file: {path} does not contain a valid YAML object")]
    NotAnObject { path: String },

    /// The compose document violates the supported schema
    #[error("Invalid compose file structure in {path}:\n{}", format_issues(.issues))]
    Schema {
        path: String,
        issues: Vec<SchemaIssue>,
    },

    /// A port number is not an integer or is outside 1-65535
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// A port protocol suffix other than tcp/udp
    #[error("Invalid port protocol: \"{0}\" (must be tcp or udp)")]
    InvalidPortProtocol(String),

    /// A three-segment port mapping whose first segment is not an address
    #[error("Invalid port mapping: \"{0}\" - 3-segment format requires IP:published:target")]
    InvalidPortMapping(String),

    /// No compose file was given and none was found
    #[error("No compose file found in {}", .0.display())]
    NoComposeFile(PathBuf),

    /// A configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A manifest could not be rendered to YAML
    #[error("Failed to render manifest: {0}")]
    Render(String),
}

fn format_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConversionError>;
