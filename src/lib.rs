//! # compose2k8s
//!
//! Converts a Docker Compose project into Kubernetes manifests.
//!
//! The pipeline runs in four stages:
//!
//! - **Parsing**: interpolation, schema validation and normalization of the
//!   compose document ([`parser`])
//! - **Analysis**: service categories, workload kinds, volume strategies,
//!   sensitive variables and the start-order graph ([`analyzer`])
//! - **Configuration**: defaults derived from the analysis, optionally
//!   overlaid with a TOML file ([`config`])
//! - **Generation**: typed Kubernetes objects, README and migration scripts
//!   ([`generator`]), written by [`output`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use compose2k8s::{ConvertOptions, convert};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = convert(&ConvertOptions {
//!     file: Some(PathBuf::from("docker-compose.yml")),
//!     ..Default::default()
//! })?;
//! for warning in &report.warnings {
//!     eprintln!("{}", warning);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod generator;
pub mod output;
pub mod parser;

pub use analyzer::{AnalysisResult, analyze_project};
pub use config::Configuration;
pub use error::{ConversionError, Result};
pub use generator::{GenerateInput, GeneratorOutput, generate_manifests};

use config::{DefaultsOverrides, OutputFormat};
use log::{debug, info};
use parser::ParseOptions;
use std::path::{Path, PathBuf};

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Inputs of a full conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Compose file; detected in the current directory when unset.
    pub file: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub namespace: Option<String>,
    /// TOML pre-answer file.
    pub config_file: Option<PathBuf>,
}

/// What a conversion produced.
#[derive(Debug, Clone)]
pub struct ConvertReport {
    pub compose_file: PathBuf,
    pub output_dir: PathBuf,
    pub output: GeneratorOutput,
    pub written: Vec<PathBuf>,
    /// Warnings from every stage, in pipeline order.
    pub warnings: Vec<String>,
}

/// Parse, analyze, configure, generate and write in one go.
pub fn convert(options: &ConvertOptions) -> Result<ConvertReport> {
    let compose_file = match &options.file {
        Some(file) => file.clone(),
        None => parser::detect_compose_file(Path::new("."))
            .ok_or_else(|| ConversionError::NoComposeFile(PathBuf::from(".")))?,
    };
    info!("converting {}", compose_file.display());

    let parsed = parser::parse_compose_file(&ParseOptions {
        file: compose_file.clone(),
        env_file: options.env_file.clone(),
        working_dir: None,
    })?;
    let mut warnings = parsed.warnings.clone();

    let analysis = analyze_project(&parsed.project);
    warnings.extend(analysis.warnings.iter().cloned());

    let overrides = DefaultsOverrides {
        namespace: options.namespace.clone(),
        output_dir: options
            .output_dir
            .as_ref()
            .map(|dir| dir.display().to_string()),
        output_format: options.format,
    };
    let config = match &options.config_file {
        Some(path) => {
            let loaded = config::load_config_file(path, &analysis)?;
            warnings.extend(loaded.warnings);
            let mut config = loaded.config;
            overrides.apply(&mut config);
            config
        }
        None => config::default_configuration(&analysis, &overrides),
    };
    debug!("selected services: {:?}", config.selected_services);

    let working_dir = compose_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let output = generate_manifests(&GenerateInput {
        analysis: &analysis,
        config: &config,
        working_dir: &working_dir,
    });
    warnings.extend(output.warnings.iter().cloned());

    let output_dir = PathBuf::from(&config.deploy.output_dir);
    let written = output::write_output(&output, &output_dir, config.deploy.output_format)?;

    Ok(ConvertReport {
        compose_file,
        output_dir,
        output,
        written,
        warnings,
    })
}
