//! Rendering and writing generated manifests.
//!
//! Manifests serialize through serde, so the field order of
//! [`K8sManifest`](crate::generator::K8sManifest) fixes the key order of every
//! document: `apiVersion`, `kind`, `metadata`, `type`, `spec`, `data`,
//! `stringData`.

use crate::config::OutputFormat;
use crate::error::{ConversionError, Result};
use crate::generator::readme::SINGLE_FILE_NAME;
use crate::generator::{GeneratedManifest, GeneratorOutput, K8sManifest};
use log::{debug, info};
use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const README_FILE_NAME: &str = "README.md";

/// Render a single manifest as a YAML document.
pub fn manifest_to_yaml(manifest: &K8sManifest) -> Result<String> {
    serde_yaml::to_string(manifest).map_err(|e| ConversionError::Render(e.to_string()))
}

/// Render manifests as one `---` separated stream.
pub fn manifests_to_multi_doc(manifests: &[GeneratedManifest]) -> Result<String> {
    let docs = manifests
        .iter()
        .map(|m| manifest_to_yaml(&m.manifest))
        .collect::<Result<Vec<_>>>()?;
    Ok(docs.join("---\n"))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|source| ConversionError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|source| {
        ConversionError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Write a generator result into `output_dir`, creating it if needed.
///
/// Plain mode writes one file per manifest; single-file mode writes every
/// manifest into `all-resources.yaml`. Both write the README and the
/// migration scripts. Returns the written paths in order.
pub fn write_output(output: &GeneratorOutput, output_dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).map_err(|source| ConversionError::Write {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    match format {
        OutputFormat::Plain => {
            for m in &output.manifests {
                let path = output_dir.join(&m.filename);
                write_file(&path, &manifest_to_yaml(&m.manifest)?)?;
                written.push(path);
            }
        }
        OutputFormat::SingleFile => {
            let path = output_dir.join(SINGLE_FILE_NAME);
            write_file(&path, &manifests_to_multi_doc(&output.manifests)?)?;
            written.push(path);
        }
    }

    let readme = output_dir.join(README_FILE_NAME);
    write_file(&readme, &output.readme)?;
    written.push(readme);

    for script in &output.migration_scripts {
        let path = output_dir.join(&script.filename);
        write_file(&path, &script.content)?;
        make_executable(&path)?;
        written.push(path);
    }

    info!("wrote {} files to {}", written.len(), output_dir.display());
    Ok(written)
}

// ============================================================================
// Validation of written manifests
// ============================================================================

/// A document that is not a usable Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub file: PathBuf,
    /// Zero-based index of the document within the file.
    pub document: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub files_checked: usize,
    pub documents_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

fn missing_fields(doc: &Value) -> Vec<&'static str> {
    let has_string = |v: Option<&Value>| v.and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    let mut missing = Vec::new();
    if !has_string(doc.get("apiVersion")) {
        missing.push("apiVersion");
    }
    if !has_string(doc.get("kind")) {
        missing.push("kind");
    }
    if !has_string(doc.get("metadata").and_then(|m| m.get("name"))) {
        missing.push("metadata.name");
    }
    missing
}

fn validate_file(path: &Path, report: &mut ValidationReport) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|source| ConversionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    report.files_checked += 1;

    for (index, de) in serde_yaml::Deserializer::from_str(&content).enumerate() {
        let doc = match Value::deserialize(de) {
            Ok(Value::Null) => continue,
            Ok(doc) => doc,
            Err(e) => {
                report.issues.push(ValidationIssue {
                    file: path.to_path_buf(),
                    document: index,
                    message: format!("invalid YAML: {}", e),
                });
                // The stream cannot be resumed after a syntax error.
                break;
            }
        };
        report.documents_checked += 1;

        if !doc.is_mapping() {
            report.issues.push(ValidationIssue {
                file: path.to_path_buf(),
                document: index,
                message: "not an object".to_string(),
            });
            continue;
        }
        let missing = missing_fields(&doc);
        if !missing.is_empty() {
            report.issues.push(ValidationIssue {
                file: path.to_path_buf(),
                document: index,
                message: format!("missing {}", missing.join(", ")),
            });
        }
    }
    Ok(())
}

fn collect_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| ConversionError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if entry.file_type().is_file() && is_yaml {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Re-read every `.yaml`/`.yml` file under `dir` and check each document has
/// `apiVersion`, `kind` and `metadata.name`.
pub fn validate_directory(dir: &Path) -> Result<ValidationReport> {
    let files = collect_yaml_files(dir)?;

    let mut report = ValidationReport::default();
    for file in &files {
        validate_file(file, &mut report)?;
    }
    debug!(
        "validated {} documents in {} files",
        report.documents_checked, report.files_checked
    );
    Ok(report)
}
