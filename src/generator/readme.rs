//! README accompanying the generated manifests.

use super::secret::PLACEHOLDER;
use super::types::{GeneratedManifest, MigrationScript};
use crate::config::{Configuration, OutputFormat};

pub const SINGLE_FILE_NAME: &str = "all-resources.yaml";

pub fn generate_readme(
    manifests: &[GeneratedManifest],
    scripts: &[MigrationScript],
    config: &Configuration,
) -> String {
    let mut out = String::new();

    out.push_str("# Kubernetes manifests\n\n");
    out.push_str(&format!(
        "Generated by compose2k8s from a Docker Compose project: {} manifest(s) for {} service(s).\n\n",
        manifests.len(),
        config.selected_services.len()
    ));

    out.push_str("## Files\n\n");
    if config.deploy.output_format == OutputFormat::SingleFile {
        out.push_str(&format!("All manifests are in `{}`, in this order:\n\n", SINGLE_FILE_NAME));
    }
    out.push_str("| File | Kind | Description |\n");
    out.push_str("|------|------|-------------|\n");
    for m in manifests {
        out.push_str(&format!("| `{}` | {} | {} |\n", m.filename, m.manifest.kind, m.description));
    }
    out.push('\n');

    out.push_str("## Deploy\n\n```sh\n");
    if let Some(ns) = config.deploy.namespace().filter(|ns| *ns != "default") {
        out.push_str(&format!("kubectl create namespace {}\n", ns));
    }
    match config.deploy.output_format {
        OutputFormat::SingleFile => out.push_str(&format!("kubectl apply -f {}\n", SINGLE_FILE_NAME)),
        OutputFormat::Plain => out.push_str("kubectl apply -f .\n"),
    }
    out.push_str("```\n\n");

    let secrets: Vec<&GeneratedManifest> = manifests
        .iter()
        .filter(|m| m.manifest.kind == "Secret")
        .collect();
    if !secrets.is_empty() {
        out.push_str("## Secrets\n\n");
        out.push_str(&format!(
            "These Secrets contain `{}` placeholders. Fill in real values before applying:\n\n",
            PLACEHOLDER
        ));
        for s in secrets {
            out.push_str(&format!("- `{}` ({})\n", s.manifest.name(), s.filename));
        }
        out.push('\n');
    }

    if !scripts.is_empty() {
        out.push_str("## Data migration\n\n");
        out.push_str("Run these after the workloads are up, from the directory holding the compose file:\n\n");
        for s in scripts {
            out.push_str(&format!("- `{}`: {}\n", s.filename, s.description));
        }
        out.push('\n');
    }

    out
}
