use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use compose2k8s::{
    ConvertOptions,
    cli::{Cli, Commands},
    convert, output,
};
use serde_json::json;
use std::path::Path;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    match cli.command {
        Commands::Convert {
            file,
            env_file,
            output,
            format,
            namespace,
            config,
        } => handle_convert(
            ConvertOptions {
                file,
                env_file,
                output_dir: output,
                format,
                namespace,
                config_file: config,
            },
            cli.quiet,
            cli.json,
        ),
        Commands::Validate { dir } => handle_validate(&dir, cli.quiet, cli.json),
    }
}

fn handle_convert(options: ConvertOptions, quiet: bool, json_output: bool) -> anyhow::Result<()> {
    let report = convert(&options).context("conversion failed")?;

    if json_output {
        let summary = json!({
            "composeFile": report.compose_file,
            "outputDir": report.output_dir,
            "manifests": report.output.manifests.iter().map(|m| json!({
                "filename": m.filename,
                "kind": m.manifest.kind,
                "name": m.manifest.name(),
                "service": m.service_name,
            })).collect::<Vec<_>>(),
            "migrationScripts": report.output.migration_scripts.iter().map(|s| &s.filename).collect::<Vec<_>>(),
            "written": report.written,
            "warnings": report.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for warning in &report.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    if !quiet {
        println!(
            "{} {} manifests from {} written to {}",
            "✅".green(),
            report.output.manifests.len(),
            report.compose_file.display(),
            report.output_dir.display().to_string().cyan()
        );
        for script in &report.output.migration_scripts {
            println!("   {} {}", "migration:".blue(), script.filename);
        }
        if report
            .output
            .manifests
            .iter()
            .any(|m| m.manifest.kind == "Secret")
        {
            println!(
                "   {} Secrets contain placeholder values. Edit them before applying.",
                "Note:".yellow()
            );
        }
    }
    Ok(())
}

fn handle_validate(dir: &Path, quiet: bool, json_output: bool) -> anyhow::Result<()> {
    let report = output::validate_directory(dir)
        .with_context(|| format!("cannot validate {}", dir.display()))?;

    if json_output {
        let summary = json!({
            "filesChecked": report.files_checked,
            "documentsChecked": report.documents_checked,
            "issues": report.issues.iter().map(|i| json!({
                "file": i.file,
                "document": i.document,
                "message": i.message,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        if !report.is_valid() {
            bail!("{} invalid documents", report.issues.len());
        }
        return Ok(());
    }

    for issue in &report.issues {
        eprintln!(
            "{} {} (document {}): {}",
            "invalid:".red().bold(),
            issue.file.display(),
            issue.document + 1,
            issue.message
        );
    }

    if !report.is_valid() {
        bail!("{} invalid documents", report.issues.len());
    }
    if !quiet {
        println!(
            "{} {} documents in {} files are valid",
            "✅".green(),
            report.documents_checked,
            report.files_checked
        );
    }
    Ok(())
}
