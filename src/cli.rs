use crate::config::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "compose2k8s")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert Docker Compose projects into Kubernetes manifests")]
#[command(long_about = "Reads a Docker Compose file, classifies its services, volumes and environment, and writes reviewable Kubernetes manifests with placeholder Secrets, readiness-gating init containers and optional Ingress or Gateway API routing.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print a JSON report instead of the human-readable summary
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a Compose project into Kubernetes manifests
    Convert {
        /// Compose file (defaults to compose.yaml / docker-compose.yml in the current directory)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Env file used for variable interpolation (defaults to .env next to the compose file)
        #[arg(long, value_name = "FILE")]
        env_file: Option<PathBuf>,

        /// Output directory for generated files
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Output layout
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Kubernetes namespace
        #[arg(short, long, value_name = "NAMESPACE")]
        namespace: Option<String>,

        /// TOML file with pre-answered conversion choices
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Check generated manifests for apiVersion, kind and metadata.name
    Validate {
        /// Directory containing generated manifests
        #[arg(value_name = "DIR", default_value = "./k8s")]
        dir: PathBuf,
    },
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
