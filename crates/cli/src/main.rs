//! Init container timing CLI
//!
//! Measures how long each init container of a pod took to start and finish,
//! and how well image pull latency accounts for the gaps between them.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, live};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Init container startup timing reconciler
#[derive(Parser)]
#[command(name = "initlat")]
#[command(author, version, about = "Init container startup timing reconciler", long_about = None)]
pub struct Cli {
    /// Path to a config file (defaults to ~/.config/initlat/config.{yaml,json,toml})
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Namespace of the measured pod
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Report an unknown total relative error if any container has unknown totals
    #[arg(long)]
    pub strict_aggregate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recreate the pod, wait until it is Running and report init container timing
    Run {
        /// Pod name (overrides the manifest's metadata.name)
        #[arg(long, short)]
        pod: Option<String>,

        /// Pod manifest to create
        #[arg(long, short)]
        manifest: Option<PathBuf>,

        /// Measure an existing pod instead of deleting and recreating it
        #[arg(long)]
        keep_existing: bool,

        /// Seconds to wait for deletion and for the Running phase
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Report init container timing for an existing pod
    Report {
        /// Pod name
        #[arg(long, short)]
        pod: Option<String>,
    },

    /// Reconcile saved `kubectl get pod -o yaml` and `kubectl describe pod` output
    Analyze {
        /// File with `kubectl get pod -o yaml` (or `-o json`) output
        #[arg(long)]
        pod_status: PathBuf,

        /// File with `kubectl describe pod` output
        #[arg(long)]
        events: PathBuf,

        /// Stop after this many distinct pulled images
        #[arg(long)]
        event_limit: Option<usize>,
    },

    /// Show image pull latencies found in saved `kubectl describe pod` output
    Events {
        /// File with `kubectl describe pod` output
        #[arg(long)]
        events: PathBuf,

        /// Stop after this many distinct pulled images
        #[arg(long)]
        event_limit: Option<usize>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    // Load configuration, then let flags override it
    let mut settings = config::RunConfig::load(cli.config.as_deref())?;
    if let Some(namespace) = cli.namespace {
        settings.namespace = namespace;
    }
    if cli.strict_aggregate {
        settings.strict_aggregate = true;
    }

    let kubeconfig = config::kubeconfig_path(cli.kubeconfig.as_deref());

    // Execute command
    match cli.command {
        Commands::Run {
            pod,
            manifest,
            keep_existing,
            timeout,
        } => {
            if let Some(pod) = pod {
                settings.pod_name = pod;
            }
            if let Some(manifest) = manifest {
                settings.manifest = manifest;
            }
            if let Some(timeout) = timeout {
                settings.wait_timeout_secs = timeout;
            }
            live::run(&settings, kubeconfig.as_deref(), keep_existing, cli.format).await?;
        }
        Commands::Report { pod } => {
            if let Some(pod) = pod {
                settings.pod_name = pod;
            }
            live::report(&settings, kubeconfig.as_deref(), cli.format).await?;
        }
        Commands::Analyze {
            pod_status,
            events,
            event_limit,
        } => {
            if event_limit.is_some() {
                settings.event_limit = event_limit;
            }
            analyze::analyze(&settings, &pod_status, &events, cli.format)?;
        }
        Commands::Events {
            events,
            event_limit,
        } => {
            if event_limit.is_some() {
                settings.event_limit = event_limit;
            }
            analyze::show_events(&settings, &events, cli.format)?;
        }
    }

    Ok(())
}
