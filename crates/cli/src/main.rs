//! kubectl-waste
//!
//! A kubectl plugin listing pods that use far less CPU or memory than they
//! request, most wasteful first.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waste_lib::SortOrder;

use client::ClusterOptions;
use commands::waste;
use config::{Overrides, Settings};

/// Find over-provisioned pods
#[derive(Parser, Debug)]
#[command(name = "kubectl-waste")]
#[command(author, version, about = "Find pods that use far less than they request", long_about = None)]
pub struct Cli {
    /// Namespace to scan (same as --namespace)
    #[arg(value_name = "NAMESPACE", conflicts_with_all = ["namespace", "all_namespaces"])]
    pub namespace_arg: Option<String>,

    /// Namespace to scan [default: the current context's namespace]
    #[arg(long, short, conflicts_with = "all_namespaces")]
    pub namespace: Option<String>,

    /// Scan every namespace
    #[arg(long, short = 'A')]
    pub all_namespaces: bool,

    /// Utilization percentage below which a pod is reported [default: 50]
    #[arg(long, value_name = "PCT", allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// Ranking of reported pods (cpu-then-memory, lowest)
    #[arg(long, value_name = "ORDER")]
    pub order: Option<SortOrder>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Kubeconfig cluster to use
    #[arg(long)]
    pub cluster: Option<String>,

    /// Kubeconfig user to use
    #[arg(long)]
    pub user: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub output: Option<output::OutputFormat>,

    /// Hide per-container rows
    #[arg(long)]
    pub no_containers: bool,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Log format on stderr
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            namespace: self.namespace_arg.clone().or_else(|| self.namespace.clone()),
            all_namespaces: self.all_namespaces,
            threshold: self.threshold,
            order: self.order,
            format: self.output,
            no_containers: self.no_containers,
        }
    }

    fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            cluster: self.cluster.clone(),
            user: self.user.clone(),
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_filter = if verbose {
        "warn,waste_lib=debug,kubectl_waste=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let settings = Settings::resolve(cli.overrides(), &config)?;

    let cluster = client::connect(&cli.cluster_options()).await?;
    waste::find_wasteful_pods(cluster, &settings).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
