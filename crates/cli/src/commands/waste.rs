//! Wasteful pod listing

use anyhow::{Context, Result};
use waste_lib::{StructuredLogger, WasteFinder};

use crate::client::{ClusterClient, KubeMetricsSource, KubeWorkloadLister};
use crate::config::Settings;
use crate::output;

/// Find pods using less than the threshold of what they request and print them
pub async fn find_wasteful_pods(cluster: ClusterClient, settings: &Settings) -> Result<()> {
    let scope = settings.scope_in(&cluster.namespace);
    let finder = WasteFinder::new(
        KubeWorkloadLister::new(cluster.client.clone()),
        KubeMetricsSource::new(cluster.client),
    )
    .with_selection(settings.selection)
    .with_logger(StructuredLogger::new(cluster.server));

    let report = finder
        .find(&scope)
        .await
        .with_context(|| format!("Failed to scan {}", scope))?;

    output::print_report(&report, &scope, settings)
}
