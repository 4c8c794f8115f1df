//! Output formatting utilities

use crate::config::Settings;
use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};
use waste_lib::{
    ContainerResources, NamespaceScope, PodResources, Quantity, SortOrder, WasteReport,
};

/// Utilization below this percentage is shown in red
const CRITICAL_UTILIZATION: f64 = 10.0;

/// Output format for scan results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// One table line: a pod, or one of its containers
#[derive(Debug, Clone, Tabled)]
pub struct PodRow {
    #[tabled(rename = "NAMESPACE")]
    pub namespace: String,
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "MEM REQUESTED")]
    pub mem_requested: String,
    #[tabled(rename = "MEM UTILIZATION %")]
    pub mem_utilization: String,
    #[tabled(rename = "CPU REQUESTED")]
    pub cpu_requested: String,
    #[tabled(rename = "CPU UTILIZATION %")]
    pub cpu_utilization: String,
}

impl PodRow {
    fn pod(pod: &PodResources) -> Self {
        Self {
            namespace: pod.namespace.clone(),
            name: pod.name.clone(),
            mem_requested: format_requested(pod.is_mem_bound(), pod.total_requested_mem()),
            mem_utilization: color_utilization(pod.mem_utilization_pct()),
            cpu_requested: format_requested(pod.is_cpu_bound(), pod.total_requested_cpu()),
            cpu_utilization: color_utilization(pod.cpu_utilization_pct()),
        }
    }

    fn container(container: &ContainerResources) -> Self {
        Self {
            namespace: String::new(),
            name: format!("  \\_{}", container.name),
            mem_requested: format_requested(container.is_mem_bound(), container.requested_mem),
            mem_utilization: color_utilization(container.mem_utilization_pct()),
            cpu_requested: format_requested(container.is_cpu_bound(), container.requested_cpu),
            cpu_utilization: color_utilization(container.cpu_utilization_pct()),
        }
    }
}

/// Table rows for the selected pods, each followed by its containers
pub fn pod_rows(pods: &[PodResources], show_containers: bool) -> Vec<PodRow> {
    let mut rows = Vec::new();
    for pod in pods {
        rows.push(PodRow::pod(pod));
        if show_containers {
            rows.extend(pod.containers().map(PodRow::container));
        }
    }
    rows
}

/// Rounded table of the selected pods
pub fn render_table(pods: &[PodResources], show_containers: bool) -> String {
    Table::new(pod_rows(pods, show_containers))
        .with(Style::rounded())
        .to_string()
}

/// JSON document for one scan
#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub generated_at: String,
    /// Scanned namespace, `null` for all namespaces
    pub scope: Option<String>,
    pub threshold_percent: f64,
    pub order: SortOrder,
    pub pods: Vec<PodSummary>,
}

#[derive(Debug, Serialize)]
pub struct PodSummary {
    pub namespace: String,
    pub name: String,
    pub cpu_requested: Option<Quantity>,
    pub cpu_utilization_percent: Option<f64>,
    pub memory_requested: Option<Quantity>,
    pub memory_utilization_percent: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerSummary>,
}

#[derive(Debug, Serialize)]
pub struct ContainerSummary {
    pub name: String,
    pub cpu_requested: Quantity,
    pub cpu_used: Quantity,
    pub cpu_utilization_percent: Option<f64>,
    pub memory_requested: Quantity,
    pub memory_used: Quantity,
    pub memory_utilization_percent: Option<f64>,
}

impl ReportDocument {
    pub fn new(report: &WasteReport, scope: &NamespaceScope, settings: &Settings) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            scope: scope.namespace().map(str::to_string),
            threshold_percent: settings.selection.threshold_percent,
            order: settings.selection.order,
            pods: report
                .pods
                .iter()
                .map(|pod| PodSummary::new(pod, settings.show_containers))
                .collect(),
        }
    }
}

impl PodSummary {
    fn new(pod: &PodResources, with_containers: bool) -> Self {
        let containers = if with_containers {
            pod.containers().map(ContainerSummary::new).collect()
        } else {
            Vec::new()
        };

        Self {
            namespace: pod.namespace.clone(),
            name: pod.name.clone(),
            cpu_requested: pod.is_cpu_bound().then(|| pod.total_requested_cpu()),
            cpu_utilization_percent: pod.cpu_utilization_pct(),
            memory_requested: pod.is_mem_bound().then(|| pod.total_requested_mem()),
            memory_utilization_percent: pod.mem_utilization_pct(),
            containers,
        }
    }
}

impl ContainerSummary {
    fn new(container: &ContainerResources) -> Self {
        Self {
            name: container.name.clone(),
            cpu_requested: container.requested_cpu,
            cpu_used: container.used_cpu,
            cpu_utilization_percent: container.cpu_utilization_pct(),
            memory_requested: container.requested_mem,
            memory_used: container.used_mem,
            memory_utilization_percent: container.mem_utilization_pct(),
        }
    }
}

/// Print the selected pods in the configured format
pub fn print_report(
    report: &WasteReport,
    scope: &NamespaceScope,
    settings: &Settings,
) -> Result<()> {
    match settings.format {
        OutputFormat::Table => {
            if report.pods.is_empty() {
                print_info(&format!(
                    "No pods below {}% utilization in {}",
                    settings.selection.threshold_percent, scope
                ));
                return Ok(());
            }
            println!("{}", render_table(&report.pods, settings.show_containers));
        }
        OutputFormat::Json => {
            let document = ReportDocument::new(report, scope, settings);
            let json =
                serde_json::to_string_pretty(&document).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Requested amount, or `-` when the resource is not requested
pub fn format_requested(bound: bool, requested: Quantity) -> String {
    if bound {
        requested.to_string()
    } else {
        "-".to_string()
    }
}

/// Format utilization as a whole percentage, `-` when undefined
pub fn format_utilization(pct: Option<f64>) -> String {
    match pct {
        Some(pct) => format!("{:.0}%", pct),
        None => "-".to_string(),
    }
}

/// Color utilization based on value
pub fn color_utilization(pct: Option<f64>) -> String {
    let formatted = format_utilization(pct);
    match pct {
        Some(pct) if pct < CRITICAL_UTILIZATION => formatted.red().to_string(),
        Some(_) => formatted.yellow().to_string(),
        None => formatted,
    }
}
