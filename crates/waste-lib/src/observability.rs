//! Structured logging for waste scans
//!
//! Every event carries a stable `event` field plus the cluster context the
//! scan runs against, so JSON logs can be filtered without parsing messages.

use crate::aggregation::JoinStats;
use crate::error::{SourceKind, WasteError};
use crate::selection::{SelectionConfig, SelectionStats};
use crate::source::NamespaceScope;
use tracing::{debug, info, warn};

/// Structured logger for scan events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("default")
    }
}

impl StructuredLogger {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Log the start of a scan
    pub fn log_scan_started(&self, scope: &NamespaceScope, config: &SelectionConfig) {
        info!(
            event = "scan_started",
            context = %self.context,
            scope = %scope,
            threshold_percent = config.threshold_percent,
            order = %config.order,
            "Looking for wasteful pods"
        );
    }

    /// Log a listing received from a data source
    pub fn log_listing(&self, source: SourceKind, scope: &NamespaceScope, pods: usize) {
        debug!(
            event = "listing_received",
            context = %self.context,
            source = %source,
            scope = %scope,
            pods = pods,
            "Listing received"
        );
    }

    /// Log how the request and usage listings lined up
    pub fn log_join(&self, stats: &JoinStats) {
        if stats.skipped_usage_entries > 0 || stats.usage_only_containers > 0 {
            warn!(
                event = "listings_mismatched",
                context = %self.context,
                skipped_usage_entries = stats.skipped_usage_entries,
                usage_only_containers = stats.usage_only_containers,
                "Request and usage listings disagree, mismatched entries treated as unbound"
            );
        }

        info!(
            event = "listings_joined",
            context = %self.context,
            requested_pods = stats.requested_pods,
            reported_pods = stats.reported_pods,
            joined_pods = stats.joined_pods,
            request_only_pods = stats.request_only_pods,
            "Joined requests with usage"
        );
    }

    /// Log the outcome of the selection pass
    pub fn log_selection(&self, stats: &SelectionStats, config: &SelectionConfig) {
        info!(
            event = "pods_selected",
            context = %self.context,
            candidates = stats.candidates,
            resource_bound = stats.resource_bound,
            wasteful = stats.low_utilization,
            threshold_percent = config.threshold_percent,
            "Selected wasteful pods"
        );
    }

    /// Log a scan that aborted
    pub fn log_scan_failed(&self, scope: &NamespaceScope, error: &WasteError) {
        warn!(
            event = "scan_failed",
            context = %self.context,
            scope = %scope,
            error = %error,
            "Scan aborted"
        );
    }
}
