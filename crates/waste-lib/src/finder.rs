//! End-to-end waste scan
//!
//! Lists requests, then usage, joins them and selects the wasteful pods.
//! The two sources are handed in by the caller; nothing is global.

use crate::aggregation::{join, JoinStats};
use crate::error::{Result, SourceKind};
use crate::models::PodResources;
use crate::observability::StructuredLogger;
use crate::selection::{select_wasteful, SelectionConfig, SelectionStats};
use crate::source::{MetricsSource, NamespaceScope, WorkloadLister};

/// Outcome of a scan
#[derive(Debug, Clone, Default)]
pub struct WasteReport {
    /// Wasteful pods, most wasteful first
    pub pods: Vec<PodResources>,
    pub join: JoinStats,
    pub selection: SelectionStats,
}

/// Finds over-provisioned pods using a workload lister and a metrics source
pub struct WasteFinder<L, M> {
    lister: L,
    metrics: M,
    config: SelectionConfig,
    logger: StructuredLogger,
}

impl<L, M> WasteFinder<L, M>
where
    L: WorkloadLister,
    M: MetricsSource,
{
    /// Create a finder with the default threshold and ordering
    pub fn new(lister: L, metrics: M) -> Self {
        Self {
            lister,
            metrics,
            config: SelectionConfig::default(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_selection(mut self, config: SelectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn selection(&self) -> &SelectionConfig {
        &self.config
    }

    /// Run one scan over `scope`
    ///
    /// Requests are listed before usage. Either listing failing aborts the
    /// scan with that error; no partial result is returned.
    pub async fn find(&self, scope: &NamespaceScope) -> Result<WasteReport> {
        self.logger.log_scan_started(scope, &self.config);

        let result = self.scan(scope).await;
        if let Err(e) = &result {
            self.logger.log_scan_failed(scope, e);
        }
        result
    }

    async fn scan(&self, scope: &NamespaceScope) -> Result<WasteReport> {
        let specs = self.lister.list(scope).await?;
        self.logger
            .log_listing(SourceKind::WorkloadLister, scope, specs.len());

        let usages = self.metrics.list(scope).await?;
        self.logger
            .log_listing(SourceKind::MetricsSource, scope, usages.len());

        let joined = join(specs, usages);
        self.logger.log_join(&joined.stats);

        let selection = select_wasteful(joined.pods, &self.config);
        self.logger.log_selection(&selection.stats, &self.config);

        Ok(WasteReport {
            pods: selection.pods,
            join: joined.stats,
            selection: selection.stats,
        })
    }
}
