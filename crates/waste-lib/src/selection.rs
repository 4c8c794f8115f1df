//! Selecting and ranking wasteful pods
//!
//! Two filters followed by an ordering pass:
//! 1. drop pods that request neither CPU nor memory, their utilization means nothing;
//! 2. keep pods using less than the threshold on at least one bound dimension;
//! 3. rank the least utilized first.

use crate::error::{Result, WasteError};
use crate::models::PodResources;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Utilization percentage below which a pod counts as wasteful
pub const DEFAULT_UTILIZATION_THRESHOLD: f64 = 50.0;

/// How selected pods are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// CPU utilization first, falling back to memory (see [`has_less_utilization`])
    #[default]
    CpuThenMemory,
    /// Lowest utilization on any bound dimension
    Lowest,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::CpuThenMemory => f.write_str("cpu-then-memory"),
            SortOrder::Lowest => f.write_str("lowest"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cpu-then-memory" => Ok(SortOrder::CpuThenMemory),
            "lowest" => Ok(SortOrder::Lowest),
            other => Err(format!(
                "unknown sort order {other:?}, expected cpu-then-memory or lowest"
            )),
        }
    }
}

/// Selection settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionConfig {
    /// Utilization percentage below which a pod is selected
    pub threshold_percent: f64,
    pub order: SortOrder,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_UTILIZATION_THRESHOLD,
            order: SortOrder::default(),
        }
    }
}

impl SelectionConfig {
    /// Threshold must be a finite, non-negative percentage. It may exceed 100,
    /// since usage can run above the request.
    pub fn new(threshold_percent: f64) -> Result<Self> {
        if !threshold_percent.is_finite() || threshold_percent < 0.0 {
            return Err(WasteError::InvalidThreshold(threshold_percent));
        }
        Ok(Self {
            threshold_percent,
            ..Default::default()
        })
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

/// Pod counts after each filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub candidates: usize,
    pub resource_bound: usize,
    pub low_utilization: usize,
}

/// Selected pods, most wasteful first
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub pods: Vec<PodResources>,
    pub stats: SelectionStats,
}

/// Run both filters and the ordering pass
pub fn select_wasteful(pods: Vec<PodResources>, config: &SelectionConfig) -> Selection {
    let mut stats = SelectionStats {
        candidates: pods.len(),
        ..Default::default()
    };

    let bound: Vec<PodResources> = pods.into_iter().filter(PodResources::is_resource_bound).collect();
    stats.resource_bound = bound.len();

    let wasteful: Vec<PodResources> = bound
        .into_iter()
        .filter(|pod| pod.has_low_utilization(config.threshold_percent))
        .collect();
    stats.low_utilization = wasteful.len();

    let pods = match config.order {
        SortOrder::CpuThenMemory => sort_cpu_then_memory(wasteful),
        SortOrder::Lowest => sort_lowest(wasteful),
    };

    Selection { pods, stats }
}

#[derive(Debug, Clone, Copy)]
struct UtilizationKey {
    cpu: Option<f64>,
    mem: Option<f64>,
}

impl UtilizationKey {
    fn of(pod: &PodResources) -> Self {
        Self {
            cpu: pod.cpu_utilization_pct(),
            mem: pod.mem_utilization_pct(),
        }
    }

    fn less_than(&self, other: &Self) -> bool {
        less_on(self.cpu, other.cpu) || less_on(self.mem, other.mem)
    }

    fn lowest(&self) -> f64 {
        match (self.cpu, self.mem) {
            (Some(cpu), Some(mem)) => cpu.min(mem),
            (Some(pct), None) | (None, Some(pct)) => pct,
            (None, None) => f64::INFINITY,
        }
    }
}

/// `a` ranks before `b` on one dimension: both bound and `a` lower, or only `a` bound
fn less_on(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Whether `a` ranks before `b`
///
/// Compares CPU utilization when both pods are CPU-bound, with a CPU-bound
/// pod ranking ahead of one that is not. When that does not put `a` first,
/// memory is compared the same way.
///
/// On pods that mix CPU-bound and memory-only records this relation is not a
/// strict weak ordering. For a CPU-only and a memory-only pod it holds in
/// both directions, so their relative order depends on input order.
/// Homogeneous inputs reduce to ascending utilization.
pub fn has_less_utilization(a: &PodResources, b: &PodResources) -> bool {
    UtilizationKey::of(a).less_than(&UtilizationKey::of(b))
}

/// Stable insertion sort driven by [`has_less_utilization`]
///
/// Insertion sort only ever asks "does this element move left", so an
/// inconsistent relation still terminates with a deterministic result.
fn sort_cpu_then_memory(pods: Vec<PodResources>) -> Vec<PodResources> {
    let mut keyed: Vec<(UtilizationKey, PodResources)> =
        pods.into_iter().map(|pod| (UtilizationKey::of(&pod), pod)).collect();

    for i in 1..keyed.len() {
        let mut j = i;
        while j > 0 && keyed[j].0.less_than(&keyed[j - 1].0) {
            keyed.swap(j, j - 1);
            j -= 1;
        }
    }

    keyed.into_iter().map(|(_, pod)| pod).collect()
}

/// Total order on the lowest bound utilization, ties broken by identity
fn sort_lowest(pods: Vec<PodResources>) -> Vec<PodResources> {
    let mut keyed: Vec<(f64, PodResources)> = pods
        .into_iter()
        .map(|pod| (UtilizationKey::of(&pod).lowest(), pod))
        .collect();

    keyed.sort_by(|(a_pct, a), (b_pct, b)| {
        a_pct
            .total_cmp(b_pct)
            .then_with(|| compare_identity(a, b))
    });

    keyed.into_iter().map(|(_, pod)| pod).collect()
}

fn compare_identity(a: &PodResources, b: &PodResources) -> Ordering {
    (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name))
}
