//! Joining declared requests with observed usage
//!
//! Pods are first built from the request listing with usage at zero, then
//! enriched in place from the usage listing. Disagreements between the two
//! listings are expected (pods come and go between the two calls) and never
//! fail the join:
//! - usage for a pod that has no request entry is dropped;
//! - usage for a container that has no request entry gets a record with zero
//!   requests, which keeps it unbound on both dimensions.

#[cfg(test)]
mod tests;

use crate::models::{ContainerResources, PodKey, PodResources};
use crate::source::{WorkloadSpec, WorkloadUsage};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Counters describing how the two listings lined up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Pods in the request listing
    pub requested_pods: usize,
    /// Pods in the usage listing
    pub reported_pods: usize,
    /// Pods present in both listings
    pub joined_pods: usize,
    /// Usage entries without a matching request entry
    pub skipped_usage_entries: usize,
    /// Containers that only appeared in the usage listing
    pub usage_only_containers: usize,
    /// Pods without usage, e.g. not yet scraped by the metrics pipeline
    pub request_only_pods: usize,
}

/// Result of a join: populated pods in `(namespace, name)` order
#[derive(Debug, Clone, Default)]
pub struct JoinedPods {
    pub pods: Vec<PodResources>,
    pub stats: JoinStats,
}

/// Build pod records from the request listing, usage left at zero
pub fn collect_requests(specs: Vec<WorkloadSpec>) -> BTreeMap<PodKey, PodResources> {
    let mut pods = BTreeMap::new();

    for spec in specs {
        let mut pod = PodResources::new(spec.namespace, spec.name);
        for container in spec.containers {
            pod.insert_container(ContainerResources::with_requests(
                container.name,
                container.requested_cpu,
                container.requested_mem,
            ));
        }

        let key = pod.key();
        if pods.insert(key.clone(), pod).is_some() {
            debug!(pod = %key, "Duplicate pod in request listing, keeping the last entry");
        }
    }

    pods
}

/// Fill in usage from the usage listing
///
/// Returns the keys of pods that received usage and updates `stats`.
pub fn apply_usage(
    pods: &mut BTreeMap<PodKey, PodResources>,
    usages: Vec<WorkloadUsage>,
    stats: &mut JoinStats,
) -> BTreeSet<PodKey> {
    let mut reported = BTreeSet::new();

    for usage in usages {
        stats.reported_pods += 1;
        let key = PodKey::new(usage.namespace, usage.name);

        let Some(pod) = pods.get_mut(&key) else {
            debug!(pod = %key, "Usage reported for a pod missing from the request listing, skipping");
            stats.skipped_usage_entries += 1;
            continue;
        };

        for container_usage in usage.containers {
            let container = pod
                .containers
                .entry(container_usage.name)
                .or_insert_with_key(|name| {
                    debug!(pod = %key, container = %name, "Usage for a container without requests");
                    stats.usage_only_containers += 1;
                    ContainerResources::new(name.clone())
                });
            container.used_cpu = container_usage.used_cpu;
            container.used_mem = container_usage.used_mem;
        }

        reported.insert(key);
    }

    reported
}

/// Merge the request and usage listings into populated pod records
///
/// Only pods present in both listings are returned.
pub fn join(specs: Vec<WorkloadSpec>, usages: Vec<WorkloadUsage>) -> JoinedPods {
    let mut stats = JoinStats::default();

    let mut pods = collect_requests(specs);
    stats.requested_pods = pods.len();

    let reported = apply_usage(&mut pods, usages, &mut stats);

    let pods: Vec<PodResources> = pods
        .into_iter()
        .filter_map(|(key, pod)| reported.contains(&key).then_some(pod))
        .collect();

    stats.joined_pods = pods.len();
    stats.request_only_pods = stats.requested_pods - stats.joined_pods;

    JoinedPods { pods, stats }
}
