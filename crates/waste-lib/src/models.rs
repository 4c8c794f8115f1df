//! Per-container and per-pod resource records
//!
//! A record pairs what a container declares it needs with what it was
//! observed using. Utilization only exists on a dimension the container
//! actually requests; unbound dimensions never feed a ratio.

use crate::quantity::Quantity;
use std::collections::BTreeMap;
use std::fmt;

/// Resource dimension a request or usage figure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Cpu => f.write_str("cpu"),
            ResourceKind::Memory => f.write_str("memory"),
        }
    }
}

/// Declared requests and observed usage of one container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerResources {
    pub name: String,
    pub requested_cpu: Quantity,
    pub requested_mem: Quantity,
    pub used_cpu: Quantity,
    pub used_mem: Quantity,
}

impl ContainerResources {
    /// Container with no requests and no usage
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Container with declared requests and usage still at zero
    pub fn with_requests(name: impl Into<String>, cpu: Quantity, memory: Quantity) -> Self {
        Self {
            name: name.into(),
            requested_cpu: cpu,
            requested_mem: memory,
            ..Default::default()
        }
    }

    pub fn requested(&self, kind: ResourceKind) -> Quantity {
        match kind {
            ResourceKind::Cpu => self.requested_cpu,
            ResourceKind::Memory => self.requested_mem,
        }
    }

    pub fn used(&self, kind: ResourceKind) -> Quantity {
        match kind {
            ResourceKind::Cpu => self.used_cpu,
            ResourceKind::Memory => self.used_mem,
        }
    }

    /// A container is bound on a dimension when it requests a non-zero amount of it
    pub fn is_bound(&self, kind: ResourceKind) -> bool {
        !self.requested(kind).is_zero()
    }

    pub fn is_cpu_bound(&self) -> bool {
        self.is_bound(ResourceKind::Cpu)
    }

    pub fn is_mem_bound(&self) -> bool {
        self.is_bound(ResourceKind::Memory)
    }

    /// `used / requested * 100`, `None` when the dimension is unbound
    pub fn utilization_pct(&self, kind: ResourceKind) -> Option<f64> {
        if !self.is_bound(kind) {
            return None;
        }
        self.used(kind).percent_of(&self.requested(kind))
    }

    pub fn cpu_utilization_pct(&self) -> Option<f64> {
        self.utilization_pct(ResourceKind::Cpu)
    }

    pub fn mem_utilization_pct(&self) -> Option<f64> {
        self.utilization_pct(ResourceKind::Memory)
    }
}

/// Identity of a pod within the cluster
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Resource record of a pod, aggregated from its containers
///
/// Containers are kept in name order so that sums and rendering are
/// reproducible from run to run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodResources {
    pub name: String,
    pub namespace: String,
    pub containers: BTreeMap<String, ContainerResources>,
}

impl PodResources {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            containers: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> PodKey {
        PodKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Add or replace a container, keyed by its name
    pub fn insert_container(&mut self, container: ContainerResources) {
        self.containers.insert(container.name.clone(), container);
    }

    pub fn container(&self, name: &str) -> Option<&ContainerResources> {
        self.containers.get(name)
    }

    /// Containers in name order
    pub fn containers(&self) -> impl Iterator<Item = &ContainerResources> {
        self.containers.values()
    }

    fn bound_containers(&self, kind: ResourceKind) -> impl Iterator<Item = &ContainerResources> {
        self.containers().filter(move |c| c.is_bound(kind))
    }

    /// At least one container requests this dimension
    pub fn is_bound(&self, kind: ResourceKind) -> bool {
        self.containers().any(|c| c.is_bound(kind))
    }

    pub fn is_cpu_bound(&self) -> bool {
        self.is_bound(ResourceKind::Cpu)
    }

    pub fn is_mem_bound(&self) -> bool {
        self.is_bound(ResourceKind::Memory)
    }

    pub fn is_resource_bound(&self) -> bool {
        self.is_cpu_bound() || self.is_mem_bound()
    }

    /// Sum of requests over containers bound on this dimension
    pub fn total_requested(&self, kind: ResourceKind) -> Quantity {
        self.bound_containers(kind).map(|c| c.requested(kind)).sum()
    }

    /// Sum of usage over containers bound on this dimension
    ///
    /// Usage of unbound containers is left out so it cannot inflate the
    /// ratio against a request it never made.
    pub fn total_used(&self, kind: ResourceKind) -> Quantity {
        self.bound_containers(kind).map(|c| c.used(kind)).sum()
    }

    pub fn total_requested_cpu(&self) -> Quantity {
        self.total_requested(ResourceKind::Cpu)
    }

    pub fn total_requested_mem(&self) -> Quantity {
        self.total_requested(ResourceKind::Memory)
    }

    /// Pod-level utilization on a dimension, `None` when unbound
    pub fn utilization_pct(&self, kind: ResourceKind) -> Option<f64> {
        if !self.is_bound(kind) {
            return None;
        }
        self.total_used(kind).percent_of(&self.total_requested(kind))
    }

    pub fn cpu_utilization_pct(&self) -> Option<f64> {
        self.utilization_pct(ResourceKind::Cpu)
    }

    pub fn mem_utilization_pct(&self) -> Option<f64> {
        self.utilization_pct(ResourceKind::Memory)
    }

    /// True when any bound dimension is used below `threshold` percent
    pub fn has_low_utilization(&self, threshold: f64) -> bool {
        let below = |pct: Option<f64>| pct.is_some_and(|pct| pct < threshold);
        below(self.mem_utilization_pct()) || below(self.cpu_utilization_pct())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn container(name: &str, req_cpu: &str, req_mem: &str, used_cpu: &str, used_mem: &str) -> ContainerResources {
        ContainerResources {
            name: name.to_string(),
            requested_cpu: q(req_cpu),
            requested_mem: q(req_mem),
            used_cpu: q(used_cpu),
            used_mem: q(used_mem),
        }
    }

    fn test_pod() -> PodResources {
        let mut pod = PodResources::new("default", "test-pod");
        pod.insert_container(container("test-container-1", "500m", "0.5", "10m", "100m"));
        pod.insert_container(container("test-container-2", "500m", "0.5", "10m", "100m"));
        pod.insert_container(container("resource-unbound-container", "0", "0", "5m", "50m"));
        pod
    }

    fn pod_without_requests() -> PodResources {
        let mut pod = PodResources::new("default", "test-pod");
        pod.insert_container(container("resource-unbound-container-1", "0", "0", "10m", "100m"));
        pod.insert_container(container("resource-unbound-container-2", "0", "0", "5m", "50m"));
        pod
    }

    #[test]
    fn test_container_boundedness() {
        let pod = test_pod();
        let bound = pod.container("test-container-1").unwrap();
        let unbound = pod.container("resource-unbound-container").unwrap();

        assert!(bound.is_cpu_bound());
        assert!(bound.is_mem_bound());
        assert!(!unbound.is_cpu_bound());
        assert!(!unbound.is_mem_bound());
    }

    #[test]
    fn test_container_utilization() {
        let c = container("c", "500m", "1Gi", "100m", "256Mi");
        assert_eq!(c.cpu_utilization_pct(), Some(20.0));
        assert_eq!(c.mem_utilization_pct(), Some(25.0));
    }

    #[test]
    fn test_container_utilization_undefined_when_unbound() {
        let c = container("c", "0", "0", "100m", "256Mi");
        assert_eq!(c.cpu_utilization_pct(), None);
        assert_eq!(c.mem_utilization_pct(), None);
    }

    #[test]
    fn test_pod_mem_utilization() {
        assert_eq!(test_pod().mem_utilization_pct(), Some(20.0));
    }

    #[test]
    fn test_pod_cpu_utilization() {
        assert_eq!(test_pod().cpu_utilization_pct(), Some(2.0));
    }

    #[test]
    fn test_pod_totals_skip_unbound_containers() {
        let pod = test_pod();
        assert_eq!(pod.total_requested_cpu().milli_value(), 1000);
        assert_eq!(pod.total_requested_mem().to_string(), "1");
        assert_eq!(pod.total_used(ResourceKind::Cpu), q("20m"));
    }

    #[test]
    fn test_unbound_usage_does_not_move_pod_ratio() {
        let mut pod = test_pod();
        let before = (pod.cpu_utilization_pct(), pod.mem_utilization_pct());

        pod.insert_container(container("sidecar", "0", "0", "4", "8Gi"));

        assert_eq!((pod.cpu_utilization_pct(), pod.mem_utilization_pct()), before);
    }

    #[test]
    fn test_pod_without_requests_is_not_bound() {
        let pod = pod_without_requests();
        assert!(!pod.is_cpu_bound());
        assert!(!pod.is_mem_bound());
        assert!(!pod.is_resource_bound());
        assert_eq!(pod.cpu_utilization_pct(), None);
        assert!(pod.total_requested_cpu().is_zero());
        assert!(!pod.has_low_utilization(50.0));
    }

    #[test]
    fn test_pod_bound_on_one_dimension() {
        let mut pod = PodResources::new("ns", "p");
        pod.insert_container(container("c", "0", "64Mi", "1", "16Mi"));

        assert!(!pod.is_cpu_bound());
        assert!(pod.is_mem_bound());
        assert!(pod.is_resource_bound());
        assert_eq!(pod.mem_utilization_pct(), Some(25.0));
    }

    #[test]
    fn test_has_low_utilization() {
        let pod = test_pod();
        assert!(pod.has_low_utilization(50.0));
        assert!(pod.has_low_utilization(20.5));
        assert!(!pod.has_low_utilization(2.0));
    }

    #[test]
    fn test_low_utilization_on_either_dimension() {
        let mut pod = PodResources::new("ns", "p");
        pod.insert_container(container("c", "100m", "100Mi", "90m", "10Mi"));

        // CPU is busy, memory is idle
        assert!(pod.has_low_utilization(50.0));
        assert!(!pod.has_low_utilization(10.0));
    }

    #[test]
    fn test_containers_iterate_in_name_order() {
        let names: Vec<_> = test_pod().containers().map(|c| c.name.clone()).collect();
        assert_eq!(
            names,
            ["resource-unbound-container", "test-container-1", "test-container-2"]
        );
    }

    #[test]
    fn test_pod_key_display() {
        assert_eq!(PodKey::new("ns1", "p1").to_string(), "ns1/p1");
    }
}
