//! Data source contracts
//!
//! The finder reads from two independent, read-only sources: one listing the
//! requests each workload declares, one reporting what it currently uses.
//! The two listings are not consistent snapshots of each other.

use crate::error::Result;
use crate::quantity::Quantity;
use async_trait::async_trait;
use std::fmt;

/// Which namespaces a listing covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceScope {
    #[default]
    All,
    Namespace(String),
}

impl NamespaceScope {
    /// The namespace name, `None` for all namespaces
    pub fn namespace(&self) -> Option<&str> {
        match self {
            NamespaceScope::All => None,
            NamespaceScope::Namespace(ns) => Some(ns),
        }
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceScope::All => f.write_str("all namespaces"),
            NamespaceScope::Namespace(ns) => write!(f, "namespace {ns}"),
        }
    }
}

/// Requests declared by one container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRequests {
    pub name: String,
    pub requested_cpu: Quantity,
    pub requested_mem: Quantity,
}

/// Declared requests of one workload
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerRequests>,
}

/// Usage observed for one container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerUsage {
    pub name: String,
    pub used_cpu: Quantity,
    pub used_mem: Quantity,
}

/// Usage observed for one workload
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadUsage {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerUsage>,
}

/// Lists the resource requests of running workloads
#[async_trait]
pub trait WorkloadLister: Send + Sync {
    /// Fails with `WasteError::SourceUnavailable` when the listing cannot be fetched
    async fn list(&self, scope: &NamespaceScope) -> Result<Vec<WorkloadSpec>>;
}

/// Reports the current resource usage of running workloads
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fails with `WasteError::SourceUnavailable` when the listing cannot be fetched
    async fn list(&self, scope: &NamespaceScope) -> Result<Vec<WorkloadUsage>>;
}
