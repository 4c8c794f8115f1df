//! Wasteful pod detection
//!
//! This crate provides the core functionality for:
//! - Exact resource quantities
//! - Per-container and per-pod request/usage records
//! - Joining declared requests with observed usage
//! - Selecting and ranking under-utilized pods
//! - Structured logging of scans

pub mod aggregation;
pub mod error;
pub mod finder;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod selection;
pub mod source;

pub use error::{Result, SourceKind, WasteError};
pub use finder::{WasteFinder, WasteReport};
pub use models::{ContainerResources, PodKey, PodResources, ResourceKind};
pub use observability::StructuredLogger;
pub use quantity::{ParseError, Quantity, QuantityFormat};
pub use selection::{SelectionConfig, SortOrder, DEFAULT_UTILIZATION_THRESHOLD};
pub use source::{
    ContainerRequests, ContainerUsage, MetricsSource, NamespaceScope, WorkloadLister,
    WorkloadSpec, WorkloadUsage,
};
