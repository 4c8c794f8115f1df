//! Error types for the waste finder

use crate::quantity::ParseError;
use std::fmt;
use thiserror::Error;

/// Boxed error carried from a data source implementation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which external data source failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Lists declared resource requests per workload
    WorkloadLister,
    /// Reports observed usage per workload
    MetricsSource,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::WorkloadLister => f.write_str("workload lister"),
            SourceKind::MetricsSource => f.write_str("metrics source"),
        }
    }
}

/// Errors that abort a waste scan
///
/// Mismatches between the request and usage listings are not errors; the
/// join absorbs them.
#[derive(Debug, Error)]
pub enum WasteError {
    /// A listing call failed (network, authorization, cluster config)
    #[error("{source_kind} unavailable: {cause}")]
    SourceUnavailable {
        source_kind: SourceKind,
        #[source]
        cause: BoxError,
    },

    /// A resource quantity reported by a source could not be interpreted
    #[error("invalid quantity for {context}: {source}")]
    InvalidQuantity {
        /// Where the value came from, e.g. `cpu request of ns/pod/container`
        context: String,
        #[source]
        source: ParseError,
    },

    /// Utilization threshold is negative or not a number
    #[error("invalid utilization threshold {0}: expected a finite, non-negative percentage")]
    InvalidThreshold(f64),
}

impl WasteError {
    pub fn source_unavailable(source_kind: SourceKind, cause: impl Into<BoxError>) -> Self {
        WasteError::SourceUnavailable {
            source_kind,
            cause: cause.into(),
        }
    }

    pub fn invalid_quantity(context: impl Into<String>, source: ParseError) -> Self {
        WasteError::InvalidQuantity {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for waste finder operations
pub type Result<T> = std::result::Result<T, WasteError>;
