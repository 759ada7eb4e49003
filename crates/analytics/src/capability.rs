//! One-shot storage capability detection.
//!
//! The probe runs once per analysis run; the resulting descriptor is
//! immutable for the run's lifetime and threaded through as
//! configuration. A failed probe means "capability absent", never a
//! fatal error.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Whether a vector-similarity index is available for neighborhood
    /// queries.
    pub vector_backed: bool,
    /// Largest vector dimension the index accepts.
    pub max_dimension: usize,
}

impl BackendCapabilities {
    /// The no-index capability set, used for probe failures and plain
    /// in-memory backends.
    pub fn absent() -> Self {
        Self {
            vector_backed: false,
            max_dimension: 0,
        }
    }
}

#[derive(Debug)]
pub struct ProbeError(pub String);

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capability probe failed: {}", self.0)
    }
}

impl std::error::Error for ProbeError {}

/// Implemented by the host's storage backend handle.
pub trait CapabilityProbe {
    fn probe(&self) -> Result<BackendCapabilities, ProbeError>;
}

/// Probe the backend once, mapping any failure (timeout, missing
/// extension) to the absent capability set.
pub fn detect(probe: &dyn CapabilityProbe) -> BackendCapabilities {
    match probe.probe() {
        Ok(capabilities) => {
            debug!(
                vector_backed = capabilities.vector_backed,
                max_dimension = capabilities.max_dimension,
                "storage capabilities probed"
            );
            capabilities
        }
        Err(err) => {
            warn!(error = %err, "capability probe failed, assuming no vector index");
            BackendCapabilities::absent()
        }
    }
}

/// Probe for hosts without any vector-capable storage.
pub struct NoBackend;

impl CapabilityProbe for NoBackend {
    fn probe(&self) -> Result<BackendCapabilities, ProbeError> {
        Ok(BackendCapabilities::absent())
    }
}
