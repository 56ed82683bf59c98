use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// A failure raised while computing a mapped value or a [`Thunk`](crate::Thunk).
///
/// The underlying error is shared, so every joiner that observes the same
/// failed cell receives the same fault.
#[derive(Debug, Error, Clone)]
#[error("{0:#}")]
pub struct ComputationFault(pub(crate) Arc<anyhow::Error>);

impl ComputationFault {
    /// Wraps an error raised by a computation.
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    /// The error reported by the failing computation.
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("computation panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("computation panicked: {s}")
        } else {
            String::from("computation panicked with unknown payload")
        };

        Self::new(anyhow::anyhow!(msg))
    }
}

impl From<anyhow::Error> for ComputationFault {
    fn from(e: anyhow::Error) -> Self {
        ComputationFault(Arc::new(e))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk size must be a positive integer, got {0}")]
    ChunkSize(i64),

    #[error("unsupported forcing depth '{0}', expected 'shallow' or 'deep'")]
    Depth(String),
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("Computation fault:\n{0}")]
    Computation(#[from] ComputationFault),

    #[error("Failed to build the worker pool")]
    RuntimeBuild(#[from] rayon::ThreadPoolBuildError),
}
