use thiserror::Error;

use crate::sim::BackendError;

/// Errors raised while building or driving a vectorized environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Instance {index} could not be created: {reason}")]
    Construction { index: usize, reason: String },

    #[error("Invalid environment configuration: {0}")]
    Configuration(String),

    #[error("Action tensor has shape {actual:?}, expected {expected:?}")]
    ContractViolation { expected: Vec<i64>, actual: Vec<i64> },

    #[error("Instance {index} has {actual} {what}, instance 0 has {expected}")]
    TopologyMismatch {
        index: usize,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Tensor(#[from] tch::TchError),
}
