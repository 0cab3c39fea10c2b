use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::env::EnvError;
use crate::policy::PolicyError;
use crate::sim::BackendError;

/// Errors surfaced by the training and inference loops.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Tensor(#[from] tch::TchError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
