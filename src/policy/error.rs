use thiserror::Error;

/// Errors raised by policy construction and use.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Unsupported policy variant '{0}'")]
    UnsupportedVariant(String),

    #[error("Policy '{0}' has no trainable parameters")]
    NoParameters(String),

    #[error("Policy produced non-finite actions on {consecutive} consecutive calls (limit {limit})")]
    NumericAnomaly { consecutive: usize, limit: usize },

    #[error(transparent)]
    Tensor(#[from] tch::TchError),
}
