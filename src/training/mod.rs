//! Training infrastructure.
//!
//! Provides the rollout buffer, discounted returns, the objective trait with
//! its default policy-gradient loss, and the epoch-based training loop.

pub mod buffer;
pub mod objective;
pub mod returns;
pub mod trainer;

pub use buffer::{RolloutBuffer, TrainingBatch, Transition};
pub use objective::{GaussianPolicyGradient, Objective};
pub use returns::discounted_returns;
pub use trainer::{EpochSummary, TrainingConfig, TrainingLoop};
