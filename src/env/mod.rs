//! Vectorized grasping environment and its reward models.

pub mod environment;
pub mod error;
pub mod reward;

pub use environment::{BatchReport, Instance, StepResult, VectorizedEnvironment};
pub use error::EnvError;
pub use reward::{InstanceSnapshot, ReachReward, RewardModel, ZeroReward};
