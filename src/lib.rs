//! graspkit - training and inference harness for robotic grasping policies
//!
//! Runs N simulated arm+object scenes as one batched environment, maps
//! observation tensors to joint commands through a [`Policy`](policy::Policy),
//! and drives the observe → act → step cycle for training and inference.
//!
//! # Layout
//!
//! - [`sim`]: the [`SimulationBackend`](sim::SimulationBackend) interface,
//!   scoped engine ownership and two shipped backends.
//! - [`env`]: the [`VectorizedEnvironment`](env::VectorizedEnvironment) and
//!   pluggable reward models.
//! - [`policy`]: the policy trait, MLP and random variants, the factory and
//!   the anomaly guard.
//! - [`training`] / [`inference`]: the driver loops.
//! - [`checkpoint`]: epoch-numbered parameter snapshots.

pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod policy;
pub mod sim;
pub mod training;
pub mod units;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use config::{EnvConfig, FailurePolicy, PolicyConfig};
pub use env::{EnvError, StepResult, VectorizedEnvironment};
pub use error::{Error, Result};
pub use inference::{InferenceConfig, InferenceLoop};
pub use metrics::{RolloutMetrics, RolloutSummary};
pub use policy::{create_policy, Policy, PolicyError, PolicyFactory, PolicyKind};
pub use training::{EpochSummary, TrainingConfig, TrainingLoop};
