//! Epoch-based training loop.
//!
//! Each epoch resets the environment, collects `steps_per_epoch` batched
//! steps with Gaussian exploration around the policy output, then performs a
//! single optimizer update on the configured [`Objective`].

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tch::{nn, nn::OptimizerConfig};
use tracing::{debug, info};

use super::buffer::{RolloutBuffer, Transition};
use super::objective::{GaussianPolicyGradient, Objective};
use crate::checkpoint::CheckpointStore;
use crate::env::VectorizedEnvironment;
use crate::error::{Error, Result};
use crate::policy::{Policy, PolicyError};
use crate::sim::SimulationBackend;

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainingConfig {
    /// Number of epochs (optimizer updates).
    pub epochs: usize,
    /// Environment steps collected per epoch.
    pub steps_per_epoch: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Discount factor γ.
    pub gamma: f32,
    /// Standard deviation of the Gaussian exploration noise.
    pub exploration_std: f64,
    /// Stop after this many epochs without a new best mean reward. Must be
    /// at least 1 when set.
    pub patience: Option<usize>,
    /// Checkpoint interval in epochs. The final epoch is always saved when a
    /// checkpoint store is attached.
    pub save_every: Option<usize>,
    /// Seeds libtorch's generator when [`TrainingLoop::run`] starts, which
    /// fixes the exploration noise. Initial weights are seeded through
    /// [`PolicyFactory::seed`](crate::PolicyFactory::seed).
    pub seed: Option<i64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            steps_per_epoch: 100,
            learning_rate: 1e-3,
            gamma: 0.99,
            exploration_std: 0.2,
            patience: None,
            save_every: Some(10),
            seed: None,
        }
    }
}

/// Outcome of one training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// Epoch number, starting at 1 (continues from the loaded epoch when
    /// resuming).
    pub epoch: usize,
    /// Mean per-instance reward collected during the epoch.
    pub mean_reward: f64,
    /// Objective value before the update.
    pub loss: f64,
    /// Checkpoint written at the end of the epoch, if any.
    pub checkpoint: Option<PathBuf>,
}

/// Drives training of a [`Policy`] on a [`VectorizedEnvironment`].
///
/// # Lifecycle
///
/// 1. Call [`TrainingLoop::new`] with a [`TrainingConfig`].
/// 2. Optionally attach a [`CheckpointStore`] or resume from one.
/// 3. Call [`TrainingLoop::run`]; it returns the learning curve.
pub struct TrainingLoop<O: Objective = GaussianPolicyGradient> {
    config: TrainingConfig,
    objective: O,
    checkpoints: Option<CheckpointStore>,
    resume: bool,
}

impl TrainingLoop<GaussianPolicyGradient> {
    /// Creates a loop using [`GaussianPolicyGradient`] with the configured
    /// exploration noise.
    pub fn new(config: TrainingConfig) -> Self {
        let objective = GaussianPolicyGradient::new(config.exploration_std);
        Self {
            config,
            objective,
            checkpoints: None,
            resume: false,
        }
    }
}

impl<O: Objective> TrainingLoop<O> {
    /// Replaces the objective.
    pub fn with_objective<O2: Objective>(self, objective: O2) -> TrainingLoop<O2> {
        TrainingLoop {
            config: self.config,
            objective,
            checkpoints: self.checkpoints,
            resume: self.resume,
        }
    }

    /// Saves checkpoints into `store`.
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Loads the latest checkpoint from `store` before training and keeps
    /// saving into it. A missing checkpoint fails the run.
    pub fn resume_from(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self.resume = true;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// Runs the configured number of epochs and returns one summary per
    /// completed epoch.
    pub fn run<B, P>(
        &self,
        env: &mut VectorizedEnvironment<B>,
        policy: &mut P,
    ) -> Result<Vec<EpochSummary>>
    where
        B: SimulationBackend,
        P: Policy,
    {
        if self.config.steps_per_epoch == 0 {
            return Err(Error::InvalidConfig(
                "steps_per_epoch must be at least 1".to_string(),
            ));
        }
        if self.config.patience == Some(0) {
            return Err(Error::InvalidConfig(
                "patience must be at least 1".to_string(),
            ));
        }
        if let Some(seed) = self.config.seed {
            tch::manual_seed(seed);
        }

        let name = policy.name().to_string();
        let vs = policy
            .parameters_mut()
            .ok_or_else(|| PolicyError::NoParameters(name.clone()))?;

        let mut first_epoch = 1;
        if self.resume {
            if let Some(store) = &self.checkpoints {
                first_epoch = store.load_latest(vs)? + 1;
            }
        }
        let mut optimizer = nn::Adam::default().build(vs, self.config.learning_rate)?;

        info!(
            policy = %name,
            objective = self.objective.name(),
            num_envs = env.num_envs(),
            epochs = self.config.epochs,
            steps_per_epoch = self.config.steps_per_epoch,
            "training started"
        );

        let last_epoch = first_epoch + self.config.epochs - 1;
        let mut curve = Vec::with_capacity(self.config.epochs);
        let mut best = f64::NEG_INFINITY;
        let mut stale = 0usize;

        for epoch in first_epoch..=last_epoch {
            let buffer = self.collect(env, policy)?;
            let mean_reward = buffer.mean_reward();

            let loss = match buffer.training_batch() {
                Some(batch) => {
                    let loss = self.objective.loss(&*policy, &batch);
                    optimizer.zero_grad();
                    loss.backward();
                    optimizer.step();
                    loss.double_value(&[])
                }
                None => 0.0,
            };

            if mean_reward > best {
                best = mean_reward;
                stale = 0;
            } else {
                stale += 1;
            }
            let stop = self.config.patience.is_some_and(|p| stale >= p);

            let due = self
                .config
                .save_every
                .is_some_and(|every| every > 0 && epoch % every == 0);
            let checkpoint = match (&self.checkpoints, policy.parameters()) {
                (Some(store), Some(vs)) if due || stop || epoch == last_epoch => {
                    Some(store.save(vs, epoch)?)
                }
                _ => None,
            };

            info!(epoch, last_epoch, mean_reward, loss, "epoch complete");
            curve.push(EpochSummary {
                epoch,
                mean_reward,
                loss,
                checkpoint,
            });

            if stop {
                info!(epoch, best, stale, "no improvement, stopping early");
                break;
            }
        }

        Ok(curve)
    }

    fn collect<B, P>(&self, env: &mut VectorizedEnvironment<B>, policy: &P) -> Result<RolloutBuffer>
    where
        B: SimulationBackend,
        P: Policy,
    {
        let std = self.config.exploration_std;
        let mut buffer = RolloutBuffer::new(env.num_envs());
        let mut observations = env.reset()?;

        for step in 0..self.config.steps_per_epoch {
            let actions = tch::no_grad(|| {
                let mean = policy.forward(&observations);
                (&mean + mean.randn_like() * std).clamp(-1.0, 1.0)
            });
            let result = env.step(&actions)?;
            let rewards = Vec::<f32>::try_from(&result.rewards)?;
            let dones = Vec::<bool>::try_from(&result.dones)?;
            debug!(step, done = dones.iter().filter(|d| **d).count(), "training step");

            buffer.add(Transition {
                observations,
                actions,
                rewards,
                dones,
            });
            observations = result.observations;
        }

        buffer.compute_returns(self.config.gamma);
        buffer.normalize_advantages();
        Ok(buffer)
    }
}
