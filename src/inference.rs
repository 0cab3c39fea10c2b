//! Read-only rollout loop for trained policies.
//!
//! Repeats fixed-length rollouts until the viewer is closed (checked between
//! rollouts) or an optional rollout cap is reached. Actions come from
//! [`Policy::act`] and pass through an [`AnomalyGuard`] before reaching the
//! environment.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::env::VectorizedEnvironment;
use crate::error::{Error, Result};
use crate::metrics::{RolloutMetrics, RolloutSummary};
use crate::policy::{AnomalyGuard, Policy};
use crate::sim::SimulationBackend;

/// Inference settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InferenceConfig {
    /// Environment steps per rollout.
    pub steps_per_rollout: usize,
    /// Stop after this many rollouts. Required when running headless.
    pub max_rollouts: Option<usize>,
    /// Anomalous action batches tolerated in a row.
    pub max_consecutive_anomalies: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            steps_per_rollout: 100,
            max_rollouts: None,
            max_consecutive_anomalies: 10,
        }
    }
}

/// Drives a [`Policy`] on a [`VectorizedEnvironment`] without updating it.
#[derive(Debug, Clone, Default)]
pub struct InferenceLoop {
    config: InferenceConfig,
}

impl InferenceLoop {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Runs rollouts and returns one summary per completed rollout.
    ///
    /// Each rollout resets the environment, then steps it
    /// `steps_per_rollout` times, rendering a frame after every step when a
    /// viewer is open.
    pub fn run<B, P>(
        &self,
        env: &mut VectorizedEnvironment<B>,
        policy: &P,
    ) -> Result<Vec<RolloutSummary>>
    where
        B: SimulationBackend,
        P: Policy,
    {
        let headless = env.context().viewer().is_none();
        if headless && self.config.max_rollouts.is_none() {
            return Err(Error::InvalidConfig(
                "max_rollouts is required without a viewer".to_string(),
            ));
        }

        info!(
            policy = policy.name(),
            num_envs = env.num_envs(),
            steps_per_rollout = self.config.steps_per_rollout,
            headless,
            "inference started"
        );

        let mut guard = AnomalyGuard::new(self.config.max_consecutive_anomalies);
        let mut metrics = RolloutMetrics::new(env.num_envs());
        let mut summaries = Vec::new();

        while !env.context().close_requested()
            && self
                .config
                .max_rollouts
                .map_or(true, |cap| summaries.len() < cap)
        {
            let mut observations = env.reset()?;
            for step in 0..self.config.steps_per_rollout {
                let actions = guard.inspect(policy.act(&observations))?;
                let result = env.step(&actions)?;
                metrics.record(
                    &Vec::<f32>::try_from(&result.rewards)?,
                    &Vec::<bool>::try_from(&result.dones)?,
                );
                observations = result.observations;
                env.context_mut().render()?;
                debug!(step, "inference step");
            }

            let summary = metrics.finish(summaries.len());
            info!(
                rollout = summary.rollout,
                mean_reward = summary.mean_reward,
                "rollout complete"
            );
            summaries.push(summary);
        }

        Ok(summaries)
    }
}
