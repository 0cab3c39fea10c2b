//! Reward bookkeeping for rollouts.
//!
//! Accumulates per-instance rewards over a rollout and summarizes them as a
//! batch mean. An instance stops accumulating after its first `done` until
//! the rollout is finished.

use std::fmt;

/// Per-instance cumulative reward for the rollout in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutMetrics {
    totals: Vec<f64>,
    finished: Vec<bool>,
    steps: usize,
}

impl RolloutMetrics {
    pub fn new(num_envs: usize) -> Self {
        Self {
            totals: vec![0.0; num_envs],
            finished: vec![false; num_envs],
            steps: 0,
        }
    }

    /// Adds one step of rewards and done flags, one value per instance.
    ///
    /// The reward of the step that reports `done` is counted; later rewards
    /// of that instance are ignored.
    pub fn record(&mut self, rewards: &[f32], dones: &[bool]) {
        debug_assert_eq!(rewards.len(), self.totals.len());
        debug_assert_eq!(dones.len(), self.totals.len());
        for ((total, finished), (reward, done)) in self
            .totals
            .iter_mut()
            .zip(self.finished.iter_mut())
            .zip(rewards.iter().zip(dones))
        {
            if *finished {
                continue;
            }
            *total += f64::from(*reward);
            *finished = *done;
        }
        self.steps += 1;
    }

    /// Instances whose episode has ended in this rollout.
    pub fn finished(&self) -> &[bool] {
        &self.finished
    }

    /// Cumulative reward per instance.
    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Mean of the per-instance cumulative rewards.
    pub fn batch_mean(&self) -> f64 {
        if self.totals.is_empty() {
            return 0.0;
        }
        self.totals.iter().sum::<f64>() / self.totals.len() as f64
    }

    /// Closes the rollout and clears the accumulators.
    pub fn finish(&mut self, rollout: usize) -> RolloutSummary {
        let summary = RolloutSummary {
            rollout,
            steps: self.steps,
            mean_reward: self.batch_mean(),
            min_reward: self.totals.iter().copied().fold(f64::INFINITY, f64::min),
            max_reward: self
                .totals
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
        };
        self.totals.fill(0.0);
        self.finished.fill(false);
        self.steps = 0;
        summary
    }
}

/// Aggregated reward of one finished rollout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutSummary {
    /// Rollout index, starting at 0.
    pub rollout: usize,
    /// Steps taken.
    pub steps: usize,
    /// Mean cumulative reward over instances.
    pub mean_reward: f64,
    /// Lowest per-instance cumulative reward.
    pub min_reward: f64,
    /// Highest per-instance cumulative reward.
    pub max_reward: f64,
}

impl fmt::Display for RolloutSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rollout {:>4} | steps {:>4} | mean reward {:>9.3} | min {:>9.3} | max {:>9.3}",
            self.rollout, self.steps, self.mean_reward, self.min_reward, self.max_reward
        )
    }
}
