//! Rollout buffer for storing one epoch of batched transitions.
//!
//! Instances are not reset when their episode ends, so everything an instance
//! produces after its first `done` is masked out: it earns no reward, has a
//! zero return and is left out of the training batch.

use tch::Tensor;

use super::returns::discounted_returns;

/// One environment step for the whole batch.
#[derive(Debug)]
pub struct Transition {
    /// Observations the actions were computed from, shape `(N, obs_dim)`.
    pub observations: Tensor,
    /// Actions sent to the environment, shape `(N, act_dim)`.
    pub actions: Tensor,
    /// Per-instance rewards.
    pub rewards: Vec<f32>,
    /// Per-instance episode termination flags.
    pub dones: Vec<bool>,
}

/// Flattened view of a buffer, ready for a loss computation.
#[derive(Debug)]
pub struct TrainingBatch {
    /// Shape `(T·N, obs_dim)`.
    pub observations: Tensor,
    /// Shape `(T·N, act_dim)`.
    pub actions: Tensor,
    /// Shape `(T·N,)`.
    pub advantages: Tensor,
}

/// Stores the transitions of one epoch, then turns them into advantages.
///
/// Transitions are kept step-major: element `t·N + i` of `returns` and
/// `advantages` belongs to step `t` of instance `i`.
#[derive(Debug)]
pub struct RolloutBuffer {
    num_envs: usize,
    /// Stored transitions.
    pub transitions: Vec<Transition>,
    /// Discounted returns (populated by [`RolloutBuffer::compute_returns`]).
    pub returns: Vec<f32>,
    /// Normalized returns used as advantages.
    pub advantages: Vec<f32>,
    /// Step-major flags, false once the instance finished on an earlier step.
    live: Vec<bool>,
    finished: Vec<bool>,
}

impl RolloutBuffer {
    pub fn new(num_envs: usize) -> Self {
        Self {
            num_envs,
            transitions: Vec::new(),
            returns: Vec::new(),
            advantages: Vec::new(),
            live: Vec::new(),
            finished: vec![false; num_envs],
        }
    }

    /// Adds a transition to the buffer.
    pub fn add(&mut self, transition: Transition) {
        debug_assert_eq!(transition.rewards.len(), self.num_envs);
        debug_assert_eq!(transition.dones.len(), self.num_envs);
        for (finished, done) in self.finished.iter_mut().zip(&transition.dones) {
            self.live.push(!*finished);
            *finished |= *done;
        }
        self.transitions.push(transition);
    }

    /// Clears all stored data.
    pub fn clear(&mut self) {
        self.transitions.clear();
        self.returns.clear();
        self.advantages.clear();
        self.live.clear();
        self.finished.fill(false);
    }

    /// Returns the number of stored steps.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Step-major liveness flags, one per stored instance-step.
    pub fn live(&self) -> &[bool] {
        &self.live
    }

    /// Sum of live rewards divided by the number of instances: the mean
    /// per-instance reward collected over the stored steps.
    pub fn mean_reward(&self) -> f64 {
        if self.num_envs == 0 {
            return 0.0;
        }
        let total: f64 = self
            .masked_rewards()
            .into_iter()
            .map(f64::from)
            .sum();
        total / self.num_envs as f64
    }

    fn masked_rewards(&self) -> Vec<f32> {
        self.transitions
            .iter()
            .flat_map(|t| t.rewards.iter().copied())
            .zip(&self.live)
            .map(|(reward, live)| if *live { reward } else { 0.0 })
            .collect()
    }

    /// Computes per-instance discounted returns and copies them into
    /// `advantages`.
    pub fn compute_returns(&mut self, gamma: f32) {
        let rewards = self.masked_rewards();
        let dones: Vec<bool> = self
            .transitions
            .iter()
            .flat_map(|t| t.dones.iter().copied())
            .collect();
        self.returns = discounted_returns(&rewards, &dones, self.num_envs, gamma);
        self.advantages = self.returns.clone();
    }

    /// Normalizes live advantages to zero mean and unit variance. Masked
    /// entries are set to zero.
    pub fn normalize_advantages(&mut self) {
        let live: Vec<f32> = self
            .advantages
            .iter()
            .zip(&self.live)
            .filter(|(_, live)| **live)
            .map(|(a, _)| *a)
            .collect();
        if live.is_empty() {
            return;
        }
        let n = live.len() as f32;
        let mean: f32 = live.iter().sum::<f32>() / n;
        let var: f32 = live.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n;
        let std = (var + 1e-8).sqrt();
        for (a, live) in self.advantages.iter_mut().zip(&self.live) {
            *a = if *live { (*a - mean) / std } else { 0.0 };
        }
    }

    /// Concatenates the live instance-steps into one batch. Returns `None`
    /// when nothing live is stored.
    pub fn training_batch(&self) -> Option<TrainingBatch> {
        let rows: Vec<i64> = (0..self.live.len() as i64)
            .filter(|&row| self.live[row as usize])
            .collect();
        if rows.is_empty() {
            return None;
        }
        let observations: Vec<&Tensor> = self.transitions.iter().map(|t| &t.observations).collect();
        let actions: Vec<&Tensor> = self.transitions.iter().map(|t| &t.actions).collect();
        let observations = Tensor::cat(&observations, 0);
        let device = observations.device();
        let index = Tensor::from_slice(&rows).to_device(device);
        let advantages: Vec<f32> = rows
            .iter()
            .map(|&row| self.advantages.get(row as usize).copied().unwrap_or(0.0))
            .collect();
        Some(TrainingBatch {
            observations: observations.index_select(0, &index),
            actions: Tensor::cat(&actions, 0).index_select(0, &index),
            advantages: Tensor::from_slice(&advantages).to_device(device),
        })
    }
}
