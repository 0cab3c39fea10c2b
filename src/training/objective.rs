//! Loss functions the training loop can optimize.

use tch::{Kind, Tensor};

use super::buffer::TrainingBatch;
use crate::policy::Policy;

/// Turns a batch of experience into a scalar loss.
///
/// The returned tensor must be differentiable with respect to the policy's
/// parameters.
pub trait Objective {
    fn loss(&self, policy: &dyn Policy, batch: &TrainingBatch) -> Tensor;

    /// Returns a human-readable name for this objective.
    fn name(&self) -> &str;
}

/// REINFORCE with a fixed-variance Gaussian around the policy output.
///
/// The policy output is the mean of `N(μ(s), σ²)`; the loss is
///
/// ```text
/// L = -mean(Â · log π(a | s)),   log π(a | s) = -Σ_j (a_j - μ_j)² / 2σ²
/// ```
///
/// Terms constant in the parameters are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPolicyGradient {
    /// Exploration standard deviation σ.
    pub std: f64,
}

impl GaussianPolicyGradient {
    pub fn new(std: f64) -> Self {
        Self { std }
    }

    /// Log-density of `actions` under `N(mean, σ²)`, up to a constant.
    pub fn log_prob(&self, mean: &Tensor, actions: &Tensor) -> Tensor {
        let var = (self.std * self.std).max(1e-8);
        (actions - mean)
            .pow_tensor_scalar(2)
            .sum_dim_intlist([-1].as_slice(), false, Kind::Float)
            * (-0.5 / var)
    }
}

impl Objective for GaussianPolicyGradient {
    fn loss(&self, policy: &dyn Policy, batch: &TrainingBatch) -> Tensor {
        let mean = policy.forward(&batch.observations);
        let log_prob = self.log_prob(&mean, &batch.actions);
        -(&batch.advantages * log_prob).mean(Kind::Float)
    }

    fn name(&self) -> &str {
        "gaussian_pg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MlpPolicy;
    use tch::Device;

    #[test]
    fn log_prob_peaks_at_mean() {
        let objective = GaussianPolicyGradient::new(0.5);
        let mean = Tensor::from_slice(&[0.2f32, -0.4]).reshape([1, 2]);
        let at_mean = objective.log_prob(&mean, &mean).double_value(&[0]);
        let away = Tensor::from_slice(&[0.7f32, -0.4]).reshape([1, 2]);
        let off = objective.log_prob(&mean, &away).double_value(&[0]);
        assert_eq!(at_mean, 0.0);
        // -(0.5²) / (2 · 0.25) = -0.5
        assert!((off + 0.5).abs() < 1e-6);
    }

    #[test]
    fn loss_is_differentiable_scalar() {
        let policy = MlpPolicy::new(3, 2, Device::Cpu);
        let batch = TrainingBatch {
            observations: Tensor::randn([8, 3], (Kind::Float, Device::Cpu)),
            actions: Tensor::zeros([8, 2], (Kind::Float, Device::Cpu)),
            advantages: Tensor::ones([8], (Kind::Float, Device::Cpu)),
        };
        let loss = GaussianPolicyGradient::new(0.2).loss(&policy, &batch);
        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(loss.requires_grad());
    }
}
