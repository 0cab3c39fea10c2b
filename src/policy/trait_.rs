//! Policy trait for the vectorized environment.

use tch::{nn, Tensor};
use tracing::error;

/// A policy mapping a batch of observations to a batch of actions.
///
/// Observations have shape `(N, obs_dim)`; actions have shape
/// `(N, act_dim)` with every element in `[-1, 1]`.
pub trait Policy {
    /// Differentiable forward pass, used while training.
    fn forward(&self, observations: &Tensor) -> Tensor;

    /// Inference pass: no gradient graph is built and the result is detached.
    ///
    /// Non-finite outputs are reported with an `error!` diagnostic and
    /// returned unchanged; callers decide how to repair them.
    fn act(&self, observations: &Tensor) -> Tensor {
        let actions = tch::no_grad(|| self.forward(observations)).detach();
        if !all_finite(&actions) {
            error!(policy = self.name(), "policy output contains NaN or Inf");
        }
        actions
    }

    /// Trainable parameters, `None` for parameter-free policies.
    fn parameters(&self) -> Option<&nn::VarStore>;

    /// Mutable access to the trainable parameters, used by the optimizer
    /// and checkpoint loading.
    fn parameters_mut(&mut self) -> Option<&mut nn::VarStore>;

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}

/// True when no element of `t` is NaN or infinite.
pub fn all_finite(t: &Tensor) -> bool {
    t.isfinite().all().int64_value(&[]) != 0
}
