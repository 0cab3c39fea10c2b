//! Random policy for testing and baselines.

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tch::{nn, Tensor};

use super::trait_::Policy;

/// Uniformly random joint commands.
///
/// Each action element is drawn independently from `[-1, 1]`. Used for
/// sanity checks and as a lower-bound baseline. Has no trainable parameters.
pub struct RandomPolicy {
    act_dim: usize,
    rng: RefCell<StdRng>,
}

impl RandomPolicy {
    /// Creates a random policy seeded from entropy.
    pub fn new(act_dim: usize) -> Self {
        Self {
            act_dim,
            rng: RefCell::new(StdRng::from_entropy()),
        }
    }

    /// Creates a reproducible random policy.
    pub fn seeded(act_dim: usize, seed: u64) -> Self {
        Self {
            act_dim,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Policy for RandomPolicy {
    fn forward(&self, observations: &Tensor) -> Tensor {
        let n = observations.size().first().copied().unwrap_or(0).max(0) as usize;
        let mut rng = self.rng.borrow_mut();
        let values: Vec<f32> = (0..n * self.act_dim)
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();
        Tensor::from_slice(&values)
            .reshape([n as i64, self.act_dim as i64])
            .to_device(observations.device())
    }

    fn parameters(&self) -> Option<&nn::VarStore> {
        None
    }

    fn parameters_mut(&mut self) -> Option<&mut nn::VarStore> {
        None
    }

    fn name(&self) -> &str {
        "random"
    }
}
