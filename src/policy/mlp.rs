//! Multilayer-perceptron policy using tch-rs (PyTorch bindings).

use tch::{nn, nn::Module, Device, Tensor};

use super::trait_::Policy;
use crate::config::PolicyConfig;

/// Feed-forward policy network.
///
/// Architecture: `obs_dim → 256 → 256 → act_dim` with ReLU activations and
/// a `tanh` output, so every action lies in `[-1, 1]`. Hidden width and
/// depth come from [`PolicyConfig`].
pub struct MlpPolicy {
    vs: nn::VarStore,
    net: nn::Sequential,
    obs_dim: usize,
    act_dim: usize,
}

impl MlpPolicy {
    /// Creates a policy with the default architecture.
    pub fn new(obs_dim: usize, act_dim: usize, device: Device) -> Self {
        Self::with_config(obs_dim, act_dim, &PolicyConfig::default(), device)
    }

    /// Creates a policy with a custom hidden-layer layout.
    pub fn with_config(
        obs_dim: usize,
        act_dim: usize,
        config: &PolicyConfig,
        device: Device,
    ) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();

        let mut net = nn::seq();
        let mut width = obs_dim as i64;
        for layer in 0..config.hidden_layers {
            net = net
                .add(nn::linear(
                    p / format!("l{}", layer + 1),
                    width,
                    config.hidden_dim,
                    Default::default(),
                ))
                .add_fn(|x| x.relu());
            width = config.hidden_dim;
        }
        let net = net.add(nn::linear(
            p / "out",
            width,
            act_dim as i64,
            Default::default(),
        ));

        Self {
            vs,
            net,
            obs_dim,
            act_dim,
        }
    }

    pub fn observation_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn action_dim(&self) -> usize {
        self.act_dim
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }
}

impl Policy for MlpPolicy {
    fn forward(&self, observations: &Tensor) -> Tensor {
        self.net.forward(observations).tanh()
    }

    fn parameters(&self) -> Option<&nn::VarStore> {
        Some(&self.vs)
    }

    fn parameters_mut(&mut self) -> Option<&mut nn::VarStore> {
        Some(&mut self.vs)
    }

    fn name(&self) -> &str {
        "mlp"
    }
}
