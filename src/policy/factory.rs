//! Policy registry.
//!
//! [`PolicyKind`] is the closed set of shipped variants; the factory maps a
//! variant name plus dimensions onto one of them.

use tch::{nn, Device, Tensor};

use super::error::PolicyError;
use super::mlp::MlpPolicy;
use super::random::RandomPolicy;
use super::trait_::Policy;
use crate::config::PolicyConfig;

/// Every policy variant the harness can build by name.
pub enum PolicyKind {
    Mlp(MlpPolicy),
    Random(RandomPolicy),
}

impl PolicyKind {
    /// Names accepted by [`PolicyFactory::create`].
    pub const fn names() -> &'static [&'static str] {
        &["mlp", "random"]
    }

    fn inner(&self) -> &dyn Policy {
        match self {
            Self::Mlp(policy) => policy,
            Self::Random(policy) => policy,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Policy {
        match self {
            Self::Mlp(policy) => policy,
            Self::Random(policy) => policy,
        }
    }
}

impl Policy for PolicyKind {
    fn forward(&self, observations: &Tensor) -> Tensor {
        self.inner().forward(observations)
    }

    fn act(&self, observations: &Tensor) -> Tensor {
        self.inner().act(observations)
    }

    fn parameters(&self) -> Option<&nn::VarStore> {
        self.inner().parameters()
    }

    fn parameters_mut(&mut self) -> Option<&mut nn::VarStore> {
        self.inner_mut().parameters_mut()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

impl From<MlpPolicy> for PolicyKind {
    fn from(policy: MlpPolicy) -> Self {
        Self::Mlp(policy)
    }
}

impl From<RandomPolicy> for PolicyKind {
    fn from(policy: RandomPolicy) -> Self {
        Self::Random(policy)
    }
}

/// Builds policies by name.
#[derive(Debug, Clone, Default)]
pub struct PolicyFactory {
    /// Architecture used for `"mlp"`.
    pub config: PolicyConfig,
    /// Seeds the RNG of `"random"` and libtorch's generator before `"mlp"`
    /// weights are initialized. Entropy when unset.
    pub seed: Option<u64>,
}

impl PolicyFactory {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Constructs the variant registered under `name`.
    pub fn create(
        &self,
        name: &str,
        obs_dim: usize,
        act_dim: usize,
        device: Device,
    ) -> Result<PolicyKind, PolicyError> {
        match name {
            "mlp" => {
                if let Some(seed) = self.seed {
                    tch::manual_seed(seed as i64);
                }
                Ok(MlpPolicy::with_config(obs_dim, act_dim, &self.config, device).into())
            }
            "random" => Ok(match self.seed {
                Some(seed) => RandomPolicy::seeded(act_dim, seed),
                None => RandomPolicy::new(act_dim),
            }
            .into()),
            other => Err(PolicyError::UnsupportedVariant(other.to_string())),
        }
    }
}

/// Shorthand for [`PolicyFactory::create`] with the default architecture.
pub fn create_policy(
    name: &str,
    obs_dim: usize,
    act_dim: usize,
    device: Device,
) -> Result<PolicyKind, PolicyError> {
    PolicyFactory::default().create(name, obs_dim, act_dim, device)
}
