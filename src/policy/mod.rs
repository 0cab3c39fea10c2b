//! Policy trait and implementations.

pub mod anomaly;
pub mod error;
pub mod factory;
pub mod mlp;
pub mod random;
pub mod trait_;

pub use anomaly::AnomalyGuard;
pub use error::PolicyError;
pub use factory::{create_policy, PolicyFactory, PolicyKind};
pub use mlp::MlpPolicy;
pub use random::RandomPolicy;
pub use trait_::{all_finite, Policy};
