//! Configuration for the vectorized environment and policy construction.
//!
//! Training and inference settings live next to their loops
//! ([`TrainingConfig`](crate::training::TrainingConfig),
//! [`InferenceConfig`](crate::inference::InferenceConfig)).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tch::Device;

use crate::sim::{Transform, Vec3};

/// What to do when the backend refuses to create an instance's agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailurePolicy {
    /// Fail construction of the whole batch.
    #[default]
    Abort,
    /// Skip the instance, shrink the batch and report the failed index.
    Compact,
}

/// Configuration for a [`VectorizedEnvironment`](crate::env::VectorizedEnvironment).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnvConfig {
    // --- Batch ---
    /// Number of instances requested.
    pub num_envs: usize,
    /// Behaviour on per-instance creation failure.
    pub on_instance_failure: FailurePolicy,

    // --- Scene layout ---
    /// Half-extent of each scene's bounds.
    pub spacing: f32,
    /// Root pose of the agent inside its scene.
    pub agent_pose: Transform,
    /// Object position relative to the agent root.
    pub object_offset: Vec3,
    /// Edge length of the cube object.
    pub box_edge: f32,

    // --- Articulation ---
    /// Joint armature applied to the agent asset.
    pub armature: f32,
    /// Joint damping applied to the agent asset.
    pub damping: f32,

    // --- Placement ---
    /// Device observation/reward tensors are created on.
    #[cfg_attr(feature = "serde", serde(skip, default = "cpu"))]
    pub device: Device,
}

#[cfg(feature = "serde")]
fn cpu() -> Device {
    Device::Cpu
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            num_envs: 10,
            on_instance_failure: FailurePolicy::Abort,
            spacing: 2.0,
            agent_pose: Transform::default(),
            object_offset: Vec3::new(0.3, 0.0, 0.05),
            box_edge: 0.05,
            armature: 0.01,
            damping: 0.1,
            device: Device::Cpu,
        }
    }
}

/// Architecture of the multilayer-perceptron policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolicyConfig {
    /// Width of every hidden layer.
    pub hidden_dim: i64,
    /// Number of hidden layers.
    pub hidden_layers: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hidden_dim: 256,
            hidden_layers: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_env_config_is_valid() {
        let cfg = EnvConfig::default();
        assert!(cfg.num_envs > 0);
        assert!(cfg.spacing > 0.0);
        assert!(cfg.armature > 0.0);
        assert!(cfg.damping > 0.0);
        assert_eq!(cfg.on_instance_failure, FailurePolicy::Abort);
        assert_eq!(cfg.device, Device::Cpu);
    }

    #[test]
    fn default_policy_config_matches_reference_mlp() {
        let cfg = PolicyConfig::default();
        assert_eq!(cfg.hidden_dim, 256);
        assert_eq!(cfg.hidden_layers, 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn env_config_json_roundtrip() {
        let cfg = EnvConfig {
            num_envs: 4,
            on_instance_failure: FailurePolicy::Compact,
            ..EnvConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"compact\""));
        let restored: EnvConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cfg);
    }
}
