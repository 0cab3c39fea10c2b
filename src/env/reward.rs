//! Per-instance reward and termination.
//!
//! Task logic is kept out of the environment: after every tick the
//! environment hands each instance's state to a [`RewardModel`], which
//! returns the step reward and whether the instance's episode is over.

use crate::sim::{JointState, Transform, Vec3};

/// State of one instance right after a tick.
#[derive(Debug, Clone, Copy)]
pub struct InstanceSnapshot<'a> {
    /// Index of the instance in the batch.
    pub index: usize,
    /// Joint positions and velocities of the agent.
    pub joints: &'a JointState,
    /// World position of the agent's end effector.
    pub end_effector: Vec3,
    /// World pose of the manipulated object.
    pub object: Transform,
    /// Ticks since the last reset (1 on the first step).
    pub episode_step: u32,
}

/// Pluggable reward/done computation.
pub trait RewardModel {
    /// Called on every environment reset.
    fn reset(&mut self, _num_envs: usize) {}

    /// Returns `(reward, done)` for one instance.
    fn evaluate(&mut self, snapshot: &InstanceSnapshot<'_>) -> (f32, bool);

    /// Returns a human-readable name for this reward model.
    fn name(&self) -> &str;
}

/// Zero reward, episodes never terminate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroReward;

impl RewardModel for ZeroReward {
    fn evaluate(&mut self, _snapshot: &InstanceSnapshot<'_>) -> (f32, bool) {
        (0.0, false)
    }

    fn name(&self) -> &str {
        "zero"
    }
}

/// Dense reaching reward.
///
/// ```text
/// r = -‖p_ee - p_obj‖ + bonus · [‖p_ee - p_obj‖ ≤ tolerance]
/// ```
///
/// The episode ends once the end effector is within `tolerance` of the
/// object, or after `horizon` ticks when a horizon is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachReward {
    /// Success distance in meters.
    pub tolerance: f32,
    /// Added once the end effector is within tolerance.
    pub success_bonus: f32,
    /// Episode length cap in ticks.
    pub horizon: Option<u32>,
}

impl Default for ReachReward {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            success_bonus: 1.0,
            horizon: Some(100),
        }
    }
}

impl RewardModel for ReachReward {
    fn evaluate(&mut self, snapshot: &InstanceSnapshot<'_>) -> (f32, bool) {
        let distance = snapshot.end_effector.distance_to(&snapshot.object.p);
        let reached = distance <= self.tolerance;
        let mut reward = -distance;
        if reached {
            reward += self.success_bonus;
        }
        let timed_out = self
            .horizon
            .is_some_and(|horizon| snapshot.episode_step >= horizon);
        (reward, reached || timed_out)
    }

    fn name(&self) -> &str {
        "reach"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(joints: &JointState, ee: Vec3, step: u32) -> InstanceSnapshot<'_> {
        InstanceSnapshot {
            index: 0,
            joints,
            end_effector: ee,
            object: Transform::at(Vec3::new(0.3, 0.0, 0.05)),
            episode_step: step,
        }
    }

    #[test]
    fn zero_reward_never_terminates() {
        let joints = JointState::zeros(3);
        let mut model = ZeroReward;
        assert_eq!(
            model.evaluate(&snapshot(&joints, Vec3::ZERO, 1000)),
            (0.0, false)
        );
    }

    #[test]
    fn reach_reward_is_negative_distance() {
        let joints = JointState::zeros(3);
        let mut model = ReachReward::default();
        let (reward, done) = model.evaluate(&snapshot(&joints, Vec3::new(0.0, 0.0, 0.05), 1));
        assert!((reward + 0.3).abs() < 1e-6);
        assert!(!done);
    }

    #[test]
    fn reach_reward_terminates_on_success() {
        let joints = JointState::zeros(3);
        let mut model = ReachReward::default();
        let (reward, done) =
            model.evaluate(&snapshot(&joints, Vec3::new(0.31, 0.0, 0.05), 1));
        assert!(done);
        assert!(reward > 0.9);
    }

    #[test]
    fn reach_reward_terminates_at_horizon() {
        let joints = JointState::zeros(3);
        let mut model = ReachReward {
            horizon: Some(5),
            ..ReachReward::default()
        };
        assert!(!model.evaluate(&snapshot(&joints, Vec3::ZERO, 4)).1);
        assert!(model.evaluate(&snapshot(&joints, Vec3::ZERO, 5)).1);
    }
}
