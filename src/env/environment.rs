//! Batched multi-instance environment.
//!
//! Presents N independent robot+object scenes as one observe/act/step
//! interface over `tch` tensors.

use tch::{Device, Kind, Tensor};
use tracing::{debug, info, warn};

use super::error::EnvError;
use super::reward::{InstanceSnapshot, RewardModel, ZeroReward};
use crate::config::{EnvConfig, FailurePolicy};
use crate::sim::{
    ActorHandle, AgentAsset, BoxAsset, JointLimit, JointState, SceneBounds, SceneHandle,
    SimContext, SimulationBackend, Transform,
};

/// Engine handles of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instance {
    pub scene: SceneHandle,
    pub agent: ActorHandle,
    pub object: ActorHandle,
}

/// Outcome of batch construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Instances asked for in the configuration.
    pub requested: usize,
    /// Instances actually created.
    pub effective: usize,
    /// Requested indices whose agent could not be created.
    pub failed: Vec<usize>,
}

impl BatchReport {
    /// True when every requested instance was created.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of a single environment step.
#[derive(Debug)]
pub struct StepResult {
    /// Joint positions after the tick, shape `(N, obs_dim)`.
    pub observations: Tensor,
    /// Step reward per instance, shape `(N,)`.
    pub rewards: Tensor,
    /// Episode termination per instance, shape `(N,)`, `Kind::Bool`.
    pub dones: Tensor,
}

/// N parallel grasping scenes behind a single tensor interface.
///
/// Observation and action sizes are derived once from instance 0 and every
/// other instance is checked against them, so tensor shapes stay fixed for
/// the lifetime of the environment.
///
/// # Lifecycle
///
/// 1. Create a [`SimContext`] on a backend.
/// 2. Call [`VectorizedEnvironment::new`] to build the batch.
/// 3. Call [`VectorizedEnvironment::reset`], then repeatedly
///    [`VectorizedEnvironment::step`].
/// 4. Dropping the environment drops the context and releases the engine.
pub struct VectorizedEnvironment<B: SimulationBackend> {
    ctx: SimContext<B>,
    instances: Vec<Instance>,
    limits: Vec<Vec<JointLimit>>,
    report: BatchReport,
    obs_dim: usize,
    act_dim: usize,
    episode_steps: Vec<u32>,
    reward_model: Box<dyn RewardModel>,
    device: Device,
}

impl<B: SimulationBackend> VectorizedEnvironment<B> {
    /// Builds `config.num_envs` instances of `asset` inside `ctx`.
    ///
    /// Each scene receives one agent with a fixed base and one cube object
    /// placed at `config.object_offset` from the agent root. Agent joints
    /// start at zero.
    pub fn new(
        mut ctx: SimContext<B>,
        config: &EnvConfig,
        asset: &AgentAsset,
    ) -> Result<Self, EnvError> {
        if config.num_envs == 0 {
            return Err(EnvError::Configuration(
                "num_envs must be at least 1".to_string(),
            ));
        }

        let mut asset = asset.clone();
        asset.options.fix_base_link = true;
        asset.options.armature = config.armature;
        asset.options.damping = config.damping;
        let object_asset = BoxAsset::cube(config.box_edge);
        let object_pose = Transform::at(config.agent_pose.p + config.object_offset);
        let bounds = SceneBounds::from_spacing(config.spacing);

        let sim = ctx.sim();
        let mut instances = Vec::with_capacity(config.num_envs);
        let mut failed = Vec::new();

        for index in 0..config.num_envs {
            let backend = ctx.backend_mut();
            let scene = backend.create_scene(sim, &bounds)?;
            let agent = match backend.create_agent_actor(
                scene,
                &asset,
                &config.agent_pose,
                &format!("agent_{index}"),
            ) {
                Some(agent) => agent,
                None => match config.on_instance_failure {
                    FailurePolicy::Abort => {
                        return Err(EnvError::Construction {
                            index,
                            reason: format!("backend refused agent asset '{}'", asset.name),
                        });
                    }
                    FailurePolicy::Compact => {
                        warn!(index, asset = %asset.name, "agent creation failed, instance skipped");
                        failed.push(index);
                        continue;
                    }
                },
            };

            let dof = backend.get_joint_state(scene, agent)?.len();
            backend.set_joint_state(scene, agent, &JointState::zeros(dof))?;
            let object = backend.create_object_actor(
                scene,
                &object_asset,
                &object_pose,
                &format!("object_{index}"),
            )?;
            instances.push(Instance {
                scene,
                agent,
                object,
            });
        }

        let Some(first) = instances.first().copied() else {
            return Err(EnvError::Configuration(format!(
                "none of the {} requested instances could be created",
                config.num_envs
            )));
        };

        let obs_dim = ctx.backend().get_joint_state(first.scene, first.agent)?.len();
        let act_dim = ctx.backend().get_joint_limits(first.scene, first.agent)?.len();

        let mut limits = Vec::with_capacity(instances.len());
        for (index, instance) in instances.iter().enumerate() {
            let joints = ctx
                .backend()
                .get_joint_state(instance.scene, instance.agent)?
                .len();
            if joints != obs_dim {
                return Err(EnvError::TopologyMismatch {
                    index,
                    what: "joint-state entries",
                    expected: obs_dim,
                    actual: joints,
                });
            }
            let instance_limits = ctx
                .backend()
                .get_joint_limits(instance.scene, instance.agent)?;
            if instance_limits.len() != act_dim {
                return Err(EnvError::TopologyMismatch {
                    index,
                    what: "controllable joints",
                    expected: act_dim,
                    actual: instance_limits.len(),
                });
            }
            limits.push(instance_limits);
        }

        let report = BatchReport {
            requested: config.num_envs,
            effective: instances.len(),
            failed,
        };
        info!(
            requested = report.requested,
            effective = report.effective,
            obs_dim,
            act_dim,
            "vectorized environment ready"
        );

        Ok(Self {
            episode_steps: vec![0; instances.len()],
            ctx,
            instances,
            limits,
            report,
            obs_dim,
            act_dim,
            reward_model: Box::new(ZeroReward),
            device: config.device,
        })
    }

    /// Replaces the reward model (default: [`ZeroReward`]).
    pub fn with_reward_model(mut self, model: impl RewardModel + 'static) -> Self {
        self.reward_model = Box::new(model);
        self
    }

    /// Joint-state entries per instance.
    pub fn observation_size(&self) -> usize {
        self.obs_dim
    }

    /// Controllable joints per instance.
    pub fn action_size(&self) -> usize {
        self.act_dim
    }

    /// Effective number of instances.
    pub fn num_envs(&self) -> usize {
        self.instances.len()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn reward_model(&self) -> &dyn RewardModel {
        self.reward_model.as_ref()
    }

    pub fn context(&self) -> &SimContext<B> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimContext<B> {
        &mut self.ctx
    }

    /// Puts every instance back at zero joint positions and velocities.
    ///
    /// Returns a zero observation tensor of shape `(N, obs_dim)`.
    pub fn reset(&mut self) -> Result<Tensor, EnvError> {
        let zeros = JointState::zeros(self.obs_dim);
        let backend = self.ctx.backend_mut();
        for instance in &self.instances {
            backend.set_joint_state(instance.scene, instance.agent, &zeros)?;
        }
        self.episode_steps.fill(0);
        self.reward_model.reset(self.instances.len());
        debug!(num_envs = self.instances.len(), "environment reset");

        Ok(Tensor::zeros(
            [self.instances.len() as i64, self.obs_dim as i64],
            (Kind::Float, self.device),
        ))
    }

    /// Applies one batch of actions and advances the simulation by one tick.
    ///
    /// `actions` must have shape `(N, act_dim)` with values in `[-1, 1]`;
    /// each value is mapped onto its joint's limit range and sent as a
    /// position target. The shape is checked before any backend call.
    pub fn step(&mut self, actions: &Tensor) -> Result<StepResult, EnvError> {
        let expected = vec![self.instances.len() as i64, self.act_dim as i64];
        let actual = actions.size();
        if actual != expected {
            return Err(EnvError::ContractViolation { expected, actual });
        }

        let flat = Vec::<f32>::try_from(
            &actions
                .detach()
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .flatten(0, -1),
        )?;
        let targets: Vec<Vec<f32>> = flat
            .chunks(self.act_dim.max(1))
            .zip(&self.limits)
            .map(|(row, limits)| {
                row.iter()
                    .zip(limits)
                    .map(|(action, limit)| limit.scale(*action))
                    .collect()
            })
            .collect();

        let backend = self.ctx.backend_mut();
        for (instance, target) in self.instances.iter().zip(&targets) {
            backend.set_joint_targets(instance.scene, instance.agent, target)?;
        }
        self.ctx.advance()?;

        let n = self.instances.len();
        let mut observations = Vec::with_capacity(n * self.obs_dim);
        let mut rewards = Vec::with_capacity(n);
        let mut dones = Vec::with_capacity(n);

        let backend = self.ctx.backend();
        for (index, instance) in self.instances.iter().enumerate() {
            let joints = backend.get_joint_state(instance.scene, instance.agent)?;
            let end_effector = backend.end_effector_position(instance.scene, instance.agent)?;
            let object = backend.get_actor_pose(instance.scene, instance.object)?;
            self.episode_steps[index] += 1;

            let (reward, done) = self.reward_model.evaluate(&InstanceSnapshot {
                index,
                joints: &joints,
                end_effector,
                object,
                episode_step: self.episode_steps[index],
            });
            self.push_row(&mut observations, index, &joints)?;
            rewards.push(reward);
            dones.push(done);
        }

        Ok(StepResult {
            observations: self.to_batch(&observations),
            rewards: Tensor::from_slice(&rewards).to_device(self.device),
            dones: Tensor::from_slice(&dones).to_device(self.device),
        })
    }

    /// Reads current joint positions without advancing the simulation.
    pub fn get_observation(&self) -> Result<Tensor, EnvError> {
        let backend = self.ctx.backend();
        let mut observations = Vec::with_capacity(self.instances.len() * self.obs_dim);
        for (index, instance) in self.instances.iter().enumerate() {
            let joints = backend.get_joint_state(instance.scene, instance.agent)?;
            self.push_row(&mut observations, index, &joints)?;
        }
        Ok(self.to_batch(&observations))
    }

    /// Appends one instance's joint positions, rejecting rows whose length
    /// drifted from the size fixed at construction.
    fn push_row(
        &self,
        observations: &mut Vec<f32>,
        index: usize,
        joints: &JointState,
    ) -> Result<(), EnvError> {
        if joints.len() != self.obs_dim {
            return Err(EnvError::TopologyMismatch {
                index,
                what: "joint-state entries",
                expected: self.obs_dim,
                actual: joints.len(),
            });
        }
        observations.extend_from_slice(&joints.positions);
        Ok(())
    }

    fn to_batch(&self, values: &[f32]) -> Tensor {
        Tensor::from_slice(values)
            .reshape([self.instances.len() as i64, self.obs_dim as i64])
            .to_device(self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ReachReward;
    use crate::sim::{KinematicBackend, MockBackend, SimParams};

    fn mock_env(num_envs: usize, backend: MockBackend) -> VectorizedEnvironment<MockBackend> {
        let ctx = SimContext::new(backend, SimParams::default()).unwrap();
        let config = EnvConfig {
            num_envs,
            ..EnvConfig::default()
        };
        VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()).unwrap()
    }

    #[test]
    fn sizes_come_from_first_instance() {
        let env = mock_env(4, MockBackend::new(6, 3));
        assert_eq!(env.observation_size(), 6);
        assert_eq!(env.action_size(), 3);
        assert_eq!(env.num_envs(), 4);
        assert!(env.report().is_complete());
    }

    #[test]
    fn construction_zeroes_joints_and_places_objects() {
        let backend = MockBackend::new(6, 3);
        let log = backend.log();
        let env = mock_env(3, backend);
        let log = log.borrow();
        assert_eq!(log.scenes_created, 3);
        assert_eq!(log.objects_created, 3);
        assert_eq!(log.set_state_calls, 3);
        drop(log);

        let instance = env.instances()[0];
        let pose = env
            .context()
            .backend()
            .get_actor_pose(instance.scene, instance.object)
            .unwrap();
        assert!((pose.p.x - 0.3).abs() < 1e-6);
        assert!((pose.p.z - 0.05).abs() < 1e-6);
    }

    #[test]
    fn reset_is_zero_and_idempotent() {
        let mut env = mock_env(4, MockBackend::new(6, 3));
        let first = env.reset().unwrap();
        let second = env.reset().unwrap();
        assert_eq!(first.size(), vec![4, 6]);
        assert!(first.equal(&second));
        assert_eq!(first.abs().sum(Kind::Float).double_value(&[]), 0.0);
    }

    #[test]
    fn step_shapes() {
        let mut env = mock_env(4, MockBackend::new(6, 3));
        env.reset().unwrap();
        let actions = Tensor::full([4, 3], 0.5, (Kind::Float, Device::Cpu));
        let result = env.step(&actions).unwrap();
        assert_eq!(result.observations.size(), vec![4, 6]);
        assert_eq!(result.rewards.size(), vec![4]);
        assert_eq!(result.dones.size(), vec![4]);
        assert_eq!(result.dones.kind(), Kind::Bool);
    }

    #[test]
    fn step_writes_scaled_targets() {
        let mut env = mock_env(2, MockBackend::new(3, 3));
        env.reset().unwrap();
        let actions = Tensor::from_slice(&[0.5f32, -0.5, 2.0, 0.0, 0.25, -1.0]).reshape([2, 3]);
        let result = env.step(&actions).unwrap();
        let obs = Vec::<f32>::try_from(&result.observations.flatten(0, -1)).unwrap();
        // Mock limits are [-1, 1]; out-of-range actions are clamped.
        assert_eq!(obs, vec![0.5, -0.5, 1.0, 0.0, 0.25, -1.0]);
    }

    #[test]
    fn malformed_actions_do_not_touch_backend() {
        let backend = MockBackend::new(6, 3);
        let log = backend.log();
        let mut env = mock_env(4, backend);
        let before = log.borrow().clone();

        for shape in [[4i64, 2], [3, 3], [4, 4]] {
            let actions = Tensor::zeros(shape, (Kind::Float, Device::Cpu));
            let err = env.step(&actions).unwrap_err();
            assert!(matches!(err, EnvError::ContractViolation { .. }));
        }

        let after = log.borrow();
        assert_eq!(after.set_target_calls, before.set_target_calls);
        assert_eq!(after.advance_calls, before.advance_calls);
    }

    #[test]
    fn get_observation_does_not_advance() {
        let backend = MockBackend::new(6, 3);
        let log = backend.log();
        let env = mock_env(2, backend);
        let obs = env.get_observation().unwrap();
        assert_eq!(obs.size(), vec![2, 6]);
        assert_eq!(log.borrow().advance_calls, 0);
    }

    #[test]
    fn abort_policy_fails_construction() {
        let ctx = SimContext::new(MockBackend::new(6, 3).failing_agents(&[1]), SimParams::default())
            .unwrap();
        let config = EnvConfig {
            num_envs: 3,
            ..EnvConfig::default()
        };
        let err = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm())
            .err()
            .unwrap();
        assert!(matches!(err, EnvError::Construction { index: 1, .. }));
    }

    #[test]
    fn compact_policy_shrinks_batch() {
        let ctx = SimContext::new(
            MockBackend::new(6, 3).failing_agents(&[0, 2]),
            SimParams::default(),
        )
        .unwrap();
        let config = EnvConfig {
            num_envs: 4,
            on_instance_failure: FailurePolicy::Compact,
            ..EnvConfig::default()
        };
        let mut env =
            VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()).unwrap();
        assert_eq!(env.num_envs(), 2);
        assert_eq!(
            env.report(),
            &BatchReport {
                requested: 4,
                effective: 2,
                failed: vec![0, 2],
            }
        );
        assert_eq!(env.reset().unwrap().size(), vec![2, 6]);
    }

    #[test]
    fn compact_with_no_survivors_is_a_configuration_error() {
        let ctx = SimContext::new(
            MockBackend::new(6, 3).failing_agents(&[0, 1]),
            SimParams::default(),
        )
        .unwrap();
        let config = EnvConfig {
            num_envs: 2,
            on_instance_failure: FailurePolicy::Compact,
            ..EnvConfig::default()
        };
        let err = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm())
            .err()
            .unwrap();
        assert!(matches!(err, EnvError::Configuration(_)));
    }

    #[test]
    fn heterogeneous_topology_is_rejected() {
        let ctx = SimContext::new(
            MockBackend::new(6, 3).with_joint_override(2, 7),
            SimParams::default(),
        )
        .unwrap();
        let config = EnvConfig {
            num_envs: 3,
            ..EnvConfig::default()
        };
        let err = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            EnvError::TopologyMismatch {
                index: 2,
                expected: 6,
                actual: 7,
                ..
            }
        ));
    }

    #[test]
    fn zero_instances_is_a_configuration_error() {
        let ctx = SimContext::new(MockBackend::new(6, 3), SimParams::default()).unwrap();
        let config = EnvConfig {
            num_envs: 0,
            ..EnvConfig::default()
        };
        assert!(matches!(
            VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()),
            Err(EnvError::Configuration(_))
        ));
    }

    #[test]
    fn backend_failure_propagates() {
        let mut env = mock_env(2, MockBackend::new(6, 3).failing_advance_at(1));
        let actions = Tensor::zeros([2, 3], (Kind::Float, Device::Cpu));
        assert!(matches!(env.step(&actions), Err(EnvError::Backend(_))));
    }

    #[test]
    fn joint_count_drift_is_reported_not_panicked() {
        let mut env = mock_env(2, MockBackend::new(6, 3).growing_joints_at(1));
        let actions = Tensor::zeros([2, 3], (Kind::Float, Device::Cpu));
        assert!(matches!(
            env.step(&actions),
            Err(EnvError::TopologyMismatch {
                index: 0,
                expected: 6,
                actual: 7,
                ..
            })
        ));
        assert!(matches!(
            env.get_observation(),
            Err(EnvError::TopologyMismatch { actual: 7, .. })
        ));
    }

    #[test]
    fn kinematic_arm_reports_reach_reward() {
        let ctx = SimContext::new(KinematicBackend::default(), SimParams::default()).unwrap();
        let config = EnvConfig {
            num_envs: 2,
            ..EnvConfig::default()
        };
        let mut env = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm())
            .unwrap()
            .with_reward_model(ReachReward::default());
        assert_eq!(env.observation_size(), 8);
        assert_eq!(env.action_size(), 8);

        env.reset().unwrap();
        let actions = Tensor::zeros([2, 8], (Kind::Float, Device::Cpu));
        let result = env.step(&actions).unwrap();
        let rewards = Vec::<f32>::try_from(&result.rewards).unwrap();
        assert!(rewards.iter().all(|r| *r < 0.0));
    }
}
