//! End-to-end scenarios over the mock backend.

use std::cell::Cell;
use std::fs;
use std::path::PathBuf;

use graspkit::env::EnvError;
use graspkit::policy::{MlpPolicy, Policy, PolicyError, RandomPolicy};
use graspkit::sim::{AgentAsset, MockBackend, SimContext, SimParams};
use graspkit::{
    create_policy, CheckpointError, CheckpointStore, EnvConfig, Error, FailurePolicy,
    InferenceConfig, InferenceLoop, TrainingConfig, TrainingLoop, VectorizedEnvironment,
};
use tch::{nn, Device, Kind, Tensor};

fn build_env(num_envs: usize, backend: MockBackend) -> VectorizedEnvironment<MockBackend> {
    let ctx = SimContext::new(backend, SimParams::default()).unwrap();
    let config = EnvConfig {
        num_envs,
        ..EnvConfig::default()
    };
    VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()).unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("graspkit-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn ten_epochs_of_five_steps_advance_fifty_times() {
    let backend = MockBackend::new(6, 3);
    let log = backend.log();
    let mut env = build_env(4, backend);
    assert_eq!(env.observation_size(), 6);
    assert_eq!(env.action_size(), 3);

    let mut policy = create_policy("mlp", 6, 3, Device::Cpu).unwrap();
    let curve = TrainingLoop::new(TrainingConfig {
        epochs: 10,
        steps_per_epoch: 5,
        save_every: None,
        ..TrainingConfig::default()
    })
    .run(&mut env, &mut policy)
    .unwrap();

    assert_eq!(curve.len(), 10);
    assert_eq!(log.borrow().advance_calls, 50);
}

#[test]
fn reset_is_zero_and_idempotent_for_any_batch_size() {
    for n in [1, 2, 7] {
        let mut env = build_env(n, MockBackend::new(6, 3));
        let actions = Tensor::full([n as i64, 3], 0.7, (Kind::Float, Device::Cpu));
        env.step(&actions).unwrap();

        let first = env.reset().unwrap();
        let second = env.reset().unwrap();
        assert_eq!(first.size(), vec![n as i64, 6]);
        assert!(first.equal(&second));
        assert_eq!(first.abs().sum(Kind::Float).double_value(&[]), 0.0);
        // The backend really was zeroed, not just the returned tensor.
        assert!(env.get_observation().unwrap().equal(&first));
    }
}

#[test]
fn step_returns_batched_shapes() {
    let mut env = build_env(4, MockBackend::new(6, 3));
    env.reset().unwrap();
    let actions = Tensor::rand([4, 3], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
    let result = env.step(&actions).unwrap();
    assert_eq!(result.observations.size(), vec![4, 6]);
    assert_eq!(result.rewards.size(), vec![4]);
    assert_eq!(result.dones.size(), vec![4]);
}

#[test]
fn malformed_actions_fail_without_mutation() {
    let backend = MockBackend::new(6, 3);
    let log = backend.log();
    let mut env = build_env(4, backend);
    env.reset().unwrap();
    let before = env.get_observation().unwrap();
    let targets_before = log.borrow().set_target_calls;

    for shape in [vec![5i64, 3], vec![4, 2], vec![4], vec![4, 3, 1]] {
        let actions = Tensor::ones(shape.as_slice(), (Kind::Float, Device::Cpu));
        let err = env.step(&actions).unwrap_err();
        match err {
            EnvError::ContractViolation { expected, actual } => {
                assert_eq!(expected, vec![4, 3]);
                assert_eq!(actual, shape);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    assert_eq!(log.borrow().set_target_calls, targets_before);
    assert_eq!(log.borrow().advance_calls, 0);
    assert!(env.get_observation().unwrap().equal(&before));
}

#[test]
fn act_is_bounded_and_detached() {
    let policy = MlpPolicy::new(6, 3, Device::Cpu);
    for _ in 0..1000 {
        let obs = Tensor::randn([8, 6], (Kind::Float, Device::Cpu)) * 10.0;
        let actions = policy.act(&obs);
        assert!(!actions.requires_grad());
        assert!(actions.max().double_value(&[]) <= 1.0);
        assert!(actions.min().double_value(&[]) >= -1.0);
    }
}

#[test]
fn factory_builds_mlp_and_rejects_unknown() {
    let policy = create_policy("mlp", 12, 6, Device::Cpu).unwrap();
    for n in [1, 3, 16] {
        let obs = Tensor::zeros([n, 12], (Kind::Float, Device::Cpu));
        assert_eq!(policy.forward(&obs).size(), vec![n, 6]);
    }
    assert!(matches!(
        create_policy("unknown", 1, 1, Device::Cpu),
        Err(PolicyError::UnsupportedVariant(_))
    ));
}

/// MLP wrapper whose third `forward` call returns NaN everywhere.
struct NanOnThirdCall {
    inner: MlpPolicy,
    calls: Cell<usize>,
}

impl Policy for NanOnThirdCall {
    fn forward(&self, observations: &Tensor) -> Tensor {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        let actions = self.inner.forward(observations);
        if call == 3 {
            actions.full_like(f64::NAN)
        } else {
            actions
        }
    }

    fn parameters(&self) -> Option<&nn::VarStore> {
        self.inner.parameters()
    }

    fn parameters_mut(&mut self) -> Option<&mut nn::VarStore> {
        self.inner.parameters_mut()
    }

    fn name(&self) -> &str {
        "nan_on_third_call"
    }
}

#[test]
fn nan_on_third_call_is_repaired_not_raised() {
    let backend = MockBackend::new(3, 3);
    let mut env = build_env(2, backend);
    let policy = NanOnThirdCall {
        inner: MlpPolicy::new(3, 3, Device::Cpu),
        calls: Cell::new(0),
    };

    let summaries = InferenceLoop::new(InferenceConfig {
        steps_per_rollout: 5,
        max_rollouts: Some(1),
        ..InferenceConfig::default()
    })
    .run(&mut env, &policy)
    .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(policy.calls.get(), 5);

    // The mock snaps joints to their targets, so the repaired zero actions of
    // call 3 would be visible as zero positions; later calls overwrite them.
    let obs = env.get_observation().unwrap();
    assert!(graspkit::policy::all_finite(&obs));
}

#[test]
fn repaired_actions_are_zero() {
    let mut guard = graspkit::policy::AnomalyGuard::new(5);
    let nan = Tensor::full([2, 3], f64::NAN, (Kind::Float, Device::Cpu));
    let repaired = guard.inspect(nan).unwrap();
    assert_eq!(repaired.abs().sum(Kind::Float).double_value(&[]), 0.0);
}

#[test]
fn compact_reports_failed_instances() {
    let ctx = SimContext::new(
        MockBackend::new(6, 3).failing_agents(&[1, 3]),
        SimParams::default(),
    )
    .unwrap();
    let config = EnvConfig {
        num_envs: 5,
        on_instance_failure: FailurePolicy::Compact,
        ..EnvConfig::default()
    };
    let mut env = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()).unwrap();
    assert_eq!(env.num_envs(), 3);
    assert_eq!(env.report().failed, vec![1, 3]);

    let actions = Tensor::zeros([3, 3], (Kind::Float, Device::Cpu));
    assert_eq!(env.step(&actions).unwrap().observations.size(), vec![3, 6]);
}

#[test]
fn abort_fails_on_first_refused_instance() {
    let backend = MockBackend::new(6, 3).failing_agents(&[2]);
    let log = backend.log();
    let ctx = SimContext::new(backend, SimParams::default()).unwrap();
    let config = EnvConfig {
        num_envs: 5,
        ..EnvConfig::default()
    };
    let result = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm());
    assert!(matches!(result, Err(EnvError::Construction { index: 2, .. })));
    assert_eq!(log.borrow().agent_attempts, 3);
    // The context was dropped with the failed construction.
    assert_eq!(log.borrow().sims_destroyed, 1);
}

#[test]
fn heterogeneous_instances_are_rejected() {
    let ctx = SimContext::new(
        MockBackend::new(6, 3).with_joint_override(1, 4),
        SimParams::default(),
    )
    .unwrap();
    let config = EnvConfig {
        num_envs: 3,
        ..EnvConfig::default()
    };
    assert!(matches!(
        VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()),
        Err(EnvError::TopologyMismatch { index: 1, .. })
    ));
}

#[test]
fn training_checkpoints_and_resumes() {
    let dir = scratch_dir("resume");
    let store = CheckpointStore::new(&dir, "policy");

    let mut env = build_env(2, MockBackend::new(6, 3));
    let mut policy = create_policy("mlp", 6, 3, Device::Cpu).unwrap();
    let curve = TrainingLoop::new(TrainingConfig {
        epochs: 5,
        steps_per_epoch: 2,
        save_every: Some(2),
        ..TrainingConfig::default()
    })
    .with_checkpoints(store.clone())
    .run(&mut env, &mut policy)
    .unwrap();

    let saved: Vec<usize> = curve
        .iter()
        .filter(|s| s.checkpoint.is_some())
        .map(|s| s.epoch)
        .collect();
    assert_eq!(saved, vec![2, 4, 5]);
    assert_eq!(store.latest().unwrap().0, 5);

    let mut resumed = create_policy("mlp", 6, 3, Device::Cpu).unwrap();
    let curve = TrainingLoop::new(TrainingConfig {
        epochs: 2,
        steps_per_epoch: 2,
        save_every: None,
        ..TrainingConfig::default()
    })
    .resume_from(store.clone())
    .run(&mut env, &mut resumed)
    .unwrap();
    assert_eq!(
        curve.iter().map(|s| s.epoch).collect::<Vec<_>>(),
        vec![6, 7]
    );
    assert_eq!(store.latest().unwrap().0, 7);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn resume_without_checkpoint_is_fatal() {
    let dir = scratch_dir("missing");
    let mut env = build_env(1, MockBackend::new(6, 3));
    let mut policy = create_policy("mlp", 6, 3, Device::Cpu).unwrap();
    let err = TrainingLoop::new(TrainingConfig::default())
        .resume_from(CheckpointStore::new(&dir, "policy"))
        .run(&mut env, &mut policy)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Checkpoint(CheckpointError::NotFound { .. })
    ));
    assert_eq!(env.context().backend().log().borrow().advance_calls, 0);
}

#[test]
fn random_policy_cannot_be_trained() {
    let mut env = build_env(2, MockBackend::new(6, 3));
    let mut policy = RandomPolicy::new(3);
    assert!(matches!(
        TrainingLoop::new(TrainingConfig::default()).run(&mut env, &mut policy),
        Err(Error::Policy(PolicyError::NoParameters(_)))
    ));
}

#[test]
fn dropping_environment_releases_engine_once() {
    let backend = MockBackend::new(6, 3).with_viewer_frames(1);
    let log = backend.log();
    {
        let ctx = SimContext::new(backend, SimParams::default())
            .unwrap()
            .with_viewer()
            .unwrap();
        let config = EnvConfig {
            num_envs: 2,
            ..EnvConfig::default()
        };
        let _env = VectorizedEnvironment::new(ctx, &config, &AgentAsset::six_axis_arm()).unwrap();
    }
    assert_eq!(log.borrow().viewers_destroyed, 1);
    assert_eq!(log.borrow().sims_destroyed, 1);
}
