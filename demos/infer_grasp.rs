// Replay the latest trained grasping policy.
//
// Run from the repo root after `train_grasp`:
//   cargo run --example infer_grasp -- --models models --frames 3000
//   cargo run --example infer_grasp -- --headless --rollouts 5
//
// The kinematic backend emulates a viewer that closes after --frames frames.

use std::env;

use graspkit::env::ReachReward;
use graspkit::policy::{Policy, PolicyError};
use graspkit::sim::{AgentAsset, KinematicBackend, SimContext, SimParams};
use graspkit::{
    CheckpointStore, EnvConfig, InferenceConfig, InferenceLoop, PolicyFactory,
    VectorizedEnvironment,
};
use tracing_subscriber::EnvFilter;

fn main() -> graspkit::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let num_envs: usize = arg_value(&args, "--envs")
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);
    let steps: usize = arg_value(&args, "--steps")
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);
    let frames: usize = arg_value(&args, "--frames")
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let rollouts: Option<usize> = arg_value(&args, "--rollouts").and_then(|s| s.parse().ok());
    let models = arg_value(&args, "--models").unwrap_or("models");
    let headless = args.iter().any(|a| a == "--headless");
    let hz: f64 = arg_value(&args, "--hz")
        .and_then(|s| s.parse().ok())
        .unwrap_or(60.0);

    let backend = KinematicBackend::default().with_viewer_frames(frames);
    let mut ctx = SimContext::new(backend, SimParams::default().with_rate(hz))?;
    if !headless {
        ctx = ctx.with_viewer()?;
    }
    let env_config = EnvConfig {
        num_envs,
        ..EnvConfig::default()
    };
    let mut env = VectorizedEnvironment::new(ctx, &env_config, &AgentAsset::six_axis_arm())?
        .with_reward_model(ReachReward::default());

    let mut policy = PolicyFactory::default().create(
        "mlp",
        env.observation_size(),
        env.action_size(),
        env_config.device,
    )?;
    let store = CheckpointStore::new(models, "trained_policy");
    let name = policy.name().to_string();
    let vs = policy
        .parameters_mut()
        .ok_or(PolicyError::NoParameters(name))?;
    let epoch = store.load_latest(vs)?;
    println!("Loaded policy from epoch {epoch}");

    let config = InferenceConfig {
        steps_per_rollout: steps,
        max_rollouts: rollouts.or(headless.then_some(1)),
        ..InferenceConfig::default()
    };
    for summary in InferenceLoop::new(config).run(&mut env, &policy)? {
        println!("{summary}");
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
