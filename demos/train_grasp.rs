// Train a grasping policy on the software kinematic backend.
//
// Run from the repo root:
//   cargo run --example train_grasp -- --envs 10 --epochs 100 --steps 100
//   cargo run --example train_grasp -- --resume --models models
//
// Logging is controlled with RUST_LOG (e.g. RUST_LOG=graspkit=debug).

use std::env;

use graspkit::env::ReachReward;
use graspkit::sim::{AgentAsset, KinematicBackend, SimContext, SimParams};
use graspkit::{
    CheckpointStore, EnvConfig, PolicyFactory, TrainingConfig, TrainingLoop,
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
    let epochs: usize = arg_value(&args, "--epochs")
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);
    let steps: usize = arg_value(&args, "--steps")
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);
    let seed: Option<u64> = arg_value(&args, "--seed").and_then(|s| s.parse().ok());
    let policy_name = arg_value(&args, "--policy").unwrap_or("mlp");
    let models = arg_value(&args, "--models").unwrap_or("models");
    let resume = args.iter().any(|a| a == "--resume");
    let hz: f64 = arg_value(&args, "--hz")
        .and_then(|s| s.parse().ok())
        .unwrap_or(60.0);

    let ctx = SimContext::new(
        KinematicBackend::default(),
        SimParams::default().with_rate(hz),
    )?;
    let env_config = EnvConfig {
        num_envs,
        ..EnvConfig::default()
    };
    let mut env = VectorizedEnvironment::new(ctx, &env_config, &AgentAsset::six_axis_arm())?
        .with_reward_model(ReachReward::default());

    let factory = match seed {
        Some(seed) => PolicyFactory::default().with_seed(seed),
        None => PolicyFactory::default(),
    };
    let mut policy = factory.create(
        policy_name,
        env.observation_size(),
        env.action_size(),
        env_config.device,
    )?;

    let config = TrainingConfig {
        epochs,
        steps_per_epoch: steps,
        seed: seed.map(|s| s as i64),
        ..TrainingConfig::default()
    };
    let store = CheckpointStore::new(models, "trained_policy");
    let trainer = if resume {
        TrainingLoop::new(config).resume_from(store)
    } else {
        TrainingLoop::new(config).with_checkpoints(store)
    };

    let curve = trainer.run(&mut env, &mut policy)?;
    if let (Some(first), Some(last)) = (curve.first(), curve.last()) {
        println!(
            "Trained {} epochs: mean reward {:.3} -> {:.3}",
            curve.len(),
            first.mean_reward,
            last.mean_reward
        );
        if let Some(path) = &last.checkpoint {
            println!("Latest checkpoint: {}", path.display());
        }
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
