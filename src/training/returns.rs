//! Discounted returns for batched rollouts.

/// Computes per-instance discounted returns.
///
/// `rewards` and `dones` are step-major with `num_envs` entries per step.
/// Each instance is discounted independently and its return is cut at every
/// step flagged `done`:
///
/// ```text
/// G_t = r_t + γ · (1 - done_t) · G_{t+1}
/// ```
///
/// # Arguments
///
/// * `rewards` - Per-step, per-instance rewards
/// * `dones` - Per-step, per-instance episode termination flags
/// * `num_envs` - Number of instances per step
/// * `gamma` - Discount factor
pub fn discounted_returns(rewards: &[f32], dones: &[bool], num_envs: usize, gamma: f32) -> Vec<f32> {
    assert_eq!(rewards.len(), dones.len());
    if num_envs == 0 {
        return Vec::new();
    }
    assert_eq!(rewards.len() % num_envs, 0);

    let steps = rewards.len() / num_envs;
    let mut returns = vec![0.0; rewards.len()];
    let mut running = vec![0.0_f32; num_envs];

    for t in (0..steps).rev() {
        for (i, g) in running.iter_mut().enumerate() {
            let idx = t * num_envs + i;
            let next_non_terminal = if dones[idx] { 0.0 } else { 1.0 };
            *g = rewards[idx] + gamma * next_non_terminal * *g;
            returns[idx] = *g;
        }
    }

    returns
}
