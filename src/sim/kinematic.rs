//! Software kinematic simulator.
//!
//! Joints track their position targets with a damped spring:
//!
//! ```text
//! a = k (q* - q) - (c + c_joint) q̇
//! q̇ ← q̇ + a Δt / (1 + armature)
//! q ← clamp(q + q̇ Δt, limits)
//! ```
//!
//! Objects are static. The end effector is obtained from planar forward
//! kinematics: joint 0 yaws the arm around Z, the remaining joints pitch it
//! in its vertical plane.

use tracing::trace;

use super::error::BackendError;
use super::types::{
    ActorHandle, AgentAsset, BoxAsset, JointLimit, JointState, SceneBounds, SceneHandle,
    SimHandle, SimParams, Transform, Vec3, ViewerHandle,
};
use super::SimulationBackend;

/// Tuning for the joint tracking dynamics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicConfig {
    /// Spring gain `k` pulling joints toward their targets.
    pub stiffness: f32,
    /// Drive damping `c`, added to each joint's own damping.
    pub damping: f32,
    /// Velocity cap applied after integration (rad/s or m/s).
    pub max_joint_speed: f32,
}

impl Default for KinematicConfig {
    fn default() -> Self {
        Self {
            stiffness: 400.0,
            damping: 40.0,
            max_joint_speed: 6.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Arm {
    base: Transform,
    limits: Vec<JointLimit>,
    link_lengths: Vec<f32>,
    damping: f32,
    armature: f32,
    state: JointState,
    targets: Vec<f32>,
}

impl Arm {
    fn integrate(&mut self, dt: f32, config: &KinematicConfig) {
        let inertia = 1.0 + self.armature;
        for i in 0..self.limits.len() {
            let q = self.state.positions[i];
            let qd = self.state.velocities[i];
            let acc = config.stiffness * (self.targets[i] - q) - (config.damping + self.damping) * qd;
            let qd = (qd + acc * dt / inertia).clamp(-config.max_joint_speed, config.max_joint_speed);
            let limit = self.limits[i];
            let next = limit.clamp(q + qd * dt);
            // Hitting a limit kills the velocity component pushing into it.
            self.state.velocities[i] = if next == q + qd * dt { qd } else { 0.0 };
            self.state.positions[i] = next;
        }
    }

    fn end_effector(&self) -> Vec3 {
        let q = &self.state.positions;
        let yaw = q.first().copied().unwrap_or(0.0);
        let mut reach = 0.0_f32;
        let mut height = self.link_lengths.first().copied().unwrap_or(0.0);
        let mut pitch = 0.0_f32;
        for (angle, length) in q.iter().zip(&self.link_lengths).skip(1) {
            pitch += angle;
            reach += length * pitch.cos();
            height += length * pitch.sin();
        }
        self.base.p + Vec3::new(reach * yaw.cos(), reach * yaw.sin(), height)
    }
}

#[derive(Debug, Clone)]
enum Actor {
    Arm(Arm),
    Body(Transform),
}

#[derive(Debug, Clone)]
struct Scene {
    sim: SimHandle,
    actors: Vec<Actor>,
}

#[derive(Debug, Clone)]
struct Sim {
    dt: f32,
    substeps: u32,
    alive: bool,
}

/// Headless software backend. An optional frame budget emulates a viewer
/// that the user closes after a number of frames.
#[derive(Debug, Clone, Default)]
pub struct KinematicBackend {
    config: KinematicConfig,
    sims: Vec<Sim>,
    scenes: Vec<Scene>,
    viewer_budget: Option<usize>,
    frames: usize,
}

impl KinematicBackend {
    pub fn new(config: KinematicConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Emulated viewer that reports closed after `frames` rendered frames.
    pub fn with_viewer_frames(mut self, frames: usize) -> Self {
        self.viewer_budget = Some(frames);
        self
    }

    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> usize {
        self.frames
    }

    fn sim(&self, sim: SimHandle) -> Result<&Sim, BackendError> {
        self.sims
            .get(sim.0)
            .filter(|s| s.alive)
            .ok_or(BackendError::UnknownSim(sim))
    }

    fn actor(&self, scene: SceneHandle, actor: ActorHandle) -> Result<&Actor, BackendError> {
        self.scenes
            .get(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?
            .actors
            .get(actor.0)
            .ok_or(BackendError::UnknownActor { scene, actor })
    }

    fn arm(&self, scene: SceneHandle, actor: ActorHandle) -> Result<&Arm, BackendError> {
        match self.actor(scene, actor)? {
            Actor::Arm(arm) => Ok(arm),
            Actor::Body(_) => Err(BackendError::NotArticulated { scene, actor }),
        }
    }

    fn arm_mut(&mut self, scene: SceneHandle, actor: ActorHandle) -> Result<&mut Arm, BackendError> {
        let actor_ref = self
            .scenes
            .get_mut(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?
            .actors
            .get_mut(actor.0)
            .ok_or(BackendError::UnknownActor { scene, actor })?;
        match actor_ref {
            Actor::Arm(arm) => Ok(arm),
            Actor::Body(_) => Err(BackendError::NotArticulated { scene, actor }),
        }
    }

    fn push_actor(&mut self, scene: SceneHandle, actor: Actor) -> Result<ActorHandle, BackendError> {
        let s = self
            .scenes
            .get_mut(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?;
        s.actors.push(actor);
        Ok(ActorHandle(s.actors.len() - 1))
    }
}

impl SimulationBackend for KinematicBackend {
    fn create_sim(&mut self, params: &SimParams) -> Result<SimHandle, BackendError> {
        let dt = params.dt.value() as f32;
        if dt.is_nan() || dt <= 0.0 {
            return Err(BackendError::Engine(format!("invalid time step {dt}")));
        }
        self.sims.push(Sim {
            dt,
            substeps: params.substeps.max(1),
            alive: true,
        });
        Ok(SimHandle(self.sims.len() - 1))
    }

    fn destroy_sim(&mut self, sim: SimHandle) {
        if let Some(s) = self.sims.get_mut(sim.0) {
            s.alive = false;
        }
        for scene in self.scenes.iter_mut().filter(|scene| scene.sim == sim) {
            scene.actors.clear();
        }
    }

    fn create_scene(
        &mut self,
        sim: SimHandle,
        _bounds: &SceneBounds,
    ) -> Result<SceneHandle, BackendError> {
        self.sim(sim)?;
        self.scenes.push(Scene {
            sim,
            actors: Vec::new(),
        });
        Ok(SceneHandle(self.scenes.len() - 1))
    }

    fn create_agent_actor(
        &mut self,
        scene: SceneHandle,
        asset: &AgentAsset,
        pose: &Transform,
        name: &str,
    ) -> Option<ActorHandle> {
        let dof = asset.dof_count();
        if dof == 0 || asset.link_lengths.len() != dof {
            trace!(name, dof, "rejecting malformed agent asset");
            return None;
        }
        let arm = Arm {
            base: *pose,
            limits: asset.joint_limits.clone(),
            link_lengths: asset.link_lengths.clone(),
            damping: asset.options.damping,
            armature: asset.options.armature,
            state: JointState::zeros(dof),
            targets: vec![0.0; dof],
        };
        self.push_actor(scene, Actor::Arm(arm)).ok()
    }

    fn create_object_actor(
        &mut self,
        scene: SceneHandle,
        _asset: &BoxAsset,
        pose: &Transform,
        _name: &str,
    ) -> Result<ActorHandle, BackendError> {
        self.push_actor(scene, Actor::Body(*pose))
    }

    fn get_joint_state(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<JointState, BackendError> {
        Ok(self.arm(scene, actor)?.state.clone())
    }

    /// Also re-targets every joint to the written position so the arm holds
    /// the new state instead of springing back.
    fn set_joint_state(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
        state: &JointState,
    ) -> Result<(), BackendError> {
        let arm = self.arm_mut(scene, actor)?;
        let dof = arm.limits.len();
        if state.positions.len() != dof || state.velocities.len() != dof {
            return Err(BackendError::DofMismatch {
                expected: dof,
                actual: state.positions.len(),
            });
        }
        arm.state = state.clone();
        arm.targets.copy_from_slice(&state.positions);
        Ok(())
    }

    fn set_joint_targets(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
        targets: &[f32],
    ) -> Result<(), BackendError> {
        let arm = self.arm_mut(scene, actor)?;
        if targets.len() != arm.limits.len() {
            return Err(BackendError::DofMismatch {
                expected: arm.limits.len(),
                actual: targets.len(),
            });
        }
        for ((slot, target), limit) in arm.targets.iter_mut().zip(targets).zip(&arm.limits) {
            *slot = limit.clamp(*target);
        }
        Ok(())
    }

    fn get_joint_limits(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Vec<JointLimit>, BackendError> {
        Ok(self.arm(scene, actor)?.limits.clone())
    }

    fn get_actor_pose(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Transform, BackendError> {
        match self.actor(scene, actor)? {
            Actor::Arm(arm) => Ok(arm.base),
            Actor::Body(pose) => Ok(*pose),
        }
    }

    fn end_effector_position(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Vec3, BackendError> {
        Ok(self.arm(scene, actor)?.end_effector())
    }

    fn advance(&mut self, sim: SimHandle) -> Result<(), BackendError> {
        let (dt, substeps) = {
            let s = self.sim(sim)?;
            (s.dt / s.substeps as f32, s.substeps)
        };
        let config = self.config;
        for scene in self.scenes.iter_mut().filter(|scene| scene.sim == sim) {
            for actor in &mut scene.actors {
                if let Actor::Arm(arm) = actor {
                    for _ in 0..substeps {
                        arm.integrate(dt, &config);
                    }
                }
            }
        }
        Ok(())
    }

    fn create_viewer(&mut self, sim: SimHandle) -> Result<ViewerHandle, BackendError> {
        self.sim(sim)?;
        match self.viewer_budget {
            Some(_) => {
                self.frames = 0;
                Ok(ViewerHandle(0))
            }
            None => Err(BackendError::NoViewer),
        }
    }

    fn viewer_closed(&self, _viewer: ViewerHandle) -> bool {
        self.viewer_budget.map_or(true, |budget| self.frames >= budget)
    }

    fn render_frame(&mut self, sim: SimHandle, _viewer: ViewerHandle) -> Result<(), BackendError> {
        self.sim(sim)?;
        self.frames += 1;
        Ok(())
    }
}
