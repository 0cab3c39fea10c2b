//! Scriptable backend for tests.
//!
//! Every call is counted in a shared [`CallLog`] so assertions can be made
//! after the backend has been moved into a [`SimContext`](super::SimContext)
//! and dropped. Joint dynamics are trivial: `advance` snaps controllable
//! joints to their targets.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::error::BackendError;
use super::types::{
    ActorHandle, AgentAsset, BoxAsset, JointLimit, JointState, SceneBounds, SceneHandle,
    SimHandle, SimParams, Transform, Vec3, ViewerHandle,
};
use super::SimulationBackend;

/// Counters shared between a [`MockBackend`] and the test that created it.
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub sims_created: usize,
    pub sims_destroyed: usize,
    pub scenes_created: usize,
    pub agent_attempts: usize,
    pub objects_created: usize,
    pub advance_calls: usize,
    pub set_state_calls: usize,
    pub set_target_calls: usize,
    pub frames_rendered: usize,
    pub viewers_destroyed: usize,
}

#[derive(Debug)]
struct MockScene {
    agent: Option<MockAgent>,
    object_pose: Option<Transform>,
}

#[derive(Debug)]
struct MockAgent {
    state: JointState,
    limits: Vec<JointLimit>,
    targets: Vec<f32>,
}

/// Backend double with configurable joint topology and failure injection.
#[derive(Debug)]
pub struct MockBackend {
    obs_joints: usize,
    act_joints: usize,
    joint_overrides: HashMap<usize, usize>,
    failing_agents: HashSet<usize>,
    failing_advance_at: Option<usize>,
    growing_joints_at: Option<usize>,
    viewer_frames: Option<usize>,
    scenes: Vec<MockScene>,
    log: Rc<RefCell<CallLog>>,
}

impl MockBackend {
    /// Every agent gets `obs_joints` joint-state entries and `act_joints`
    /// controllable joints with limits `[-1, 1]`.
    pub fn new(obs_joints: usize, act_joints: usize) -> Self {
        Self {
            obs_joints,
            act_joints,
            joint_overrides: HashMap::new(),
            failing_agents: HashSet::new(),
            failing_advance_at: None,
            growing_joints_at: None,
            viewer_frames: None,
            scenes: Vec::new(),
            log: Rc::new(RefCell::new(CallLog::default())),
        }
    }

    /// Agent creation for the listed scene indices returns `None`.
    pub fn failing_agents(mut self, indices: &[usize]) -> Self {
        self.failing_agents.extend(indices.iter().copied());
        self
    }

    /// Scene `index` gets `obs_joints` joint-state entries instead of the default.
    pub fn with_joint_override(mut self, index: usize, obs_joints: usize) -> Self {
        self.joint_overrides.insert(index, obs_joints);
        self
    }

    /// The `call`-th advance (1-based) fails with an engine error.
    pub fn failing_advance_at(mut self, call: usize) -> Self {
        self.failing_advance_at = Some(call);
        self
    }

    /// The `call`-th advance (1-based) appends one joint-state entry to
    /// every agent.
    pub fn growing_joints_at(mut self, call: usize) -> Self {
        self.growing_joints_at = Some(call);
        self
    }

    /// Enables a viewer that reports closed after `frames` rendered frames.
    pub fn with_viewer_frames(mut self, frames: usize) -> Self {
        self.viewer_frames = Some(frames);
        self
    }

    /// Shared handle to the call counters.
    pub fn log(&self) -> Rc<RefCell<CallLog>> {
        Rc::clone(&self.log)
    }

    fn agent(&self, scene: SceneHandle, actor: ActorHandle) -> Result<&MockAgent, BackendError> {
        let s = self
            .scenes
            .get(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?;
        match (&s.agent, actor.0) {
            (Some(agent), 0) => Ok(agent),
            _ => Err(BackendError::UnknownActor { scene, actor }),
        }
    }

    fn agent_mut(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<&mut MockAgent, BackendError> {
        let s = self
            .scenes
            .get_mut(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?;
        match (&mut s.agent, actor.0) {
            (Some(agent), 0) => Ok(agent),
            _ => Err(BackendError::UnknownActor { scene, actor }),
        }
    }
}

impl SimulationBackend for MockBackend {
    fn create_sim(&mut self, _params: &SimParams) -> Result<SimHandle, BackendError> {
        self.log.borrow_mut().sims_created += 1;
        Ok(SimHandle(0))
    }

    fn destroy_sim(&mut self, _sim: SimHandle) {
        self.scenes.clear();
        self.log.borrow_mut().sims_destroyed += 1;
    }

    fn create_scene(
        &mut self,
        _sim: SimHandle,
        _bounds: &SceneBounds,
    ) -> Result<SceneHandle, BackendError> {
        self.scenes.push(MockScene {
            agent: None,
            object_pose: None,
        });
        self.log.borrow_mut().scenes_created += 1;
        Ok(SceneHandle(self.scenes.len() - 1))
    }

    fn create_agent_actor(
        &mut self,
        scene: SceneHandle,
        _asset: &AgentAsset,
        _pose: &Transform,
        _name: &str,
    ) -> Option<ActorHandle> {
        self.log.borrow_mut().agent_attempts += 1;
        if self.failing_agents.contains(&scene.0) {
            return None;
        }
        let obs_joints = self
            .joint_overrides
            .get(&scene.0)
            .copied()
            .unwrap_or(self.obs_joints);
        let agent = MockAgent {
            state: JointState::zeros(obs_joints),
            limits: vec![JointLimit::new(-1.0, 1.0); self.act_joints],
            targets: vec![0.0; self.act_joints],
        };
        let s = self.scenes.get_mut(scene.0)?;
        s.agent = Some(agent);
        Some(ActorHandle(0))
    }

    fn create_object_actor(
        &mut self,
        scene: SceneHandle,
        _asset: &BoxAsset,
        pose: &Transform,
        _name: &str,
    ) -> Result<ActorHandle, BackendError> {
        let s = self
            .scenes
            .get_mut(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?;
        s.object_pose = Some(*pose);
        self.log.borrow_mut().objects_created += 1;
        Ok(ActorHandle(1))
    }

    fn get_joint_state(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<JointState, BackendError> {
        Ok(self.agent(scene, actor)?.state.clone())
    }

    fn set_joint_state(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
        state: &JointState,
    ) -> Result<(), BackendError> {
        let agent = self.agent_mut(scene, actor)?;
        if state.len() != agent.state.len() {
            return Err(BackendError::DofMismatch {
                expected: agent.state.len(),
                actual: state.len(),
            });
        }
        agent.state = state.clone();
        self.log.borrow_mut().set_state_calls += 1;
        Ok(())
    }

    fn set_joint_targets(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
        targets: &[f32],
    ) -> Result<(), BackendError> {
        let agent = self.agent_mut(scene, actor)?;
        if targets.len() != agent.targets.len() {
            return Err(BackendError::DofMismatch {
                expected: agent.targets.len(),
                actual: targets.len(),
            });
        }
        agent.targets.copy_from_slice(targets);
        self.log.borrow_mut().set_target_calls += 1;
        Ok(())
    }

    fn get_joint_limits(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Vec<JointLimit>, BackendError> {
        Ok(self.agent(scene, actor)?.limits.clone())
    }

    fn get_actor_pose(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Transform, BackendError> {
        let s = self
            .scenes
            .get(scene.0)
            .ok_or(BackendError::UnknownScene(scene))?;
        match actor.0 {
            0 if s.agent.is_some() => Ok(Transform::default()),
            1 => s
                .object_pose
                .ok_or(BackendError::UnknownActor { scene, actor }),
            _ => Err(BackendError::UnknownActor { scene, actor }),
        }
    }

    fn end_effector_position(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Vec3, BackendError> {
        let agent = self.agent(scene, actor)?;
        let reach: f32 = agent.state.positions.iter().sum();
        Ok(Vec3::new(reach, 0.0, 0.0))
    }

    fn advance(&mut self, _sim: SimHandle) -> Result<(), BackendError> {
        let call = {
            let mut log = self.log.borrow_mut();
            log.advance_calls += 1;
            log.advance_calls
        };
        if self.failing_advance_at == Some(call) {
            return Err(BackendError::Engine(format!("scripted failure at tick {call}")));
        }
        let grow = self.growing_joints_at == Some(call);
        for scene in &mut self.scenes {
            if let Some(agent) = &mut scene.agent {
                for (pos, target) in agent.state.positions.iter_mut().zip(&agent.targets) {
                    *pos = *target;
                }
                if grow {
                    agent.state.positions.push(0.0);
                    agent.state.velocities.push(0.0);
                }
            }
        }
        Ok(())
    }

    fn create_viewer(&mut self, _sim: SimHandle) -> Result<ViewerHandle, BackendError> {
        match self.viewer_frames {
            Some(_) => Ok(ViewerHandle(0)),
            None => Err(BackendError::NoViewer),
        }
    }

    fn destroy_viewer(&mut self, _viewer: ViewerHandle) {
        self.log.borrow_mut().viewers_destroyed += 1;
    }

    fn viewer_closed(&self, _viewer: ViewerHandle) -> bool {
        match self.viewer_frames {
            Some(budget) => self.log.borrow().frames_rendered >= budget,
            None => true,
        }
    }

    fn render_frame(&mut self, _sim: SimHandle, _viewer: ViewerHandle) -> Result<(), BackendError> {
        self.log.borrow_mut().frames_rendered += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_agent(backend: &mut MockBackend) -> SceneHandle {
        let sim = backend.create_sim(&SimParams::default()).unwrap();
        let scene = backend
            .create_scene(sim, &SceneBounds::from_spacing(2.0))
            .unwrap();
        backend
            .create_agent_actor(
                scene,
                &AgentAsset::six_axis_arm(),
                &Transform::default(),
                "agent",
            )
            .unwrap();
        scene
    }

    #[test]
    fn advance_snaps_to_targets() {
        let mut backend = MockBackend::new(3, 2);
        let scene = scene_with_agent(&mut backend);
        backend
            .set_joint_targets(scene, ActorHandle(0), &[0.5, -0.5])
            .unwrap();
        backend.advance(SimHandle(0)).unwrap();
        let state = backend.get_joint_state(scene, ActorHandle(0)).unwrap();
        assert_eq!(state.positions, vec![0.5, -0.5, 0.0]);
        assert_eq!(backend.log().borrow().advance_calls, 1);
    }

    #[test]
    fn failing_agent_returns_none() {
        let mut backend = MockBackend::new(3, 2).failing_agents(&[0]);
        let sim = backend.create_sim(&SimParams::default()).unwrap();
        let scene = backend
            .create_scene(sim, &SceneBounds::from_spacing(2.0))
            .unwrap();
        let actor = backend.create_agent_actor(
            scene,
            &AgentAsset::six_axis_arm(),
            &Transform::default(),
            "agent",
        );
        assert!(actor.is_none());
    }

    #[test]
    fn wrong_target_count_is_rejected() {
        let mut backend = MockBackend::new(3, 2);
        let scene = scene_with_agent(&mut backend);
        let err = backend
            .set_joint_targets(scene, ActorHandle(0), &[0.1])
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::DofMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn scripted_advance_failure() {
        let mut backend = MockBackend::new(1, 1).failing_advance_at(2);
        backend.advance(SimHandle(0)).unwrap();
        assert!(matches!(
            backend.advance(SimHandle(0)),
            Err(BackendError::Engine(_))
        ));
    }
}
