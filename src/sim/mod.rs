//! Simulation backend interface.
//!
//! The harness never talks to a physics engine directly. Everything it needs
//! (scene creation, joint state access, the global tick and an optional
//! viewer) goes through [`SimulationBackend`]. Two implementations ship with
//! the crate:
//!
//! - [`KinematicBackend`]: a small software simulator that tracks joint
//!   position targets with damped first-order dynamics.
//! - [`MockBackend`]: a scriptable backend that records every call, used by
//!   the test-suite.
//!
//! Engine handles are owned by a [`SimContext`], which releases them when
//! dropped.

pub mod context;
pub mod error;
pub mod kinematic;
pub mod mock;
pub mod types;

pub use context::SimContext;
pub use error::BackendError;
pub use kinematic::{KinematicBackend, KinematicConfig};
pub use mock::{CallLog, MockBackend};
pub use types::{
    ActorHandle, AgentAsset, AssetOptions, BoxAsset, JointLimit, JointState, SceneBounds,
    SceneHandle, SimHandle, SimParams, Transform, UpAxis, Vec3, ViewerHandle,
};

/// Operations the harness consumes from a physics/rendering engine.
///
/// Scenes are independent: each holds exactly one articulated agent and the
/// objects it manipulates. Actor handles are local to their scene.
pub trait SimulationBackend {
    /// Creates a simulation and returns its handle.
    fn create_sim(&mut self, params: &SimParams) -> Result<SimHandle, BackendError>;

    /// Releases a simulation and everything it owns.
    fn destroy_sim(&mut self, sim: SimHandle);

    /// Creates a new scene within `sim`.
    fn create_scene(
        &mut self,
        sim: SimHandle,
        bounds: &SceneBounds,
    ) -> Result<SceneHandle, BackendError>;

    /// Spawns the articulated agent. Returns `None` if the engine refused it.
    fn create_agent_actor(
        &mut self,
        scene: SceneHandle,
        asset: &AgentAsset,
        pose: &Transform,
        name: &str,
    ) -> Option<ActorHandle>;

    /// Spawns a rigid box object.
    fn create_object_actor(
        &mut self,
        scene: SceneHandle,
        asset: &BoxAsset,
        pose: &Transform,
        name: &str,
    ) -> Result<ActorHandle, BackendError>;

    /// Reads joint positions and velocities of an articulated actor.
    fn get_joint_state(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<JointState, BackendError>;

    /// Overwrites joint positions and velocities of an articulated actor.
    fn set_joint_state(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
        state: &JointState,
    ) -> Result<(), BackendError>;

    /// Sets position targets for the actor's controllable joints.
    fn set_joint_targets(
        &mut self,
        scene: SceneHandle,
        actor: ActorHandle,
        targets: &[f32],
    ) -> Result<(), BackendError>;

    /// Limits of the controllable joints; the length is the action dimension.
    fn get_joint_limits(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Vec<JointLimit>, BackendError>;

    /// World pose of an actor's root body.
    fn get_actor_pose(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Transform, BackendError>;

    /// World position of the agent's end effector.
    fn end_effector_position(
        &self,
        scene: SceneHandle,
        actor: ActorHandle,
    ) -> Result<Vec3, BackendError>;

    /// Advances every scene of `sim` by one tick.
    fn advance(&mut self, sim: SimHandle) -> Result<(), BackendError>;

    /// Opens a viewer on `sim`. Headless backends keep the default.
    fn create_viewer(&mut self, _sim: SimHandle) -> Result<ViewerHandle, BackendError> {
        Err(BackendError::NoViewer)
    }

    fn destroy_viewer(&mut self, _viewer: ViewerHandle) {}

    /// Whether the user asked the viewer to close.
    fn viewer_closed(&self, _viewer: ViewerHandle) -> bool {
        true
    }

    /// Draws the current state of `sim` and waits for the frame slot.
    fn render_frame(&mut self, _sim: SimHandle, _viewer: ViewerHandle) -> Result<(), BackendError> {
        Ok(())
    }
}
