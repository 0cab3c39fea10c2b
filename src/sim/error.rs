use thiserror::Error;

use super::types::{ActorHandle, SceneHandle, SimHandle};

/// Failures reported by a simulation backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("Unknown simulation handle: {0:?}")]
    UnknownSim(SimHandle),

    #[error("Unknown scene handle: {0:?}")]
    UnknownScene(SceneHandle),

    #[error("Unknown actor {actor:?} in scene {scene:?}")]
    UnknownActor {
        scene: SceneHandle,
        actor: ActorHandle,
    },

    #[error("Actor {actor:?} in scene {scene:?} is not articulated")]
    NotArticulated {
        scene: SceneHandle,
        actor: ActorHandle,
    },

    #[error("Expected {expected} joint values, got {actual}")]
    DofMismatch { expected: usize, actual: usize },

    #[error("Backend does not provide a viewer")]
    NoViewer,

    #[error("Engine failure: {0}")]
    Engine(String),
}
