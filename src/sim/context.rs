//! Scoped ownership of engine handles.

use tracing::debug;

use super::error::BackendError;
use super::types::{SimHandle, SimParams, ViewerHandle};
use super::SimulationBackend;

/// Owns a backend together with the simulation (and optional viewer) created
/// on it.
///
/// Dropping the context destroys the viewer first, then the simulation, on
/// every exit path including early returns and unwinding.
///
/// # Lifecycle
///
/// 1. [`SimContext::new`] creates the simulation.
/// 2. [`SimContext::with_viewer`] optionally opens a viewer.
/// 3. The context is handed to a
///    [`VectorizedEnvironment`](crate::env::VectorizedEnvironment), which owns
///    it for the rest of the run.
#[derive(Debug)]
pub struct SimContext<B: SimulationBackend> {
    backend: B,
    sim: SimHandle,
    viewer: Option<ViewerHandle>,
    params: SimParams,
}

impl<B: SimulationBackend> SimContext<B> {
    /// Creates a simulation on `backend` with the given parameters.
    pub fn new(mut backend: B, params: SimParams) -> Result<Self, BackendError> {
        let sim = backend.create_sim(&params)?;
        debug!(?sim, dt = params.dt.value(), "simulation created");
        Ok(Self {
            backend,
            sim,
            viewer: None,
            params,
        })
    }

    /// Opens a viewer. On failure the simulation is released before the
    /// error is returned.
    pub fn with_viewer(mut self) -> Result<Self, BackendError> {
        let viewer = self.backend.create_viewer(self.sim)?;
        self.viewer = Some(viewer);
        Ok(self)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn sim(&self) -> SimHandle {
        self.sim
    }

    pub fn viewer(&self) -> Option<ViewerHandle> {
        self.viewer
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Advances the simulation by one tick.
    pub fn advance(&mut self) -> Result<(), BackendError> {
        self.backend.advance(self.sim)
    }

    /// True once the viewer reports it was closed. Headless contexts never
    /// request a close.
    pub fn close_requested(&self) -> bool {
        self.viewer
            .map(|viewer| self.backend.viewer_closed(viewer))
            .unwrap_or(false)
    }

    /// Renders one frame if a viewer is open.
    pub fn render(&mut self) -> Result<(), BackendError> {
        match self.viewer {
            Some(viewer) => self.backend.render_frame(self.sim, viewer),
            None => Ok(()),
        }
    }
}

impl<B: SimulationBackend> Drop for SimContext<B> {
    fn drop(&mut self) {
        if let Some(viewer) = self.viewer.take() {
            self.backend.destroy_viewer(viewer);
        }
        self.backend.destroy_sim(self.sim);
        debug!(sim = ?self.sim, "simulation destroyed");
    }
}
