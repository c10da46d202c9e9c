//! Application state for the web layer.

use crate::engine::EngineHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the running engine
    pub engine: EngineHandle,
}

impl AppState {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}
