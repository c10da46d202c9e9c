//! Change notifications published by the engine.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::adds::QuerySpec;
use crate::scheduler::UpdateMode;

/// Capacity of the event bus. Slow subscribers lag rather than block.
pub const EVENT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Registry contents changed; derived views are out of date.
    RegistryChanged { revision: u64 },
    CycleStarted { mode: UpdateMode },
    /// The running cycle changed mode.
    ModeChanged { mode: UpdateMode },
    CycleCompleted { mode: UpdateMode, decoded: usize },
    RequestFailed { query: String, error: String },
}

impl EngineEvent {
    pub fn request_failed(query: &QuerySpec, error: impl ToString) -> Self {
        EngineEvent::RequestFailed {
            query: query.to_string(),
            error: error.to_string(),
        }
    }
}

pub fn channel() -> (broadcast::Sender<EngineEvent>, broadcast::Receiver<EngineEvent>) {
    broadcast::channel(EVENT_BUS_CAPACITY)
}
