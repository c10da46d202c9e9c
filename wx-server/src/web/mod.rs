//! Web layer for the weather engine.
//!
//! A small JSON API over an [`EngineHandle`](crate::engine::EngineHandle):
//! read endpoints serve the latest published view, write endpoints forward
//! commands to the engine.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
