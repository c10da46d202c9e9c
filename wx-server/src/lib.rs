//! Aviation weather server.
//!
//! Periodically fetches METARs and TAFs around the current position and
//! along the planned route from the ADDS data server, keeps them in a
//! self-expiring station registry and answers "which stations are near me"
//! and "which QNH should I set".

pub mod adds;
pub mod config;
pub mod domain;
pub mod engine;
pub mod events;
pub mod fetch;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod web;
