//! The async shell around the core: configuration, the engine bridge, and
//! the event-loop worker that owns the session.

pub mod app;
pub mod args;
pub mod bridge;
