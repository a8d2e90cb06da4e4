//! The reconciliation core: pure, single-threaded, lock-free.
//!
//! Everything in here is a plain state machine driven by the event-loop
//! worker. The only I/O the core performs is the history store's own file;
//! all other side effects leave as declarative values in `SessionOutcome`.

pub mod config;
pub mod dispatcher;
pub mod events;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod task;
pub mod view;
