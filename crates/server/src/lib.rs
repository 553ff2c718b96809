//! HTTP server for the slotrush booking engine.
//!
//! Exposed as a library so integration tests can build the router
//! in-process with mock collaborators.

pub mod api;
pub mod metrics;
pub mod state;
