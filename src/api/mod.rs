//! HTTP API exposed to the surrounding application.
//!
//! The boundary contract only: extraction, cost estimation, agent
//! introspection, and configuration updates. Authorization for the admin
//! routes is the caller's responsibility.

mod config;
mod extract;
mod routes;

pub use routes::{serve, AppState};
