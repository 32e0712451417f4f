//! HTTP API for the Governance Decision Engine.

pub mod handlers;
mod routes;
mod types;

pub use routes::build_router;
pub use types::*;
