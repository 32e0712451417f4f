//! Append-only audit log and compliance verifier.

mod models;
mod repository;

pub use models::*;
pub use repository::*;
