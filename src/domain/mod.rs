//! Domain types for the Governance Decision Engine.
//!
//! - Principles: addressable policy units with deterministic ids
//! - Domains: policy jurisdictions used for routing
//! - Assessments: the engine's verdicts and their audit trail forms

mod assessment;
mod principle;
mod registry;

pub use assessment::*;
pub use principle::*;
pub use registry::*;
