//! Evaluation engine for the Governance Decision Engine.
//!
//! This module contains the decision pipeline:
//! - Safety Gate: deterministic pattern matching, fail-closed, first in line
//! - Judgment boundary: the injected external reasoning capability
//! - Evaluation Orchestrator: sequences gate, retrieval and judgment
//! - Enforcement Gateway: physically intercepts tool invocations

mod gate;
mod gateway;
mod judgment;
mod orchestrator;

pub use gate::*;
pub use gateway::*;
pub use judgment::*;
pub use orchestrator::*;
