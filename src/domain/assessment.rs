//! Assessment and audit-trail domain types.
//!
//! Represents the engine's verdict on a proposed action and the
//! append-only records that capture every evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The engine's verdict on a proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    /// Action may proceed as proposed.
    Proceed,
    /// Action may proceed once the recorded modifications are applied.
    ProceedWithModifications,
    /// Action is escalated for human review; it must not proceed.
    Escalate,
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assessment::Proceed => write!(f, "proceed"),
            Assessment::ProceedWithModifications => write!(f, "proceed_with_modifications"),
            Assessment::Escalate => write!(f, "escalate"),
        }
    }
}

impl std::str::FromStr for Assessment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proceed" => Ok(Assessment::Proceed),
            "proceed_with_modifications" => Ok(Assessment::ProceedWithModifications),
            "escalate" => Ok(Assessment::Escalate),
            _ => Err(format!("Unknown assessment: {}", s)),
        }
    }
}

/// A principle handed to the judgment capability, full text included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsultedPrinciple {
    pub id: String,
    pub title: String,
    pub body_text: String,
    /// Cosine similarity against the action description.
    pub score: f32,
}

/// Fields the orchestrator supplies for a new assessment record.
///
/// The audit log assigns `audit_id`, `record_uid` and `recorded_at` on append.
#[derive(Debug, Clone)]
pub struct AssessmentDraft {
    pub action_description: String,
    pub assessment: Assessment,
    pub principles_consulted: Vec<String>,
    pub routed_domain: Option<String>,
    pub safety_gate_triggered: bool,
    pub matched_patterns: Vec<String>,
    pub modifications: Option<String>,
    pub escalation_reason: Option<String>,
}

/// One evaluation's audit trail unit. Append-only: never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssessmentRecord {
    /// Monotonically increasing id assigned by the audit log.
    pub audit_id: i64,

    /// Stable identifier independent of storage ordering.
    pub record_uid: Uuid,

    pub recorded_at: DateTime<Utc>,

    pub action_description: String,

    pub assessment: Assessment,

    /// Ids of the principles packaged for judgment.
    pub principles_consulted: Vec<String>,

    /// Best-matching domain at evaluation time, if retrieval ran.
    pub routed_domain: Option<String>,

    pub safety_gate_triggered: bool,

    /// Patterns the safety gate matched, empty when it did not trigger.
    pub matched_patterns: Vec<String>,

    pub modifications: Option<String>,

    pub escalation_reason: Option<String>,
}

/// Narrow fixed whitelist of evaluation skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BypassClass {
    /// Read-only operations with no side effects.
    ReadOnly,
    /// The accountable human explicitly overrode the evaluation.
    UserOverride,
    /// Trivial formatting-only changes.
    TrivialFormatting,
}

impl std::fmt::Display for BypassClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BypassClass::ReadOnly => write!(f, "read_only"),
            BypassClass::UserOverride => write!(f, "user_override"),
            BypassClass::TrivialFormatting => write!(f, "trivial_formatting"),
        }
    }
}

impl std::str::FromStr for BypassClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read_only" => Ok(BypassClass::ReadOnly),
            "user_override" => Ok(BypassClass::UserOverride),
            "trivial_formatting" => Ok(BypassClass::TrivialFormatting),
            _ => Err(format!("Unknown bypass class: {}", s)),
        }
    }
}

/// Fields supplied for a new bypass entry.
#[derive(Debug, Clone)]
pub struct BypassDraft {
    pub action_description: String,
    pub class: BypassClass,
    pub rationale: String,
}

/// Record of an explicitly authorized evaluation skip.
///
/// Always carries a rationale; append-only like assessment records.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BypassLogEntry {
    pub audit_id: i64,
    pub record_uid: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub action_description: String,
    pub class: BypassClass,
    pub rationale: String,
}

/// Either audit trail unit, as returned by read queries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEntry {
    Assessment(AssessmentRecord),
    Bypass(BypassLogEntry),
}

/// Outcome of post-hoc compliance verification for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// A full assessment record covers the action within the window.
    Compliant,
    /// Only a bypass entry covers the action within the window.
    Partial,
    /// No audit trail covers the action within the window.
    NonCompliant,
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplianceStatus::Compliant => write!(f, "compliant"),
            ComplianceStatus::Partial => write!(f, "partial"),
            ComplianceStatus::NonCompliant => write!(f, "non_compliant"),
        }
    }
}
