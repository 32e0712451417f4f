//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::GatewayDecisionRecord;
use crate::domain::{AssessmentRecord, AuditEntry, BypassClass, BypassLogEntry, ComplianceStatus};
use crate::retrieval::{RankedDomain, RankedPrinciple};

// ==================== Evaluate ====================

/// Request to evaluate a proposed action.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateActionRequest {
    /// Natural-language description of the proposed action.
    pub action_description: String,
}

/// Response from an advisory evaluation.
#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluateActionResponse {
    /// The persisted assessment record.
    pub record: AssessmentRecord,
}

// ==================== Bypass ====================

/// Request to record an explicitly authorized evaluation skip.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BypassRequest {
    pub action_description: String,
    /// One of the fixed whitelist classes.
    pub class: BypassClass,
    /// Required free-text justification.
    pub rationale: String,
}

/// Response after recording a bypass.
#[derive(Debug, Serialize, ToSchema)]
pub struct BypassResponse {
    pub entry: BypassLogEntry,
}

// ==================== Gateway ====================

/// Response from a gateway interception.
#[derive(Debug, Serialize, ToSchema)]
pub struct GatewayExecuteResponse {
    /// "forwarded" or "rejected".
    pub decision: String,
    /// Audit id of the underlying assessment record.
    pub audit_id: i64,
    /// Downstream response when forwarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Why the request was rejected, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

// ==================== Retrieval ====================

/// Request to rank principles against a query.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RankPrinciplesRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Restrict candidates to one domain.
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_top_k() -> usize {
    5
}

/// Ranked principles, best first.
#[derive(Debug, Serialize, ToSchema)]
pub struct RankPrinciplesResponse {
    pub results: Vec<RankedPrinciple>,
}

/// Request to route a query to its owning domain.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RouteDomainRequest {
    pub query: String,
}

/// Ranked domains, best first.
#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDomainResponse {
    pub results: Vec<RankedDomain>,
}

// ==================== Index ====================

/// Response after reloading the index snapshot from disk.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadIndexResponse {
    /// When the now-serving snapshot was built.
    pub built_at: String,
    /// Number of principles in the now-serving snapshot.
    pub principles: usize,
}

// ==================== Compliance ====================

/// Request to verify an action was preceded by an evaluation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyComplianceRequest {
    pub action_description: String,
    /// Look-back window in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

fn default_window_minutes() -> i64 {
    60
}

/// Compliance verdict for the action and window.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyComplianceResponse {
    pub status: ComplianceStatus,
}

// ==================== Audit ====================

/// Query parameters for listing audit entries.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListAuditQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// Recent audit entries, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListAuditResponse {
    pub entries: Vec<AuditEntry>,
    pub limit: i64,
}

/// Recent gateway decisions, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListGatewayDecisionsResponse {
    pub decisions: Vec<GatewayDecisionRecord>,
    pub limit: i64,
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Database connectivity.
    pub database: String,
    /// When the serving snapshot was built.
    pub snapshot_built_at: String,
    /// Number of principles in the serving snapshot.
    pub principles: usize,
    /// Timestamp.
    pub timestamp: String,
}
