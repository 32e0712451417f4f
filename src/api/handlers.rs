//! API handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::api::types::{
    BypassRequest, BypassResponse, EvaluateActionRequest, EvaluateActionResponse,
    GatewayExecuteResponse, HealthResponse, ListAuditQuery, ListAuditResponse,
    ListGatewayDecisionsResponse, RankPrinciplesRequest, RankPrinciplesResponse,
    ReloadIndexResponse, RouteDomainRequest, RouteDomainResponse, VerifyComplianceRequest,
    VerifyComplianceResponse,
};
use crate::engine::ToolRequest;
use crate::index::IndexSnapshot;
use crate::error::{GovernError, GovernResult};
use crate::AppState;

/// Evaluate a proposed action (advisory mode).
#[utoipa::path(
    post,
    path = "/v1/actions/evaluate",
    tag = "actions",
    request_body = EvaluateActionRequest,
    responses(
        (status = 200, description = "Evaluation complete", body = EvaluateActionResponse),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn evaluate_action(
    State(state): State<AppState>,
    Json(request): Json<EvaluateActionRequest>,
) -> GovernResult<Json<EvaluateActionResponse>> {
    if request.action_description.trim().is_empty() {
        return Err(GovernError::BadRequest(
            "action_description must not be empty".to_string(),
        ));
    }

    let record = state
        .orchestrator
        .evaluate(&request.action_description)
        .await?;
    Ok(Json(EvaluateActionResponse { record }))
}

/// Record an explicitly authorized evaluation skip.
#[utoipa::path(
    post,
    path = "/v1/actions/bypass",
    tag = "actions",
    request_body = BypassRequest,
    responses(
        (status = 200, description = "Bypass recorded", body = BypassResponse),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn record_bypass(
    State(state): State<AppState>,
    Json(request): Json<BypassRequest>,
) -> GovernResult<Json<BypassResponse>> {
    if request.rationale.trim().is_empty() {
        return Err(GovernError::BadRequest(
            "a bypass always requires a rationale".to_string(),
        ));
    }

    let entry = state
        .orchestrator
        .record_bypass(&request.action_description, request.class, &request.rationale)
        .await?;
    Ok(Json(BypassResponse { entry }))
}

/// Intercept a tool invocation (gateway mode only).
#[utoipa::path(
    post,
    path = "/v1/gateway/execute",
    tag = "gateway",
    request_body = ToolRequest,
    responses(
        (status = 200, description = "Decision made", body = GatewayExecuteResponse),
        (status = 400, description = "Gateway mode not enabled")
    )
)]
pub async fn gateway_execute(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> GovernResult<Json<GatewayExecuteResponse>> {
    let gateway = state.gateway.as_ref().ok_or_else(|| {
        GovernError::BadRequest("gateway mode is not enabled on this deployment".to_string())
    })?;

    let outcome = gateway.intercept(request).await?;
    Ok(Json(GatewayExecuteResponse {
        decision: outcome.decision.to_string(),
        audit_id: outcome.assessment.audit_id,
        response: outcome.response,
        rejection_reason: outcome.rejection_reason,
    }))
}

/// Rank principles by similarity to a query.
#[utoipa::path(
    post,
    path = "/v1/principles/rank",
    tag = "retrieval",
    request_body = RankPrinciplesRequest,
    responses(
        (status = 200, description = "Ranked principles", body = RankPrinciplesResponse)
    )
)]
pub async fn rank_principles(
    State(state): State<AppState>,
    Json(request): Json<RankPrinciplesRequest>,
) -> GovernResult<Json<RankPrinciplesResponse>> {
    let results = state
        .retrieval
        .rank_principles(&request.query, request.top_k, request.domain.as_deref())
        .await?;
    Ok(Json(RankPrinciplesResponse { results }))
}

/// Route a query to the domain that owns it.
#[utoipa::path(
    post,
    path = "/v1/domains/route",
    tag = "retrieval",
    request_body = RouteDomainRequest,
    responses(
        (status = 200, description = "Ranked domains", body = RouteDomainResponse)
    )
)]
pub async fn route_domain(
    State(state): State<AppState>,
    Json(request): Json<RouteDomainRequest>,
) -> GovernResult<Json<RouteDomainResponse>> {
    let results = state.retrieval.route_domain(&request.query).await?;
    Ok(Json(RouteDomainResponse { results }))
}

/// Reload the index snapshot from disk and swap it in atomically.
///
/// In-flight queries drain against the snapshot they started with.
#[utoipa::path(
    post,
    path = "/v1/index/reload",
    tag = "retrieval",
    responses(
        (status = 200, description = "Snapshot swapped", body = ReloadIndexResponse),
        (status = 503, description = "Snapshot missing or corrupt")
    )
)]
pub async fn reload_index(
    State(state): State<AppState>,
) -> GovernResult<Json<ReloadIndexResponse>> {
    let snapshot = IndexSnapshot::load(&state.snapshot_path)?;
    let built_at = snapshot.built_at.to_rfc3339();
    let principles = snapshot.principles.len();

    state.retrieval.swap(snapshot).await?;
    Ok(Json(ReloadIndexResponse {
        built_at,
        principles,
    }))
}

/// Verify an action was preceded by an evaluation within a window.
#[utoipa::path(
    post,
    path = "/v1/compliance/verify",
    tag = "compliance",
    request_body = VerifyComplianceRequest,
    responses(
        (status = 200, description = "Compliance status", body = VerifyComplianceResponse)
    )
)]
pub async fn verify_compliance(
    State(state): State<AppState>,
    Json(request): Json<VerifyComplianceRequest>,
) -> GovernResult<Json<VerifyComplianceResponse>> {
    if request.window_minutes <= 0 {
        return Err(GovernError::BadRequest(
            "window_minutes must be positive".to_string(),
        ));
    }

    let status = state
        .audit
        .verify_compliance(
            &request.action_description,
            chrono::Duration::minutes(request.window_minutes),
        )
        .await?;
    Ok(Json(VerifyComplianceResponse { status }))
}

/// List recent audit entries.
#[utoipa::path(
    get,
    path = "/v1/audit/records",
    tag = "audit",
    params(("limit" = i64, Query, description = "Maximum entries to return")),
    responses(
        (status = 200, description = "Recent audit entries", body = ListAuditResponse)
    )
)]
pub async fn list_audit_records(
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> GovernResult<Json<ListAuditResponse>> {
    let entries = state.audit.recent_entries(query.limit).await?;
    Ok(Json(ListAuditResponse {
        entries,
        limit: query.limit,
    }))
}

/// List recent gateway decisions.
#[utoipa::path(
    get,
    path = "/v1/audit/gateway-decisions",
    tag = "audit",
    params(("limit" = i64, Query, description = "Maximum decisions to return")),
    responses(
        (status = 200, description = "Recent gateway decisions", body = ListGatewayDecisionsResponse)
    )
)]
pub async fn list_gateway_decisions(
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> GovernResult<Json<ListGatewayDecisionsResponse>> {
    let decisions = state.audit.recent_gateway_decisions(query.limit).await?;
    Ok(Json(ListGatewayDecisionsResponse {
        decisions,
        limit: query.limit,
    }))
}

/// Health and snapshot status.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.retrieval.current().await;
    let database = if state.audit.is_healthy().await {
        "connected"
    } else {
        "unavailable"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        snapshot_built_at: snapshot.built_at.to_rfc3339(),
        principles: snapshot.principles.len(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
