//! Route definitions for the API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::evaluate_action,
        handlers::record_bypass,
        handlers::gateway_execute,
        handlers::rank_principles,
        handlers::route_domain,
        handlers::reload_index,
        handlers::verify_compliance,
        handlers::list_audit_records,
        handlers::list_gateway_decisions,
        handlers::health_check,
    ),
    components(schemas(
        crate::api::types::EvaluateActionRequest,
        crate::api::types::EvaluateActionResponse,
        crate::api::types::BypassRequest,
        crate::api::types::BypassResponse,
        crate::api::types::GatewayExecuteResponse,
        crate::api::types::RankPrinciplesRequest,
        crate::api::types::RankPrinciplesResponse,
        crate::api::types::RouteDomainRequest,
        crate::api::types::RouteDomainResponse,
        crate::api::types::ReloadIndexResponse,
        crate::api::types::VerifyComplianceRequest,
        crate::api::types::VerifyComplianceResponse,
        crate::api::types::ListAuditQuery,
        crate::api::types::ListAuditResponse,
        crate::api::types::ListGatewayDecisionsResponse,
        crate::api::types::HealthResponse,
        crate::domain::Principle,
        crate::domain::DomainSpec,
        crate::domain::Assessment,
        crate::domain::AssessmentRecord,
        crate::domain::BypassClass,
        crate::domain::BypassLogEntry,
        crate::domain::AuditEntry,
        crate::domain::ComplianceStatus,
        crate::domain::ConsultedPrinciple,
        crate::engine::ToolRequest,
        crate::engine::GatewayDecision,
        crate::audit::GatewayDecisionRecord,
        crate::retrieval::RankedPrinciple,
        crate::retrieval::RankedDomain,
    )),
    tags(
        (name = "actions", description = "Action evaluation and bypass endpoints"),
        (name = "gateway", description = "Enforcement gateway interception"),
        (name = "retrieval", description = "Principle ranking and domain routing"),
        (name = "compliance", description = "Post-hoc compliance verification"),
        (name = "audit", description = "Audit trail inspection"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "Governance Decision Engine API",
        version = "0.1.0",
        description = "Evaluates AI agent actions against indexed policy principles before execution",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Evaluation
        .route("/v1/actions/evaluate", post(handlers::evaluate_action))
        .route("/v1/actions/bypass", post(handlers::record_bypass))
        // Enforcement
        .route("/v1/gateway/execute", post(handlers::gateway_execute))
        // Retrieval
        .route("/v1/principles/rank", post(handlers::rank_principles))
        .route("/v1/domains/route", post(handlers::route_domain))
        .route("/v1/index/reload", post(handlers::reload_index))
        // Compliance
        .route("/v1/compliance/verify", post(handlers::verify_compliance))
        // Audit
        .route("/v1/audit/records", get(handlers::list_audit_records))
        .route(
            "/v1/audit/gateway-decisions",
            get(handlers::list_gateway_decisions),
        )
        // Health
        .route("/v1/health", get(handlers::health_check))
        .with_state(state)
        // OpenAPI docs
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
