//! Enforcement Gateway - physically intercepts tool invocations.
//!
//! Advisory deployments return an assessment and trust the caller; gateway
//! deployments route the request through here, and nothing reaches the
//! downstream tool without a favorable assessment. Every decision is logged
//! in its own table, independent of the assessment record, so bypass
//! attempts are detectable at a layer the upstream agent cannot influence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::audit::AuditLog;
use crate::config::GatewayConfig;
use crate::domain::{Assessment, AssessmentRecord};
use crate::engine::EvaluationOrchestrator;
use crate::error::{GovernError, GovernResult};

/// A tool invocation intercepted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolRequest {
    /// Name of the downstream tool.
    pub tool: String,

    /// Natural-language description of what the invocation does; this is
    /// what gets evaluated.
    pub description: String,

    /// Tool-specific payload, forwarded verbatim on approval.
    pub payload: serde_json::Value,

    /// Modification text attached by the gateway when the assessment is
    /// proceed-with-modifications. The downstream tool must honor it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification: Option<String>,
}

/// What the gateway decided for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GatewayDecision {
    Forwarded,
    Rejected,
}

impl std::fmt::Display for GatewayDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayDecision::Forwarded => write!(f, "forwarded"),
            GatewayDecision::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for GatewayDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forwarded" => Ok(GatewayDecision::Forwarded),
            "rejected" => Ok(GatewayDecision::Rejected),
            _ => Err(format!("Unknown gateway decision: {}", s)),
        }
    }
}

/// Result of an interception.
#[derive(Debug)]
pub struct GatewayOutcome {
    pub decision: GatewayDecision,
    pub assessment: AssessmentRecord,
    /// Downstream response when forwarded.
    pub response: Option<serde_json::Value>,
    /// Escalation reason when rejected; never silently dropped.
    pub rejection_reason: Option<String>,
}

/// Forwards approved requests to the downstream tool endpoint.
#[async_trait]
pub trait ToolForwarder: Send + Sync {
    async fn forward(&self, request: &ToolRequest) -> GovernResult<serde_json::Value>;
}

/// HTTP forwarder posting the request to a configured downstream URL.
pub struct HttpToolForwarder {
    client: Client,
    downstream_url: String,
}

impl HttpToolForwarder {
    pub fn new(config: &GatewayConfig) -> GovernResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GovernError::Internal(format!("cannot build forwarder client: {}", e)))?;

        Ok(Self {
            client,
            downstream_url: config.downstream_url.clone(),
        })
    }
}

#[async_trait]
impl ToolForwarder for HttpToolForwarder {
    async fn forward(&self, request: &ToolRequest) -> GovernResult<serde_json::Value> {
        let response = self
            .client
            .post(&self.downstream_url)
            .json(request)
            .send()
            .await
            .map_err(|e| GovernError::Internal(format!("downstream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GovernError::Internal(format!(
                "downstream returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GovernError::Internal(format!("downstream response malformed: {}", e)))
    }
}

/// The interception point itself.
pub struct EnforcementGateway {
    orchestrator: Arc<EvaluationOrchestrator>,
    forwarder: Box<dyn ToolForwarder>,
    audit: AuditLog,
}

impl EnforcementGateway {
    pub fn new(
        orchestrator: Arc<EvaluationOrchestrator>,
        forwarder: Box<dyn ToolForwarder>,
        audit: AuditLog,
    ) -> Self {
        Self {
            orchestrator,
            forwarder,
            audit,
        }
    }

    /// Evaluate and, only on a favorable assessment, forward the request.
    pub async fn intercept(&self, request: ToolRequest) -> GovernResult<GatewayOutcome> {
        let assessment = self.orchestrator.evaluate(&request.description).await?;

        match assessment.assessment {
            Assessment::Proceed => self.forward(request, assessment, None).await,
            Assessment::ProceedWithModifications => {
                let modification = assessment.modifications.clone();
                self.forward(request, assessment, modification).await
            }
            Assessment::Escalate => {
                let reason = assessment
                    .escalation_reason
                    .clone()
                    .unwrap_or_else(|| "escalated without recorded reason".to_string());

                self.audit
                    .record_gateway_decision(
                        assessment.audit_id,
                        &request.tool,
                        GatewayDecision::Rejected,
                        Some(&reason),
                    )
                    .await?;

                tracing::warn!(
                    tool = %request.tool,
                    audit_id = assessment.audit_id,
                    reason = %reason,
                    "Gateway rejected request"
                );

                Ok(GatewayOutcome {
                    decision: GatewayDecision::Rejected,
                    assessment,
                    response: None,
                    rejection_reason: Some(reason),
                })
            }
        }
    }

    async fn forward(
        &self,
        mut request: ToolRequest,
        assessment: AssessmentRecord,
        modification: Option<String>,
    ) -> GovernResult<GatewayOutcome> {
        request.modification = modification;

        self.audit
            .record_gateway_decision(
                assessment.audit_id,
                &request.tool,
                GatewayDecision::Forwarded,
                request.modification.as_deref(),
            )
            .await?;

        let response = self.forwarder.forward(&request).await?;

        tracing::info!(
            tool = %request.tool,
            audit_id = assessment.audit_id,
            modified = request.modification.is_some(),
            "Gateway forwarded request"
        );

        Ok(GatewayOutcome {
            decision: GatewayDecision::Forwarded,
            assessment,
            response: Some(response),
            rejection_reason: None,
        })
    }
}
