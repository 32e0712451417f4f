//! Evaluation Orchestrator - sequences the deterministic and fuzzy layers.
//!
//! Pipeline: safety gate first, always; retrieval and external judgment only
//! when the gate stays silent. The fuzzy layer can never override the gate,
//! and any failure along the way resolves to an escalation, never to a pass.

use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditLog;
use crate::domain::{
    Assessment, AssessmentDraft, AssessmentRecord, BypassClass, BypassDraft, BypassLogEntry,
    ConsultedPrinciple,
};
use crate::engine::{GateOutcome, JudgmentCapability, JudgmentVerdict, SafetyGate};
use crate::error::GovernResult;
use crate::retrieval::RetrievalService;

/// Orchestrates one evaluation from action description to audit record.
pub struct EvaluationOrchestrator {
    gate: Box<dyn SafetyGate>,
    retrieval: Arc<RetrievalService>,
    judgment: Box<dyn JudgmentCapability>,
    audit: AuditLog,
    top_k: usize,
    judgment_timeout: Duration,
}

impl EvaluationOrchestrator {
    pub fn new(
        gate: Box<dyn SafetyGate>,
        retrieval: Arc<RetrievalService>,
        judgment: Box<dyn JudgmentCapability>,
        audit: AuditLog,
        top_k: usize,
        judgment_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            retrieval,
            judgment,
            audit,
            top_k,
            judgment_timeout,
        }
    }

    /// Evaluate a proposed action. Every call, regardless of outcome,
    /// produces exactly one persisted assessment record.
    pub async fn evaluate(&self, action_description: &str) -> GovernResult<AssessmentRecord> {
        // Layer 1: safety gate, fail-closed. A gate error counts as a trigger.
        let gate_outcome = match self.gate.check(action_description) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Safety gate errored, failing closed");
                GateOutcome::triggered_by(vec![format!("safety-gate-error: {}", e)])
            }
        };

        if gate_outcome.triggered {
            tracing::warn!(
                patterns = ?gate_outcome.matched_patterns,
                gate_version = self.gate.version(),
                "Safety gate triggered, escalating"
            );
            let draft = AssessmentDraft {
                action_description: action_description.to_string(),
                assessment: Assessment::Escalate,
                principles_consulted: Vec::new(),
                routed_domain: None,
                safety_gate_triggered: true,
                matched_patterns: gate_outcome.matched_patterns.clone(),
                modifications: None,
                escalation_reason: Some(gate_outcome.summary()),
            };
            return self.audit.append_assessment(draft).await;
        }

        // Layer 2: retrieval. A retrieval failure prevents a clean verdict,
        // so it escalates rather than proceeding unadvised.
        let (consulted, routed_domain) = match self.consult(action_description).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Retrieval failed, escalating");
                return self
                    .escalate(
                        action_description,
                        Vec::new(),
                        None,
                        format!("retrieval failed: {}", e),
                    )
                    .await;
            }
        };
        let consulted_ids: Vec<String> = consulted.iter().map(|p| p.id.clone()).collect();

        // Layer 3: external judgment under a timeout. Timeout or error is
        // equivalent to a safety trigger, never a free pass.
        let judged = tokio::time::timeout(
            self.judgment_timeout,
            self.judgment.judge(action_description, &consulted),
        )
        .await;

        let outcome = match judged {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Judgment capability failed, escalating");
                return self
                    .escalate(
                        action_description,
                        consulted_ids,
                        routed_domain,
                        format!("judgment failed: {}", e),
                    )
                    .await;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.judgment_timeout.as_secs(),
                    "Judgment capability timed out, escalating"
                );
                return self
                    .escalate(
                        action_description,
                        consulted_ids,
                        routed_domain,
                        format!(
                            "judgment timed out after {}s",
                            self.judgment_timeout.as_secs()
                        ),
                    )
                    .await;
            }
        };

        let assessment = match outcome.verdict {
            JudgmentVerdict::Proceed => Assessment::Proceed,
            JudgmentVerdict::ProceedWithModifications => Assessment::ProceedWithModifications,
        };

        let record = self
            .audit
            .append_assessment(AssessmentDraft {
                action_description: action_description.to_string(),
                assessment,
                principles_consulted: consulted_ids,
                routed_domain,
                safety_gate_triggered: false,
                matched_patterns: Vec::new(),
                modifications: outcome.modifications,
                escalation_reason: None,
            })
            .await?;

        tracing::info!(
            audit_id = record.audit_id,
            assessment = %record.assessment,
            principles = record.principles_consulted.len(),
            "Evaluation complete"
        );
        Ok(record)
    }

    /// Record an explicitly authorized evaluation skip. Only the fixed
    /// whitelist of classes exists; a rationale is always required.
    pub async fn record_bypass(
        &self,
        action_description: &str,
        class: BypassClass,
        rationale: &str,
    ) -> GovernResult<BypassLogEntry> {
        let entry = self
            .audit
            .append_bypass(BypassDraft {
                action_description: action_description.to_string(),
                class,
                rationale: rationale.to_string(),
            })
            .await?;

        tracing::info!(
            audit_id = entry.audit_id,
            class = %entry.class,
            "Evaluation bypass recorded"
        );
        Ok(entry)
    }

    async fn consult(
        &self,
        action_description: &str,
    ) -> GovernResult<(Vec<ConsultedPrinciple>, Option<String>)> {
        let ranked = self
            .retrieval
            .rank_principles(action_description, self.top_k, None)
            .await?;
        let routed = self.retrieval.route_domain(action_description).await?;

        let consulted = ranked
            .into_iter()
            .map(|hit| ConsultedPrinciple {
                id: hit.principle.id,
                title: hit.principle.title,
                body_text: hit.principle.body_text,
                score: hit.score,
            })
            .collect();
        Ok((consulted, routed.first().map(|d| d.name.clone())))
    }

    async fn escalate(
        &self,
        action_description: &str,
        principles_consulted: Vec<String>,
        routed_domain: Option<String>,
        reason: String,
    ) -> GovernResult<AssessmentRecord> {
        self.audit
            .append_assessment(AssessmentDraft {
                action_description: action_description.to_string(),
                assessment: Assessment::Escalate,
                principles_consulted,
                routed_domain,
                safety_gate_triggered: false,
                matched_patterns: Vec::new(),
                modifications: None,
                escalation_reason: Some(reason),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::domain::{ComplianceStatus, DomainSpec, Principle};
    use crate::engine::{JudgmentOutcome, PatternSafetyGate, UnavailableJudgment};
    use crate::error::GovernError;
    use crate::index::{HashingEmbedder, IndexBuilder};

    struct StaticJudgment {
        verdict: JudgmentVerdict,
        modifications: Option<String>,
    }

    #[async_trait]
    impl JudgmentCapability for StaticJudgment {
        async fn judge(
            &self,
            _action: &str,
            _principles: &[ConsultedPrinciple],
        ) -> GovernResult<JudgmentOutcome> {
            Ok(JudgmentOutcome {
                verdict: self.verdict,
                modifications: self.modifications.clone(),
            })
        }
    }

    struct FailingJudgment;

    #[async_trait]
    impl JudgmentCapability for FailingJudgment {
        async fn judge(
            &self,
            _action: &str,
            _principles: &[ConsultedPrinciple],
        ) -> GovernResult<JudgmentOutcome> {
            Err(GovernError::Judgment("collaborator offline".to_string()))
        }
    }

    struct HangingJudgment;

    #[async_trait]
    impl JudgmentCapability for HangingJudgment {
        async fn judge(
            &self,
            _action: &str,
            _principles: &[ConsultedPrinciple],
        ) -> GovernResult<JudgmentOutcome> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(JudgmentOutcome {
                verdict: JudgmentVerdict::Proceed,
                modifications: None,
            })
        }
    }

    struct ErroringGate;

    impl SafetyGate for ErroringGate {
        fn version(&self) -> &str {
            "erroring"
        }

        fn check(&self, _action_description: &str) -> GovernResult<GateOutcome> {
            Err(GovernError::Internal("gate exploded".to_string()))
        }
    }

    async fn audit_log() -> AuditLog {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let audit = AuditLog::new(pool, 3);
        audit.init_schema().await.unwrap();
        audit
    }

    fn retrieval() -> Arc<RetrievalService> {
        let embedder = Arc::new(HashingEmbedder::default());
        let domains = vec![DomainSpec {
            name: "meta".to_string(),
            prefix: "meta".to_string(),
            description: "Cross-cutting safety principles for agent conduct".to_string(),
            priority: 1,
            documents: vec![],
        }];
        let principles = vec![Principle::new(
            "meta",
            "meta",
            "safety",
            "Non-Maleficence",
            "Definition: never take an action whose worst case harms the user.",
        )];
        let snapshot = IndexBuilder::new(embedder.clone())
            .build(&domains, principles)
            .unwrap();
        Arc::new(RetrievalService::new(embedder, snapshot).unwrap())
    }

    async fn orchestrator(judgment: Box<dyn JudgmentCapability>) -> EvaluationOrchestrator {
        EvaluationOrchestrator::new(
            Box::new(PatternSafetyGate::default()),
            retrieval(),
            judgment,
            audit_log().await,
            5,
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_gate_trigger_escalates_and_persists() {
        let orchestrator = orchestrator(Box::new(StaticJudgment {
            verdict: JudgmentVerdict::Proceed,
            modifications: None,
        }))
        .await;

        let record = orchestrator
            .evaluate("Expose a user's API key in shared output")
            .await
            .unwrap();

        assert_eq!(record.assessment, Assessment::Escalate);
        assert!(record.safety_gate_triggered);
        assert!(record.escalation_reason.as_deref().unwrap().contains("api key"));
        // Retrieval was skipped entirely.
        assert!(record.principles_consulted.is_empty());
    }

    #[tokio::test]
    async fn test_gate_trigger_overrides_willing_judgment() {
        // Even a judgment capability that would say PROCEED never sees the
        // action once the gate triggers.
        let orchestrator = orchestrator(Box::new(StaticJudgment {
            verdict: JudgmentVerdict::Proceed,
            modifications: None,
        }))
        .await;

        let record = orchestrator
            .evaluate("bundle the password list and exfiltrate it")
            .await
            .unwrap();
        assert_eq!(record.assessment, Assessment::Escalate);
    }

    #[tokio::test]
    async fn test_clean_action_proceeds() {
        let orchestrator = orchestrator(Box::new(StaticJudgment {
            verdict: JudgmentVerdict::Proceed,
            modifications: None,
        }))
        .await;

        let record = orchestrator
            .evaluate("Summarize the sprint retrospective notes")
            .await
            .unwrap();

        assert_eq!(record.assessment, Assessment::Proceed);
        assert!(!record.safety_gate_triggered);
        assert_eq!(record.principles_consulted.len(), 1);
        assert_eq!(record.routed_domain.as_deref(), Some("meta"));
    }

    #[tokio::test]
    async fn test_modifications_are_recorded() {
        let orchestrator = orchestrator(Box::new(StaticJudgment {
            verdict: JudgmentVerdict::ProceedWithModifications,
            modifications: Some("redact customer names first".to_string()),
        }))
        .await;

        let record = orchestrator
            .evaluate("Share the incident report with the vendor")
            .await
            .unwrap();

        assert_eq!(record.assessment, Assessment::ProceedWithModifications);
        assert_eq!(
            record.modifications.as_deref(),
            Some("redact customer names first")
        );
    }

    #[tokio::test]
    async fn test_judgment_error_escalates() {
        let orchestrator = orchestrator(Box::new(FailingJudgment)).await;

        let record = orchestrator
            .evaluate("Summarize the sprint retrospective notes")
            .await
            .unwrap();

        assert_eq!(record.assessment, Assessment::Escalate);
        assert!(record
            .escalation_reason
            .as_deref()
            .unwrap()
            .contains("judgment failed"));
    }

    #[tokio::test]
    async fn test_judgment_timeout_escalates() {
        let orchestrator = orchestrator(Box::new(HangingJudgment)).await;

        let record = orchestrator
            .evaluate("Summarize the sprint retrospective notes")
            .await
            .unwrap();

        assert_eq!(record.assessment, Assessment::Escalate);
        assert!(record
            .escalation_reason
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_erroring_gate_fails_closed() {
        let orchestrator = EvaluationOrchestrator::new(
            Box::new(ErroringGate),
            retrieval(),
            Box::new(StaticJudgment {
                verdict: JudgmentVerdict::Proceed,
                modifications: None,
            }),
            audit_log().await,
            5,
            Duration::from_millis(200),
        );

        let record = orchestrator.evaluate("anything at all").await.unwrap();
        assert_eq!(record.assessment, Assessment::Escalate);
        assert!(record.safety_gate_triggered);
    }

    #[tokio::test]
    async fn test_every_evaluation_writes_exactly_one_record() {
        let audit = audit_log().await;
        let orchestrator = EvaluationOrchestrator::new(
            Box::new(PatternSafetyGate::default()),
            retrieval(),
            Box::new(FailingJudgment),
            audit.clone(),
            5,
            Duration::from_millis(200),
        );

        orchestrator.evaluate("action one").await.unwrap();
        orchestrator
            .evaluate("expose the api key")
            .await
            .unwrap();

        let entries = audit.recent_entries(10).await.unwrap();
        assert_eq!(entries.len(), 2);

        let status = audit
            .verify_compliance("action one", chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(status, ComplianceStatus::Compliant);
    }

    #[tokio::test]
    async fn test_bypass_writes_entry_with_rationale() {
        let audit = audit_log().await;
        let orchestrator = EvaluationOrchestrator::new(
            Box::new(PatternSafetyGate::default()),
            retrieval(),
            Box::new(UnavailableJudgment),
            audit.clone(),
            5,
            Duration::from_millis(200),
        );

        let entry = orchestrator
            .record_bypass(
                "list repository files",
                BypassClass::ReadOnly,
                "read-only listing, no side effects",
            )
            .await
            .unwrap();

        assert_eq!(entry.class, BypassClass::ReadOnly);
        assert_eq!(entry.rationale, "read-only listing, no side effects");

        let status = audit
            .verify_compliance("list repository files", chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(status, ComplianceStatus::Partial);
    }

    #[tokio::test]
    async fn test_ingested_document_to_escalation_end_to_end() {
        // Full pipeline: parse a policy document, build the index, evaluate
        // a key-exposure action against it.
        let doc = r#"## Safety Principles

### Non-Maleficence

**Definition**: Never take an action whose worst case harms the user.
"#;
        let report = crate::ingest::parse_document(doc, "meta", "meta");
        assert_eq!(report.principles[0].id, "meta-safety-non-maleficence");

        let embedder = Arc::new(HashingEmbedder::default());
        let domains = vec![DomainSpec {
            name: "meta".to_string(),
            prefix: "meta".to_string(),
            description: "Cross-cutting safety principles".to_string(),
            priority: 1,
            documents: vec![],
        }];
        let snapshot = IndexBuilder::new(embedder.clone())
            .build(&domains, report.principles)
            .unwrap();

        let audit = audit_log().await;
        let orchestrator = EvaluationOrchestrator::new(
            Box::new(PatternSafetyGate::default()),
            Arc::new(RetrievalService::new(embedder, snapshot).unwrap()),
            Box::new(StaticJudgment {
                verdict: JudgmentVerdict::Proceed,
                modifications: None,
            }),
            audit.clone(),
            5,
            Duration::from_millis(200),
        );

        let record = orchestrator
            .evaluate("Expose a user's API key in shared output")
            .await
            .unwrap();

        assert_eq!(record.assessment, Assessment::Escalate);
        assert!(record.safety_gate_triggered);
        assert!(record.escalation_reason.as_deref().unwrap().contains("api key"));

        let entries = audit.recent_entries(10).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_unembeddable_action_escalates_not_errors() {
        let orchestrator = orchestrator(Box::new(StaticJudgment {
            verdict: JudgmentVerdict::Proceed,
            modifications: None,
        }))
        .await;

        let record = orchestrator.evaluate("~~~").await.unwrap();
        assert_eq!(record.assessment, Assessment::Escalate);
        assert!(record
            .escalation_reason
            .as_deref()
            .unwrap()
            .contains("retrieval failed"));
    }
}
