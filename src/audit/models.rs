//! Row types for the audit database and their domain conversions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Assessment, AssessmentRecord, AuditEntry, BypassClass, BypassLogEntry};
use crate::engine::GatewayDecision;
use crate::error::{GovernError, GovernResult};

/// Row of the `audit_log` table. One table holds both entry kinds;
/// `kind` discriminates.
#[derive(Debug, Clone, FromRow)]
pub struct AuditRow {
    pub audit_id: i64,
    pub record_uid: String,
    pub recorded_at: String,
    pub kind: String,
    pub action_description: String,
    pub assessment: Option<String>,
    pub principles_consulted: Option<String>,
    pub routed_domain: Option<String>,
    pub safety_gate_triggered: i64,
    pub matched_patterns: Option<String>,
    pub modifications: Option<String>,
    pub escalation_reason: Option<String>,
    pub bypass_class: Option<String>,
    pub bypass_rationale: Option<String>,
}

pub const KIND_ASSESSMENT: &str = "assessment";
pub const KIND_BYPASS: &str = "bypass";

impl AuditRow {
    /// Convert a stored row back into its domain form.
    pub fn into_entry(self) -> GovernResult<AuditEntry> {
        let record_uid = Uuid::parse_str(&self.record_uid)
            .map_err(|e| GovernError::Internal(format!("corrupt record_uid: {}", e)))?;
        let recorded_at = parse_timestamp(&self.recorded_at)?;

        match self.kind.as_str() {
            KIND_ASSESSMENT => {
                let assessment: Assessment = self
                    .assessment
                    .as_deref()
                    .unwrap_or_default()
                    .parse()
                    .map_err(GovernError::Internal)?;

                Ok(AuditEntry::Assessment(AssessmentRecord {
                    audit_id: self.audit_id,
                    record_uid,
                    recorded_at,
                    action_description: self.action_description,
                    assessment,
                    principles_consulted: parse_string_list(
                        self.principles_consulted.as_deref(),
                    )?,
                    routed_domain: self.routed_domain,
                    safety_gate_triggered: self.safety_gate_triggered != 0,
                    matched_patterns: parse_string_list(self.matched_patterns.as_deref())?,
                    modifications: self.modifications,
                    escalation_reason: self.escalation_reason,
                }))
            }
            KIND_BYPASS => {
                let class: BypassClass = self
                    .bypass_class
                    .as_deref()
                    .unwrap_or_default()
                    .parse()
                    .map_err(GovernError::Internal)?;

                Ok(AuditEntry::Bypass(BypassLogEntry {
                    audit_id: self.audit_id,
                    record_uid,
                    recorded_at,
                    action_description: self.action_description,
                    class,
                    rationale: self.bypass_rationale.unwrap_or_default(),
                }))
            }
            other => Err(GovernError::Internal(format!(
                "unknown audit entry kind: {}",
                other
            ))),
        }
    }
}

/// Row of the `gateway_decisions` table.
#[derive(Debug, Clone, FromRow)]
pub struct GatewayDecisionRow {
    pub id: String,
    pub audit_id: i64,
    pub tool: String,
    pub decision: String,
    pub reason: Option<String>,
    pub created_at: String,
}

/// Domain form of one gateway decision.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GatewayDecisionRecord {
    pub id: Uuid,
    /// The assessment record this decision was based on.
    pub audit_id: i64,
    pub tool: String,
    pub decision: GatewayDecision,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GatewayDecisionRow {
    pub fn into_record(self) -> GovernResult<GatewayDecisionRecord> {
        Ok(GatewayDecisionRecord {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| GovernError::Internal(format!("corrupt decision id: {}", e)))?,
            audit_id: self.audit_id,
            tool: self.tool,
            decision: self.decision.parse().map_err(GovernError::Internal)?,
            reason: self.reason,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> GovernResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GovernError::Internal(format!("corrupt timestamp '{}': {}", raw, e)))
}

fn parse_string_list(raw: Option<&str>) -> GovernResult<Vec<String>> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(json) => Ok(serde_json::from_str(json)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment_row() -> AuditRow {
        AuditRow {
            audit_id: 1,
            record_uid: Uuid::new_v4().to_string(),
            recorded_at: Utc::now().to_rfc3339(),
            kind: KIND_ASSESSMENT.to_string(),
            action_description: "summarize notes".to_string(),
            assessment: Some("proceed".to_string()),
            principles_consulted: Some(r#"["meta-safety-non-maleficence"]"#.to_string()),
            routed_domain: Some("meta".to_string()),
            safety_gate_triggered: 0,
            matched_patterns: Some("[]".to_string()),
            modifications: None,
            escalation_reason: None,
            bypass_class: None,
            bypass_rationale: None,
        }
    }

    #[test]
    fn test_assessment_row_converts() {
        let entry = assessment_row().into_entry().unwrap();
        match entry {
            AuditEntry::Assessment(record) => {
                assert_eq!(record.assessment, Assessment::Proceed);
                assert_eq!(
                    record.principles_consulted,
                    vec!["meta-safety-non-maleficence".to_string()]
                );
                assert!(!record.safety_gate_triggered);
            }
            other => panic!("expected assessment entry, got {:?}", other),
        }
    }

    #[test]
    fn test_bypass_row_converts() {
        let mut row = assessment_row();
        row.kind = KIND_BYPASS.to_string();
        row.bypass_class = Some("read_only".to_string());
        row.bypass_rationale = Some("no side effects".to_string());

        let entry = row.into_entry().unwrap();
        match entry {
            AuditEntry::Bypass(bypass) => {
                assert_eq!(bypass.class, BypassClass::ReadOnly);
                assert_eq!(bypass.rationale, "no side effects");
            }
            other => panic!("expected bypass entry, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut row = assessment_row();
        row.kind = "mystery".to_string();
        assert!(row.into_entry().is_err());
    }

    #[test]
    fn test_corrupt_uid_is_rejected() {
        let mut row = assessment_row();
        row.record_uid = "not-a-uuid".to_string();
        assert!(row.into_entry().is_err());
    }
}
