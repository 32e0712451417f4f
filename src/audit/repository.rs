//! Repository layer for the audit database.
//!
//! Writes are append-only: rows are inserted, never updated or deleted.
//! `audit_id` is the AUTOINCREMENT primary key, which gives concurrent
//! appenders a total order without any coordination in this layer.

use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::audit::models::{
    AuditRow, GatewayDecisionRecord, GatewayDecisionRow, KIND_ASSESSMENT, KIND_BYPASS,
};
use crate::domain::{
    AssessmentDraft, AssessmentRecord, AuditEntry, BypassDraft, BypassLogEntry, ComplianceStatus,
};
use crate::engine::GatewayDecision;
use crate::error::{GovernError, GovernResult};

/// Base delay between append retries; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Append-only audit log over SQLite.
#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
    max_retries: u32,
}

impl AuditLog {
    /// Create a log over the given connection pool.
    pub fn new(pool: SqlitePool, max_retries: u32) -> Self {
        Self { pool, max_retries }
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> GovernResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_uid TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                kind TEXT NOT NULL,
                action_description TEXT NOT NULL,
                assessment TEXT,
                principles_consulted TEXT,
                routed_domain TEXT,
                safety_gate_triggered INTEGER NOT NULL DEFAULT 0,
                matched_patterns TEXT,
                modifications TEXT,
                escalation_reason TEXT,
                bypass_class TEXT,
                bypass_rationale TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_recorded_at ON audit_log(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_audit_log_action ON audit_log(action_description);
            CREATE INDEX IF NOT EXISTS idx_audit_log_kind ON audit_log(kind);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gateway_decisions (
                id TEXT PRIMARY KEY,
                audit_id INTEGER NOT NULL,
                tool TEXT NOT NULL,
                decision TEXT NOT NULL,
                reason TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (audit_id) REFERENCES audit_log(audit_id)
            );

            CREATE INDEX IF NOT EXISTS idx_gateway_decisions_created_at
                ON gateway_decisions(created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append an assessment record. Retried with backoff; exhausted retries
    /// escalate as an audit write failure and the evaluation is not
    /// reported successful.
    pub async fn append_assessment(&self, draft: AssessmentDraft) -> GovernResult<AssessmentRecord> {
        let record_uid = Uuid::new_v4();
        let recorded_at = Utc::now();
        let principles_json = serde_json::to_string(&draft.principles_consulted)?;
        let patterns_json = serde_json::to_string(&draft.matched_patterns)?;

        let audit_id = self
            .insert_with_retry(|| {
                sqlx::query(
                    r#"
                    INSERT INTO audit_log (
                        record_uid, recorded_at, kind, action_description,
                        assessment, principles_consulted, routed_domain,
                        safety_gate_triggered, matched_patterns,
                        modifications, escalation_reason
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(record_uid.to_string())
                .bind(recorded_at.to_rfc3339())
                .bind(KIND_ASSESSMENT)
                .bind(&draft.action_description)
                .bind(draft.assessment.to_string())
                .bind(&principles_json)
                .bind(&draft.routed_domain)
                .bind(draft.safety_gate_triggered as i64)
                .bind(&patterns_json)
                .bind(&draft.modifications)
                .bind(&draft.escalation_reason)
            })
            .await?;

        Ok(AssessmentRecord {
            audit_id,
            record_uid,
            recorded_at,
            action_description: draft.action_description,
            assessment: draft.assessment,
            principles_consulted: draft.principles_consulted,
            routed_domain: draft.routed_domain,
            safety_gate_triggered: draft.safety_gate_triggered,
            matched_patterns: draft.matched_patterns,
            modifications: draft.modifications,
            escalation_reason: draft.escalation_reason,
        })
    }

    /// Append a bypass entry. Same durability contract as assessments.
    pub async fn append_bypass(&self, draft: BypassDraft) -> GovernResult<BypassLogEntry> {
        let record_uid = Uuid::new_v4();
        let recorded_at = Utc::now();

        let audit_id = self
            .insert_with_retry(|| {
                sqlx::query(
                    r#"
                    INSERT INTO audit_log (
                        record_uid, recorded_at, kind, action_description,
                        bypass_class, bypass_rationale
                    )
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(record_uid.to_string())
                .bind(recorded_at.to_rfc3339())
                .bind(KIND_BYPASS)
                .bind(&draft.action_description)
                .bind(draft.class.to_string())
                .bind(&draft.rationale)
            })
            .await?;

        Ok(BypassLogEntry {
            audit_id,
            record_uid,
            recorded_at,
            action_description: draft.action_description,
            class: draft.class,
            rationale: draft.rationale,
        })
    }

    /// Record one gateway decision, independent of the assessment record.
    pub async fn record_gateway_decision(
        &self,
        audit_id: i64,
        tool: &str,
        decision: GatewayDecision,
        reason: Option<&str>,
    ) -> GovernResult<GatewayDecisionRecord> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO gateway_decisions (id, audit_id, tool, decision, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(audit_id)
        .bind(tool)
        .bind(decision.to_string())
        .bind(reason)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(GatewayDecisionRecord {
            id,
            audit_id,
            tool: tool.to_string(),
            decision,
            reason: reason.map(str::to_string),
            created_at,
        })
    }

    /// Post-hoc check that an action was preceded by an evaluation within
    /// the window. Bypass-only coverage is partial, not compliant.
    pub async fn verify_compliance(
        &self,
        action_description: &str,
        window: chrono::Duration,
    ) -> GovernResult<ComplianceStatus> {
        let cutoff = (Utc::now() - window).to_rfc3339();

        let assessments: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM audit_log
            WHERE kind = ? AND action_description = ? AND recorded_at >= ?
            "#,
        )
        .bind(KIND_ASSESSMENT)
        .bind(action_description)
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;

        if assessments > 0 {
            return Ok(ComplianceStatus::Compliant);
        }

        let bypasses: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM audit_log
            WHERE kind = ? AND action_description = ? AND recorded_at >= ?
            "#,
        )
        .bind(KIND_BYPASS)
        .bind(action_description)
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;

        if bypasses > 0 {
            Ok(ComplianceStatus::Partial)
        } else {
            Ok(ComplianceStatus::NonCompliant)
        }
    }

    /// Most recent audit entries, newest first.
    pub async fn recent_entries(&self, limit: i64) -> GovernResult<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT * FROM audit_log ORDER BY audit_id DESC LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }

    /// Most recent gateway decisions, newest first.
    pub async fn recent_gateway_decisions(
        &self,
        limit: i64,
    ) -> GovernResult<Vec<GatewayDecisionRecord>> {
        let rows: Vec<GatewayDecisionRow> = sqlx::query_as(
            r#"
            SELECT * FROM gateway_decisions ORDER BY created_at DESC LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GatewayDecisionRow::into_record).collect()
    }

    /// True when the database answers a trivial query; used by health checks.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Run an insert, retrying transient failures with exponential backoff.
    /// Returns the assigned audit_id.
    async fn insert_with_retry<'q, F>(&self, build_query: F) -> GovernResult<i64>
    where
        F: Fn() -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    {
        let mut attempt = 0u32;
        loop {
            match build_query().execute(&self.pool).await {
                Ok(result) => return Ok(result.last_insert_rowid()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Audit append failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Audit append exhausted retries"
                    );
                    return Err(GovernError::AuditWrite(format!(
                        "append failed after {} attempts: {}",
                        attempt + 1,
                        e
                    )));
                }
            }
        }
    }
}
