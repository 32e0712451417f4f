//! Judgment boundary - the injected external reasoning capability.
//!
//! The engine never classifies non-escalated actions itself. It hands the
//! action plus the consulted principles (full text) to a collaborator and
//! expects back `PROCEED` or `PROCEED_WITH_MODIFICATIONS`. Anything the
//! collaborator cannot answer cleanly becomes an escalation upstream.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::JudgmentConfig;
use crate::domain::ConsultedPrinciple;
use crate::error::{GovernError, GovernResult};

/// Verdict from the judgment capability. `Escalate` is deliberately absent:
/// escalation is owned by the orchestrator and the safety gate, never
/// delegated to the fuzzy layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgmentVerdict {
    Proceed,
    ProceedWithModifications,
}

/// Outcome of a judgment call.
#[derive(Debug, Clone)]
pub struct JudgmentOutcome {
    pub verdict: JudgmentVerdict,
    pub modifications: Option<String>,
}

/// The externally-supplied reasoning component.
#[async_trait]
pub trait JudgmentCapability: Send + Sync {
    async fn judge(
        &self,
        action_description: &str,
        principles: &[ConsultedPrinciple],
    ) -> GovernResult<JudgmentOutcome>;
}

/// Stand-in used when no collaborator is configured. Always errors, which
/// the orchestrator turns into an escalation: no judgment, no free pass.
pub struct UnavailableJudgment;

#[async_trait]
impl JudgmentCapability for UnavailableJudgment {
    async fn judge(
        &self,
        _action_description: &str,
        _principles: &[ConsultedPrinciple],
    ) -> GovernResult<JudgmentOutcome> {
        Err(GovernError::Judgment(
            "no judgment capability configured".to_string(),
        ))
    }
}

/// Request to an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Judgment client backed by an OpenAI-compatible chat endpoint.
pub struct HttpJudgmentClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpJudgmentClient {
    pub fn new(config: &JudgmentConfig) -> GovernResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GovernError::Judgment(format!("cannot build client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn build_prompt(action_description: &str, principles: &[ConsultedPrinciple]) -> String {
        let mut prompt = String::from(
            "You are a governance reviewer. Given the principles below, classify the \
             proposed action.\nAnswer on the first line with exactly PROCEED or \
             PROCEED_WITH_MODIFICATIONS. If modifications are required, describe them \
             after a colon on the same line.\n\nPrinciples:\n",
        );
        for p in principles {
            prompt.push_str(&format!("- [{}] {}\n{}\n\n", p.id, p.title, p.body_text));
        }
        prompt.push_str(&format!("Proposed action:\n{}\n", action_description));
        prompt
    }

    /// Parse the first line of the collaborator's reply.
    fn parse_reply(content: &str) -> GovernResult<JudgmentOutcome> {
        let first_line = content.lines().next().unwrap_or("").trim();

        if let Some(rest) = first_line.strip_prefix("PROCEED_WITH_MODIFICATIONS") {
            let modifications = rest.trim_start_matches(':').trim();
            if modifications.is_empty() {
                return Err(GovernError::Judgment(
                    "modifications verdict without modification text".to_string(),
                ));
            }
            return Ok(JudgmentOutcome {
                verdict: JudgmentVerdict::ProceedWithModifications,
                modifications: Some(modifications.to_string()),
            });
        }

        if first_line == "PROCEED" {
            return Ok(JudgmentOutcome {
                verdict: JudgmentVerdict::Proceed,
                modifications: None,
            });
        }

        Err(GovernError::Judgment(format!(
            "unrecognized verdict: '{}'",
            first_line
        )))
    }
}

#[async_trait]
impl JudgmentCapability for HttpJudgmentClient {
    async fn judge(
        &self,
        action_description: &str,
        principles: &[ConsultedPrinciple],
    ) -> GovernResult<JudgmentOutcome> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::build_prompt(action_description, principles),
            }],
            max_tokens: Some(512),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GovernError::Judgment(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GovernError::Judgment(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GovernError::Judgment(format!("malformed response: {}", e)))?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| GovernError::Judgment("response carried no choices".to_string()))?;

        Self::parse_reply(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proceed() {
        let outcome = HttpJudgmentClient::parse_reply("PROCEED\nrationale follows").unwrap();
        assert_eq!(outcome.verdict, JudgmentVerdict::Proceed);
        assert!(outcome.modifications.is_none());
    }

    #[test]
    fn test_parse_proceed_with_modifications() {
        let outcome =
            HttpJudgmentClient::parse_reply("PROCEED_WITH_MODIFICATIONS: redact the user id")
                .unwrap();
        assert_eq!(outcome.verdict, JudgmentVerdict::ProceedWithModifications);
        assert_eq!(outcome.modifications.as_deref(), Some("redact the user id"));
    }

    #[test]
    fn test_modifications_verdict_requires_text() {
        let result = HttpJudgmentClient::parse_reply("PROCEED_WITH_MODIFICATIONS:");
        assert!(matches!(result, Err(GovernError::Judgment(_))));
    }

    #[test]
    fn test_unrecognized_verdict_is_error() {
        let result = HttpJudgmentClient::parse_reply("LOOKS FINE TO ME");
        assert!(matches!(result, Err(GovernError::Judgment(_))));
    }

    #[tokio::test]
    async fn test_unavailable_judgment_errors() {
        let judgment = UnavailableJudgment;
        let result = judgment.judge("anything", &[]).await;
        assert!(matches!(result, Err(GovernError::Judgment(_))));
    }

    #[test]
    fn test_prompt_carries_full_principle_text() {
        let principles = vec![ConsultedPrinciple {
            id: "coding-context-specification-completeness".to_string(),
            title: "Specification Completeness".to_string(),
            body_text: "Definition: every requirement is stated.".to_string(),
            score: 0.9,
        }];
        let prompt = HttpJudgmentClient::build_prompt("ship the feature", &principles);
        assert!(prompt.contains("every requirement is stated"));
        assert!(prompt.contains("ship the feature"));
    }
}
