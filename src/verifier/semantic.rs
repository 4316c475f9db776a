//! LLM-judged semantic comparison strategy (spec.md §4.4.2).
//!
//! Every parsing ambiguity resolves to `FALSE` — an unparseable or
//! missing verdict is never treated as a pass.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{VerifierDescriptor, VerifyRequest, VerifyResult, Verifier};
use crate::adapters::Judge;
use crate::error::{ClearinghouseError, VerificationErrorKind};

/// Total attempts (including the first) made against the judge client.
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_MIN_SECS: u64 = 2;
const BACKOFF_MAX_SECS: u64 = 10;

const JUDGE_SYSTEM_PROMPT: &str = "You are an impartial, strict verification judge for an AI escrow system. \
Determine whether submitted work meets the specified criteria. Be objective and strict: any ambiguity fails. \
Respond in exactly this format, no extra text before or after:\n\n\
VERDICT: TRUE or FALSE\n\
SCORE: a number from 0.0 to 1.0\n\
REASONING: one paragraph explaining your decision";

/// Delegates judgement to a [`Judge`] and parses its structured response.
pub struct SemanticVerifier {
    judge: Arc<dyn Judge>,
}

impl SemanticVerifier {
    /// Build a strategy backed by `judge`.
    #[must_use]
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    fn build_prompt(criteria: &str, payload: &str) -> String {
        format!(
            "{JUDGE_SYSTEM_PROMPT}\n\n## Criteria\n{criteria}\n\n## Submitted Work\n{payload}\n\nEvaluate whether the submitted work meets the criteria above."
        )
    }

    async fn ask_with_retry(&self, prompt: &str) -> Result<String, ClearinghouseError> {
        let mut attempt = 0;
        loop {
            match self.judge.ask(prompt).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt + 1 < MAX_ATTEMPTS => {
                    let backoff = BACKOFF_MIN_SECS
                        .saturating_mul(1 << attempt)
                        .min(BACKOFF_MAX_SECS);
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                    let _ = err;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Parse the judge's three-line verdict grammar. Every ambiguity
    /// resolves to `(false, 0.0, ...)` per spec.md §4.4.2.
    fn parse_response(response: &str) -> (bool, f64, String) {
        let mut verdict = false;
        let mut score = 0.0_f64;
        let mut reasoning = String::new();

        for line in response.lines() {
            let trimmed = line.trim();
            let upper = trimmed.to_uppercase();
            if let Some(rest) = upper.strip_prefix("VERDICT:") {
                verdict = rest.trim() == "TRUE";
            } else if let Some(rest) = upper.strip_prefix("SCORE:") {
                score = rest.trim().parse::<f64>().unwrap_or(0.0).clamp(0.0, 1.0);
            } else if upper.starts_with("REASONING:") {
                if let Some(idx) = trimmed.to_uppercase().find("REASONING:") {
                    reasoning = trimmed[idx + "REASONING:".len()..].trim().to_owned();
                }
            }
        }

        if reasoning.is_empty() {
            if let Some(idx) = response.to_uppercase().find("REASONING:") {
                reasoning = response[idx + "REASONING:".len()..].trim().to_owned();
            }
        }
        if reasoning.is_empty() {
            let preview: String = response.chars().take(200).collect();
            reasoning = format!("could not parse structured reasoning from judge response: {preview}");
        }

        (verdict, score, reasoning)
    }
}

#[async_trait]
impl Verifier for SemanticVerifier {
    async fn verify(&self, request: &VerifyRequest) -> VerifyResult {
        let VerifierDescriptor::Semantic { criteria } = &request.descriptor else {
            return VerifyResult::reject("semantic verifier invoked with a mismatched descriptor");
        };

        if criteria.trim().is_empty() {
            return VerifyResult::strategy_error(&VerificationErrorKind::MissingCriteria, json!({}));
        }

        let payload = String::from_utf8_lossy(&request.payload).into_owned();
        let prompt = Self::build_prompt(criteria, &payload);

        let response = match self.ask_with_retry(&prompt).await {
            Ok(response) => response,
            Err(err) => {
                return VerifyResult::strategy_error(
                    &VerificationErrorKind::LlmJudgeError(err.to_string()),
                    json!({}),
                );
            }
        };

        let (verdict, score, reasoning) = Self::parse_response(&response);
        VerifyResult {
            is_valid: verdict,
            score: Some(score),
            details: reasoning,
            logs: json!({"judge_response": response, "criteria": criteria}),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractId;

    struct FixedJudge(&'static str);

    #[async_trait]
    impl Judge for FixedJudge {
        async fn ask(&self, _prompt: &str) -> Result<String, ClearinghouseError> {
            Ok(self.0.to_owned())
        }
    }

    fn request(criteria: &str, payload: &str) -> VerifyRequest {
        VerifyRequest {
            contract_id: ContractId::new(),
            payload: payload.as_bytes().to_vec(),
            descriptor: VerifierDescriptor::Semantic {
                criteria: criteria.to_owned(),
            },
            requirements_schema: None,
        }
    }

    #[tokio::test]
    async fn exact_true_verdict_parses_as_valid() {
        let verifier = SemanticVerifier::new(Arc::new(FixedJudge(
            "VERDICT: TRUE\nSCORE: 0.9\nREASONING: it rhymes well.",
        )));
        let result = verifier.verify(&request("must rhyme", "roses are red")).await;
        assert!(result.is_valid);
        assert_eq!(result.score, Some(0.9));
        assert_eq!(result.details, "it rhymes well.");
    }

    #[tokio::test]
    async fn ambiguous_verdict_resolves_to_false() {
        let verifier = SemanticVerifier::new(Arc::new(FixedJudge(
            "VERDICT: MAYBE\nSCORE: 0.5\nREASONING: unclear.",
        )));
        let result = verifier.verify(&request("must rhyme", "roses are red")).await;
        assert!(!result.is_valid);
    }

    #[tokio::test]
    async fn missing_criteria_is_a_strategy_error() {
        let verifier = SemanticVerifier::new(Arc::new(FixedJudge("VERDICT: TRUE\nSCORE: 1\nREASONING: ok")));
        let result = verifier.verify(&request("", "anything")).await;
        assert_eq!(result.error.as_deref(), Some("MISSING_CRITERIA"));
    }

    #[tokio::test]
    async fn unparseable_score_clamps_to_zero() {
        let verifier = SemanticVerifier::new(Arc::new(FixedJudge(
            "VERDICT: TRUE\nSCORE: not-a-number\nREASONING: ok",
        )));
        let result = verifier.verify(&request("x", "y")).await;
        assert_eq!(result.score, Some(0.0));
    }
}
