//! Offline, deterministic stand-in for a hosted model client, so the
//! semantic strategy is exercisable without a real judge. Formats the
//! exact three-line verdict grammar the strategy parses (spec.md §4.4.2)
//! from a keyword-containment heuristic against the criteria.

use async_trait::async_trait;

use super::Judge;
use crate::error::ClearinghouseError;

/// A [`Judge`] that decides `TRUE` when the payload shares at least one
/// non-trivial word with the criteria, and `FALSE` otherwise. Good enough
/// to exercise the semantic strategy end to end in tests and demos; a
/// real `Judge` (an HTTP client to a hosted model) replaces this in
/// production.
#[derive(Default)]
pub struct SimulatedJudge;

impl SimulatedJudge {
    /// Fraction of the criteria's significant words that must also appear
    /// in the payload for the simulated verdict to be `TRUE`.
    const PASS_THRESHOLD: f64 = 0.4;

    fn significant_words(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > 3)
            .collect()
    }
}

#[async_trait]
impl Judge for SimulatedJudge {
    async fn ask(&self, prompt: &str) -> Result<String, ClearinghouseError> {
        let (criteria, payload) = split_prompt(prompt);
        let criteria_words = Self::significant_words(criteria);
        let payload_lower = payload.to_lowercase();

        let matched = criteria_words
            .iter()
            .filter(|w| payload_lower.contains(w.as_str()))
            .count();
        let ratio = if criteria_words.is_empty() {
            0.0
        } else {
            matched as f64 / criteria_words.len() as f64
        };
        let verdict = ratio >= Self::PASS_THRESHOLD;

        Ok(format!(
            "VERDICT: {}\nSCORE: {:.2}\nREASONING: simulated judge matched {matched}/{len} criteria keywords in the submission.",
            if verdict { "TRUE" } else { "FALSE" },
            ratio,
            len = criteria_words.len().max(1),
        ))
    }
}

/// Splits the strategy's judge prompt back into criteria and payload
/// sections, matching the `## Criteria` / `## Submitted Work` markers the
/// semantic strategy writes.
fn split_prompt(prompt: &str) -> (&str, &str) {
    let criteria = prompt
        .split("## Criteria")
        .nth(1)
        .and_then(|rest| rest.split("## Submitted Work").next())
        .unwrap_or(prompt)
        .trim();
    let payload = prompt
        .split("## Submitted Work")
        .nth(1)
        .unwrap_or(prompt)
        .trim();
    (criteria, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_payload_yields_true_verdict() {
        let prompt = "## Criteria\nmust mention rhyme and poem\n\n## Submitted Work\nThis poem has a perfect rhyme scheme.";
        let response = SimulatedJudge.ask(prompt).await.unwrap();
        assert!(response.starts_with("VERDICT: TRUE"));
    }

    #[tokio::test]
    async fn unrelated_payload_yields_false_verdict() {
        let prompt = "## Criteria\nmust mention rhyme and poem\n\n## Submitted Work\nCompletely unrelated text about weather.";
        let response = SimulatedJudge.ask(prompt).await.unwrap();
        assert!(response.starts_with("VERDICT: FALSE"));
    }
}
