//! Pluggable verifier dispatch (spec.md §4.4): three concrete strategies
//! behind one `verify(request) -> result` contract, selected by a
//! [`VerifierDescriptor`] tag carried on the contract.

mod code_execution;
mod factory;
mod mock;
mod schema;
mod semantic;

pub use code_execution::CodeExecutionVerifier;
pub use factory::VerifierFactory;
pub use mock::MockVerifier;
pub use schema::SchemaVerifier;
pub use semantic::SemanticVerifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::VerificationErrorKind;
use crate::types::ContractId;

/// The verifier-strategy tags the factory recognizes, in registration order.
pub const KNOWN_VERIFIER_TYPES: [&str; 4] = ["code_execution", "semantic", "schema", "mock"];

/// Verifier configuration carried on a contract (spec.md §6). A tagged
/// variant rather than a free-form map, so the factory can enforce
/// required fields at parse time instead of re-checking them per strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerifierDescriptor {
    /// Runs submitted code in an isolated sandbox.
    CodeExecution {
        /// Wall-clock budget in seconds; falls back to [`crate::config::SandboxConfig::default_timeout_secs`].
        #[serde(default)]
        timeout: Option<u64>,
        /// Substring that must appear in trimmed stdout for the run to pass.
        #[serde(default)]
        expected_output: Option<String>,
    },
    /// Delegates judgement to an external model.
    Semantic {
        /// Non-empty acceptance criteria shown to the judge.
        criteria: String,
    },
    /// Validates the payload against the contract's `requirements_schema`.
    Schema,
    /// Deterministic, no-I/O strategy for offline testing.
    Mock {
        /// The verdict to return.
        should_pass: bool,
        /// Score to report; defaults to 1.0/0.0 based on `should_pass`.
        #[serde(default)]
        score: Option<f64>,
        /// Details string to report; defaults to a generic message.
        #[serde(default)]
        details: Option<String>,
    },
}

impl VerifierDescriptor {
    /// The `type` tag this descriptor was parsed from / serializes to.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::CodeExecution { .. } => "code_execution",
            Self::Semantic { .. } => "semantic",
            Self::Schema => "schema",
            Self::Mock { .. } => "mock",
        }
    }
}

/// Input to a verifier strategy (spec.md §4.4).
#[derive(Clone, Debug)]
pub struct VerifyRequest {
    /// The contract being verified, for logging/correlation only.
    pub contract_id: ContractId,
    /// The submission payload under test.
    pub payload: Vec<u8>,
    /// The parsed descriptor selecting and configuring this run.
    pub descriptor: VerifierDescriptor,
    /// The contract's `requirements_schema`, if any (schema strategy only).
    pub requirements_schema: Option<Value>,
}

/// Output of a verifier strategy run (spec.md §4.4).
///
/// `error` identifies a *strategy failure* — the verifier could not
/// produce a verdict — distinct from `is_valid = false`, which means the
/// work was evaluated and rejected on its merits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Whether the submission passed.
    pub is_valid: bool,
    /// Optional confidence/quality score in `[0, 1]`.
    #[serde(default)]
    pub score: Option<f64>,
    /// Human-readable explanation.
    #[serde(default)]
    pub details: String,
    /// Structured context (stdout/stderr, judge response, validation errors, ...).
    #[serde(default = "default_logs")]
    pub logs: Value,
    /// Stable code identifying a strategy failure, if this run was one.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_logs() -> Value {
    json!({})
}

impl VerifyResult {
    /// A passing result with the given score and details.
    #[must_use]
    pub fn pass(score: f64, details: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            score: Some(score),
            details: details.into(),
            logs: json!({}),
            error: None,
        }
    }

    /// A rejected-on-the-merits result (not a strategy failure).
    #[must_use]
    pub fn reject(details: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            score: None,
            details: details.into(),
            logs: json!({}),
            error: None,
        }
    }

    /// A strategy-failure result: the verifier itself could not run.
    #[must_use]
    pub fn strategy_error(kind: &VerificationErrorKind, logs: Value) -> Self {
        Self {
            is_valid: false,
            score: None,
            details: kind.to_string(),
            logs,
            error: Some(kind.code().to_owned()),
        }
    }

    /// Attach/replace the structured logs.
    #[must_use]
    pub fn with_logs(mut self, logs: Value) -> Self {
        self.logs = logs;
        self
    }
}

/// A single verification strategy. Implementations perform whatever I/O
/// they need (sandbox execution, a model call, nothing at all) and
/// resolve to a [`VerifyResult`] — they never propagate an error, since a
/// strategy failure is itself a kind of verification outcome.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Run this strategy against `request`.
    async fn verify(&self, request: &VerifyRequest) -> VerifyResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_type_name_round_trips_through_json_tag() {
        let d = VerifierDescriptor::CodeExecution {
            timeout: Some(10),
            expected_output: Some("55".to_owned()),
        };
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["type"], "code_execution");
        assert_eq!(d.type_name(), "code_execution");
    }

    #[test]
    fn mock_descriptor_parses_from_external_shape() {
        let value = json!({"type": "mock", "should_pass": false, "details": "nope"});
        let d: VerifierDescriptor = serde_json::from_value(value).unwrap();
        assert!(matches!(d, VerifierDescriptor::Mock { should_pass: false, .. }));
    }
}
