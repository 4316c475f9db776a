//! Pure dispatch from a descriptor's `type` tag to a concrete strategy
//! (spec.md §4.4.4).

use std::sync::Arc;

use serde_json::Value;

use super::{
    CodeExecutionVerifier, KNOWN_VERIFIER_TYPES, MockVerifier, SchemaVerifier, SemanticVerifier,
    VerifierDescriptor, Verifier,
};
use crate::adapters::{Judge, Sandbox};
use crate::config::{SandboxConfig, SemanticConfig};
use crate::error::ClearinghouseError;

/// Builds the concrete [`Verifier`] named by a contract's verification
/// descriptor. Holds no state of its own beyond the shared sandbox/judge
/// adapters and the defaults new strategy instances are built with.
pub struct VerifierFactory {
    sandbox: Arc<dyn Sandbox>,
    judge: Arc<dyn Judge>,
    default_timeout_secs: u64,
}

impl VerifierFactory {
    /// Build a factory wired to the given adapters and config defaults.
    #[must_use]
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        judge: Arc<dyn Judge>,
        sandbox_config: &SandboxConfig,
        _semantic_config: &SemanticConfig,
    ) -> Self {
        Self {
            sandbox,
            judge,
            default_timeout_secs: sandbox_config.default_timeout_secs,
        }
    }

    /// Parse a raw descriptor `Value` and build the strategy it names.
    ///
    /// # Errors
    /// Returns [`ClearinghouseError::UnknownVerifierType`] for an
    /// unrecognized or missing `type`, or [`ClearinghouseError::InvalidDescriptor`]
    /// if the `type` is known but the remaining fields don't parse.
    pub fn build(&self, descriptor: &Value) -> Result<(VerifierDescriptor, Arc<dyn Verifier>), ClearinghouseError> {
        let type_name = descriptor
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ClearinghouseError::UnknownVerifierType {
                type_name: String::new(),
                known: KNOWN_VERIFIER_TYPES.to_vec(),
            })?;

        if !KNOWN_VERIFIER_TYPES.contains(&type_name) {
            return Err(ClearinghouseError::UnknownVerifierType {
                type_name: type_name.to_owned(),
                known: KNOWN_VERIFIER_TYPES.to_vec(),
            });
        }

        let parsed: VerifierDescriptor = serde_json::from_value(descriptor.clone())
            .map_err(|e| ClearinghouseError::InvalidDescriptor(e.to_string()))?;

        let verifier: Arc<dyn Verifier> = match &parsed {
            VerifierDescriptor::CodeExecution { .. } => Arc::new(CodeExecutionVerifier::new(
                self.sandbox.clone(),
                self.default_timeout_secs,
            )),
            VerifierDescriptor::Semantic { .. } => Arc::new(SemanticVerifier::new(self.judge.clone())),
            VerifierDescriptor::Schema => Arc::new(SchemaVerifier),
            VerifierDescriptor::Mock { .. } => Arc::new(MockVerifier),
        };

        Ok((parsed, verifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ProcessSandbox, SimulatedJudge};
    use serde_json::json;

    fn factory() -> VerifierFactory {
        VerifierFactory::new(
            Arc::new(ProcessSandbox::new("python3")),
            Arc::new(SimulatedJudge),
            &SandboxConfig::default(),
            &SemanticConfig::default(),
        )
    }

    #[test]
    fn dispatches_known_types() {
        let f = factory();
        for type_name in KNOWN_VERIFIER_TYPES {
            let descriptor = match type_name {
                "code_execution" => json!({"type": "code_execution"}),
                "semantic" => json!({"type": "semantic", "criteria": "must be nice"}),
                "schema" => json!({"type": "schema"}),
                "mock" => json!({"type": "mock", "should_pass": true}),
                _ => unreachable!(),
            };
            let (parsed, _verifier) = f.build(&descriptor).unwrap();
            assert_eq!(parsed.type_name(), type_name);
        }
    }

    #[test]
    fn unknown_type_is_reported_with_known_types() {
        let f = factory();
        let err = f.build(&json!({"type": "quantum"})).unwrap_err();
        match err {
            ClearinghouseError::UnknownVerifierType { type_name, known } => {
                assert_eq!(type_name, "quantum");
                assert_eq!(known.len(), KNOWN_VERIFIER_TYPES.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_type_is_reported() {
        let f = factory();
        let err = f.build(&json!({})).unwrap_err();
        assert!(matches!(err, ClearinghouseError::UnknownVerifierType { .. }));
    }
}
