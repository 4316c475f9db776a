//! Deterministic, no-I/O strategy used for offline testing (spec.md §4.4.4).

use async_trait::async_trait;
use serde_json::json;

use super::{VerifierDescriptor, VerifyRequest, VerifyResult, Verifier};

/// Returns a caller-configured verdict with zero I/O.
#[derive(Default)]
pub struct MockVerifier;

#[async_trait]
impl Verifier for MockVerifier {
    async fn verify(&self, request: &VerifyRequest) -> VerifyResult {
        let VerifierDescriptor::Mock {
            should_pass,
            score,
            details,
        } = &request.descriptor
        else {
            return VerifyResult::reject("mock verifier invoked with a non-mock descriptor");
        };

        let score = score.unwrap_or(if *should_pass { 1.0 } else { 0.0 });
        let details = details.clone().unwrap_or_else(|| {
            if *should_pass {
                "mock verification passed".to_owned()
            } else {
                "mock verification failed".to_owned()
            }
        });

        VerifyResult {
            is_valid: *should_pass,
            score: Some(score),
            details,
            logs: json!({"mode": "dry-run", "verifier": "mock"}),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractId;

    fn request(descriptor: VerifierDescriptor) -> VerifyRequest {
        VerifyRequest {
            contract_id: ContractId::new(),
            payload: Vec::new(),
            descriptor,
            requirements_schema: None,
        }
    }

    #[tokio::test]
    async fn reports_configured_pass() {
        let result = MockVerifier
            .verify(&request(VerifierDescriptor::Mock {
                should_pass: true,
                score: None,
                details: None,
            }))
            .await;
        assert!(result.is_valid);
        assert_eq!(result.score, Some(1.0));
    }

    #[tokio::test]
    async fn reports_configured_failure() {
        let result = MockVerifier
            .verify(&request(VerifierDescriptor::Mock {
                should_pass: false,
                score: Some(0.3),
                details: Some("custom reason".to_owned()),
            }))
            .await;
        assert!(!result.is_valid);
        assert_eq!(result.score, Some(0.3));
        assert_eq!(result.details, "custom reason");
    }
}
