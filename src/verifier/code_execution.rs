//! Sandboxed code-execution strategy (spec.md §4.4.1).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{VerifierDescriptor, VerifyRequest, VerifyResult, Verifier};
use crate::adapters::Sandbox;
use crate::error::{ClearinghouseError, VerificationErrorKind};

/// Sandbox allocation is retried this many times (in addition to the
/// first attempt) on transient failure.
const ALLOCATION_RETRIES: u32 = 2;
/// Exponential backoff base between allocation retries.
const BACKOFF_BASE_SECS: u64 = 2;
/// Exponential backoff cap between allocation retries.
const BACKOFF_CAP_SECS: u64 = 8;

/// Runs submitted code through a [`Sandbox`] and checks exit status and
/// (optionally) stdout content.
pub struct CodeExecutionVerifier {
    sandbox: Arc<dyn Sandbox>,
    default_timeout_secs: u64,
}

impl CodeExecutionVerifier {
    /// Build a strategy backed by `sandbox`, falling back to
    /// `default_timeout_secs` when a descriptor doesn't specify its own.
    #[must_use]
    pub fn new(sandbox: Arc<dyn Sandbox>, default_timeout_secs: u64) -> Self {
        Self {
            sandbox,
            default_timeout_secs,
        }
    }

    /// Allocate/run the sandbox, retrying transient failures with
    /// exponential backoff (base 2s, cap 8s). A timeout is never retried —
    /// it is a verdict about the submitted code, not a transient failure.
    async fn run_with_retry(
        &self,
        payload: &[u8],
        timeout_secs: u64,
    ) -> Result<crate::adapters::SandboxOutput, ClearinghouseError> {
        let mut attempt = 0;
        loop {
            match self.sandbox.run(payload, timeout_secs).await {
                Ok(output) => return Ok(output),
                Err(ClearinghouseError::Verification(VerificationErrorKind::ExecutionTimeout)) => {
                    return Err(ClearinghouseError::Verification(
                        VerificationErrorKind::ExecutionTimeout,
                    ));
                }
                Err(err) if attempt < ALLOCATION_RETRIES => {
                    let backoff = BACKOFF_BASE_SECS
                        .saturating_mul(1 << attempt)
                        .min(BACKOFF_CAP_SECS);
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                    let _ = err;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl Verifier for CodeExecutionVerifier {
    async fn verify(&self, request: &VerifyRequest) -> VerifyResult {
        let VerifierDescriptor::CodeExecution {
            timeout,
            expected_output,
        } = &request.descriptor
        else {
            return VerifyResult::reject("code_execution verifier invoked with a mismatched descriptor");
        };

        let timeout_secs = timeout.unwrap_or(self.default_timeout_secs);
        let expected_output = expected_output.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let output = match self.run_with_retry(&request.payload, timeout_secs).await {
            Ok(output) => output,
            Err(ClearinghouseError::Verification(kind)) => {
                return VerifyResult::strategy_error(&kind, json!({"timeout": timeout_secs}));
            }
            Err(other) => {
                return VerifyResult::strategy_error(
                    &VerificationErrorKind::SandboxError(other.to_string()),
                    json!({"timeout": timeout_secs}),
                );
            }
        };

        let logs = json!({
            "stdout": output.stdout,
            "stderr": output.stderr,
            "exit_code": output.exit_code,
            "timeout": timeout_secs,
        });

        if output.exit_code != 0 {
            return VerifyResult::reject(format!("non-zero exit: {}", output.exit_code))
                .with_logs(logs);
        }

        let Some(expected) = expected_output else {
            return VerifyResult::pass(1.0, "code executed successfully with exit code 0")
                .with_logs(logs);
        };

        let stdout_trimmed = output.stdout.trim();
        if stdout_trimmed.contains(expected) {
            VerifyResult::pass(1.0, "output matched expected_output").with_logs(logs)
        } else {
            let preview: String = stdout_trimmed.chars().take(200).collect();
            VerifyResult::reject(format!(
                "output mismatch; expected {expected:?} in {preview:?}"
            ))
            .with_logs(logs)
        }
    }
}
