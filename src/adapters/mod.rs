//! Concrete default implementations of the three I/O-performing
//! collaborators the core consumes (spec.md §6 adapter surface, §1 scope
//! note): a [`Sandbox`], a [`Judge`], and a [`PaymentAdapter`].
//!
//! None of these are security boundaries or production payment rails —
//! real deployments plug in their own sandbox runtime, hosted model
//! client, and on-chain payment adapter behind the same three traits.

mod process_sandbox;
mod simulated_judge;
mod simulated_payment;

pub use process_sandbox::ProcessSandbox;
pub use simulated_judge::SimulatedJudge;
pub use simulated_payment::SimulatedPaymentAdapter;

use async_trait::async_trait;

use crate::error::ClearinghouseError;
use crate::types::Amount;

/// The outcome of one sandboxed run.
#[derive(Clone, Debug)]
pub struct SandboxOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

/// An isolated execution environment with bounded time and no trust in
/// the code it runs (spec.md glossary). `run` itself is not retried or
/// time-boxed beyond `timeout_secs` — the calling strategy owns the
/// outer retry/backoff policy (spec.md §4.4.1).
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute `code` with a wall-clock budget of `timeout_secs`.
    ///
    /// # Errors
    /// Returns [`ClearinghouseError::Verification`] with
    /// [`crate::error::VerificationErrorKind::SandboxError`] or
    /// [`crate::error::VerificationErrorKind::ExecutionTimeout`] if the run
    /// could not be allocated, executed, or collected.
    async fn run(&self, code: &[u8], timeout_secs: u64) -> Result<SandboxOutput, ClearinghouseError>;
}

/// An external model client that takes a prompt and returns raw text
/// (spec.md §6 adapter surface).
#[async_trait]
pub trait Judge: Send + Sync {
    /// Send `prompt` and return the model's raw response text.
    ///
    /// # Errors
    /// Returns [`ClearinghouseError::Verification`] with
    /// [`crate::error::VerificationErrorKind::LlmJudgeError`] if the
    /// client could not produce a response.
    async fn ask(&self, prompt: &str) -> Result<String, ClearinghouseError>;
}

/// Escrow-wallet creation, funding confirmation, and settlement payout
/// (spec.md §4.7). The core never inspects the returned refs beyond
/// storing them.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a new escrow wallet and return its opaque id.
    async fn create_escrow_wallet(&self) -> Result<String, ClearinghouseError>;

    /// Confirm that `amount` has moved from `buyer` into `wallet`, and
    /// return an opaque funding reference.
    async fn confirm_funding(
        &self,
        wallet: &str,
        amount: Amount,
        buyer: &str,
    ) -> Result<String, ClearinghouseError>;

    /// Transfer `amount` from the escrow wallet to `worker`, and return an
    /// opaque settlement reference.
    async fn transfer_to_worker(
        &self,
        from_wallet: &str,
        worker: &str,
        amount: Amount,
    ) -> Result<String, ClearinghouseError>;
}
