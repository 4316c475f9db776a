//! Domain error taxonomy (spec.md §7).
//!
//! `ClearinghouseError` is the one error type every fallible public
//! operation returns. Each variant carries a stable, machine-readable
//! `.code()` so a caller mapping these onto a transport (HTTP status,
//! RPC code, ...) has a fixed contract to build against, without this
//! crate knowing anything about that transport.

use crate::types::ContractId;
use thiserror::Error;

/// Sub-taxonomy for the eight ways a verifier run itself can fail.
/// These populate [`crate::verifier::VerifyResult::error`] rather than
/// being thrown as a [`ClearinghouseError`] — a failed verification is a
/// normal outcome, not an exceptional one.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerificationErrorKind {
    /// The configured sandbox could not be reached after retrying.
    #[error("sandbox error: {0}")]
    SandboxError(String),
    /// The sandbox run exceeded its configured timeout.
    #[error("execution timed out")]
    ExecutionTimeout,
    /// The configured LLM judge could not be reached after retrying.
    #[error("judge error: {0}")]
    LlmJudgeError(String),
    /// The submission payload was not valid JSON where the schema strategy required one.
    #[error("invalid json payload: {0}")]
    InvalidJson(String),
    /// The `requirements_schema` itself is not a valid JSON Schema document.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A schema verification descriptor carried no `requirements_schema`.
    #[error("missing requirements schema")]
    MissingSchema,
    /// A semantic verification descriptor carried no non-empty `criteria`.
    #[error("missing criteria")]
    MissingCriteria,
    /// No sandbox credential/endpoint was configured for the code-execution strategy.
    #[error("missing sandbox key: {0}")]
    MissingSandboxKey(String),
    /// No submission existed to verify.
    #[error("no submissions recorded for contract")]
    NoSubmissions,
}

impl VerificationErrorKind {
    /// Stable machine-readable code, matching the original implementation's
    /// string constants one for one.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SandboxError(_) => "SANDBOX_ERROR",
            Self::ExecutionTimeout => "EXECUTION_TIMEOUT",
            Self::LlmJudgeError(_) => "LLM_JUDGE_ERROR",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::MissingSchema => "MISSING_SCHEMA",
            Self::MissingCriteria => "MISSING_CRITERIA",
            Self::MissingSandboxKey(_) => "MISSING_SANDBOX_KEY",
            Self::NoSubmissions => "NO_SUBMISSIONS",
        }
    }
}

/// The one error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum ClearinghouseError {
    /// No contract exists with the given id.
    #[error("contract {0} not found")]
    ContractNotFound(ContractId),

    /// The requested operation is not legal from the contract's current
    /// status.
    #[error("cannot apply event {event} to contract {contract_id} in status {current}")]
    IllegalTransition {
        /// The contract the transition was attempted on.
        contract_id: ContractId,
        /// The status the contract was in when the transition was attempted.
        current: String,
        /// The event that was rejected.
        event: String,
    },

    /// A persisted status string did not match any known [`crate::state_machine::Status`].
    #[error("unknown contract status {0:?}")]
    UnknownState(String),

    /// `accept_contract` was called on a contract that already has a
    /// worker assigned.
    #[error("contract {0} already has a worker assigned")]
    WorkerAlreadyAssigned(ContractId),

    /// A verification run failed. Carries the same sub-taxonomy recorded
    /// on the [`crate::verifier::VerifyResult`] that produced it.
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationErrorKind),

    /// The verifier descriptor named a `type` the factory has no strategy
    /// registered for.
    #[error("unknown verifier type {type_name:?}, known types: {known:?}")]
    UnknownVerifierType {
        /// The unrecognized type tag.
        type_name: String,
        /// The set of type tags the factory does recognize.
        known: Vec<&'static str>,
    },

    /// A verifier descriptor was structurally malformed (missing a
    /// required field, wrong JSON shape).
    #[error("malformed verifier descriptor: {0}")]
    InvalidDescriptor(String),

    /// The configured payment adapter failed.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// An operation that must happen at most once (e.g. funding) was
    /// attempted a second time.
    #[error("duplicate operation: {0}")]
    DuplicateOperation(String),

    /// A submission payload exceeded the configured size ceiling.
    #[error("submission payload of {size} bytes exceeds the {limit}-byte ceiling")]
    PayloadTooLarge {
        /// The size of the rejected payload, in bytes.
        size: usize,
        /// The configured ceiling it exceeded.
        limit: usize,
    },

    /// The storage backend failed for a reason unrelated to domain logic.
    #[error("store error: {0}")]
    Store(String),
}

impl ClearinghouseError {
    /// Stable machine-readable code for this error, for callers that need
    /// to map onto a transport-specific error representation.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ContractNotFound(_) => "CONTRACT_NOT_FOUND",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::UnknownState(_) => "UNKNOWN_STATE",
            Self::WorkerAlreadyAssigned(_) => "WORKER_ALREADY_ASSIGNED",
            Self::Verification(_) => "VERIFICATION_ERROR",
            Self::UnknownVerifierType { .. } => "UNKNOWN_VERIFIER_TYPE",
            Self::InvalidDescriptor(_) => "INVALID_DESCRIPTOR",
            Self::PaymentFailed(_) => "PAYMENT_ERROR",
            Self::DuplicateOperation(_) => "DUPLICATE_OPERATION",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}
