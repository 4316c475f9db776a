//! Contract and submission persistence (spec.md §4.3).

mod lock;
mod memory;
mod sled_store;

pub use lock::ContractGuard;
pub use memory::InMemoryContractStore;
pub use sled_store::SledContractStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClearinghouseError;
use crate::event_log::{AuditEvent, EventLog};
use crate::state_machine::Status;
use crate::types::{Amount, ContractId, SubmissionId, Timestamp};

/// One escrow contract (spec.md §3 `Contract` entity).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    /// Unique id.
    pub id: ContractId,
    /// The buyer agent's id.
    pub buyer_id: String,
    /// The worker agent's id, once one has been assigned.
    pub worker_id: Option<String>,
    /// Escrowed amount.
    pub amount: Amount,
    /// Human-readable task description.
    pub description: String,
    /// Verifier descriptor (spec.md §6), stored as raw structured JSON so
    /// the store never needs to know about concrete verifier types.
    pub verification_descriptor: Value,
    /// Optional JSON Schema document, used by the `schema` verifier
    /// strategy.
    pub requirements_schema: Option<Value>,
    /// Current lifecycle status.
    pub status: Status,
    /// Number of verification failures recorded so far.
    pub retry_count: u32,
    /// Maximum number of retries before the contract fails permanently.
    pub max_retries: u32,
    /// Escrow wallet address opened for this contract's funds.
    #[serde(default)]
    pub escrow_wallet: Option<String>,
    /// Opaque reference to the on-chain/off-chain funding transaction.
    pub funding_ref: Option<String>,
    /// Opaque reference to the worker settlement payout.
    pub settlement_ref: Option<String>,
    /// When the contract was created.
    pub created_at: Timestamp,
    /// When the contract was last mutated.
    pub updated_at: Timestamp,
}

/// One work submission against a contract (spec.md §3 `Submission` entity).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    /// Unique id.
    pub id: SubmissionId,
    /// The contract this submission is for.
    pub contract_id: ContractId,
    /// Opaque submitted payload bytes.
    pub payload: Vec<u8>,
    /// The agent that recorded this submission, if known.
    #[serde(default)]
    pub submitted_by: Option<String>,
    /// Set once a verification run has recorded a verdict.
    pub is_valid: Option<bool>,
    /// The strategy's full structured result, once a verification run has
    /// recorded a verdict (spec.md §4.4 `VerifyResult`).
    #[serde(default)]
    pub verification_result: Option<Value>,
    /// When the submission was recorded.
    pub submitted_at: Timestamp,
}

/// Persistence for contracts and their submissions, with per-contract
/// locking for the unit-of-work guarantee of spec.md §5.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Acquire the per-contract lock, blocking until it is free. The
    /// returned guard must be held for the duration of a unit of work and
    /// dropped at its end.
    async fn lock(&self, contract_id: ContractId) -> ContractGuard;

    /// Insert a newly created contract.
    async fn create(&self, contract: Contract) -> Result<Contract, ClearinghouseError>;

    /// Fetch a contract by id.
    async fn get(&self, contract_id: ContractId) -> Result<Option<Contract>, ClearinghouseError>;

    /// All contracts currently in `status`, newest-created first.
    async fn list_by_status(&self, status: Status) -> Result<Vec<Contract>, ClearinghouseError>;

    /// All contracts posted by `buyer_id`, newest-created first.
    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Contract>, ClearinghouseError>;

    /// Persist the full contract row (status, retry_count, refs, ...).
    /// Callers must hold the contract's lock.
    async fn save(&self, contract: Contract) -> Result<Contract, ClearinghouseError>;

    /// Record a new submission.
    async fn add_submission(
        &self,
        submission: Submission,
    ) -> Result<Submission, ClearinghouseError>;

    /// The most recently submitted submission for a contract, if any.
    async fn latest_submission(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<Submission>, ClearinghouseError>;

    /// Record a verdict and the strategy's full structured result against
    /// a previously recorded submission (spec.md §4.3
    /// `update_submission_verification`). A missing submission id is a
    /// no-op (mirrors the synthetic "no submissions" verification
    /// failure, which has no real submission row to update).
    async fn update_submission_verification(
        &self,
        submission_id: SubmissionId,
        is_valid: bool,
        result: Value,
    ) -> Result<(), ClearinghouseError>;

    /// Persist the contract row and append its accompanying audit event
    /// as a single atomic unit (spec.md §9 "a store that can only update
    /// the contract row or only append the event row but not both
    /// together is incorrect"). The default implementation performs the
    /// two writes in sequence, which is sufficient for a backend (like
    /// the in-memory store) that cannot partially fail; a durable backend
    /// must override this to commit both writes in one transaction.
    async fn save_with_event(
        &self,
        contract: Contract,
        event: AuditEvent,
    ) -> Result<(Contract, AuditEvent), ClearinghouseError>
    where
        Self: EventLog,
    {
        let contract = self.save(contract).await?;
        let event = EventLog::append(self, event).await?;
        Ok((contract, event))
    }
}

/// A store that is both a [`ContractStore`] and an [`EventLog`] — the
/// interface the service layer actually depends on, since every backend
/// ships both halves against the same underlying storage.
pub trait Store: ContractStore + EventLog {}

impl<T: ContractStore + EventLog + ?Sized> Store for T {}
