//! The escrow service (spec.md §4.5): the only component authorised to
//! mutate a contract's status. Every public method loads the contract,
//! fires one state-machine event, applies the matching domain update, and
//! appends the canonical audit event — atomically, inside one unit of
//! work held by the contract's lock.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::adapters::PaymentAdapter;
use crate::error::ClearinghouseError;
use crate::event_log::AuditEvent;
use crate::state_machine::{Event as Transition, StateMachine, Status};
use crate::store::{Contract, ContractStore, Submission};
use crate::types::{Actor, Amount, ContractId, SubmissionId};

/// Contract status plus the events legal from it (§4.5 `get_status`).
#[derive(Clone, Debug)]
pub struct ContractStatus {
    /// The contract's current status.
    pub status: Status,
    /// Events the state machine currently accepts.
    pub allowed_events: Vec<Transition>,
    /// Verification failures recorded so far.
    pub retry_count: u32,
    /// Verification failures allowed before permanent failure.
    pub max_retries: u32,
}

/// Orchestrates the contract lifecycle. Holds the shared store/event-log
/// and payment adapter; stateless otherwise.
pub struct EscrowService<S> {
    store: Arc<S>,
    payments: Arc<dyn PaymentAdapter>,
    max_payload_bytes: usize,
}

impl<S> EscrowService<S>
where
    S: ContractStore + crate::event_log::EventLog,
{
    /// Build a service backed by `store` and `payments`, using
    /// [`crate::config::EscrowConfig::default`]'s payload ceiling.
    #[must_use]
    pub fn new(store: Arc<S>, payments: Arc<dyn PaymentAdapter>) -> Self {
        Self::with_max_payload_bytes(store, payments, crate::config::EscrowConfig::default().max_payload_bytes)
    }

    /// Build a service with an explicit submission payload size ceiling
    /// (spec.md §3 `Submission.payload`: "opaque bytes up to an
    /// implementation-defined ceiling").
    #[must_use]
    pub fn with_max_payload_bytes(
        store: Arc<S>,
        payments: Arc<dyn PaymentAdapter>,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            store,
            payments,
            max_payload_bytes,
        }
    }

    async fn append(
        &self,
        contract_id: ContractId,
        transition: Transition,
        old_status: Option<Status>,
        new_status: Status,
        actor: Actor,
        metadata: Value,
    ) -> Result<AuditEvent, ClearinghouseError> {
        let event = AuditEvent::from_transition(
            contract_id,
            transition,
            old_status,
            new_status,
            actor,
            metadata,
        );
        self.store.append(event).await
    }

    /// Persist `contract` and append the audit event for `transition` as
    /// one atomic unit (spec.md §9). Every state-mutating method uses
    /// this instead of a bare `save` followed by `append`.
    async fn save_and_append(
        &self,
        contract: Contract,
        transition: Transition,
        old_status: Option<Status>,
        new_status: Status,
        actor: Actor,
        metadata: Value,
    ) -> Result<Contract, ClearinghouseError> {
        let event = AuditEvent::from_transition(
            contract.id,
            transition,
            old_status,
            new_status,
            actor,
            metadata,
        );
        let (contract, _event) = self.store.save_with_event(contract, event).await?;
        Ok(contract)
    }

    async fn load(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        self.store
            .get(contract_id)
            .await?
            .ok_or(ClearinghouseError::ContractNotFound(contract_id))
    }

    fn fire(
        contract: &Contract,
        event: Transition,
    ) -> Result<Status, ClearinghouseError> {
        let mut sm = StateMachine::new(contract.status);
        sm.fire(event)
            .map(|_| sm.status())
            .map_err(|e| ClearinghouseError::IllegalTransition {
                contract_id: contract.id,
                current: e.current.to_string(),
                event: e.event.to_string(),
            })
    }

    /// Create a new contract in `CREATED`. No state-machine transition
    /// fires; this emits the synthetic `CONTRACT_CREATED` event instead
    /// (spec.md §4.1).
    #[instrument(skip(self, description, verification_descriptor, requirements_schema))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create_contract(
        &self,
        buyer_id: String,
        amount: Amount,
        description: String,
        verification_descriptor: Value,
        requirements_schema: Option<Value>,
        max_retries: u32,
    ) -> Result<Contract, ClearinghouseError> {
        let now = crate::types::now();
        let contract = Contract {
            id: ContractId::new(),
            buyer_id: buyer_id.clone(),
            worker_id: None,
            amount,
            description: description.clone(),
            verification_descriptor,
            requirements_schema,
            status: Status::Created,
            retry_count: 0,
            max_retries,
            escrow_wallet: None,
            funding_ref: None,
            settlement_ref: None,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.store.lock(contract.id).await;
        let contract = self.store.create(contract).await?;

        // `CONTRACT_CREATED` has no corresponding `Transition` variant — it
        // fires on construction, not on an event — so it is appended
        // directly rather than through `Self::append`.
        let event = AuditEvent {
            id: crate::types::EventId::new(),
            contract_id: contract.id,
            event_type: "CONTRACT_CREATED".to_owned(),
            old_status: None,
            new_status: Status::Created,
            actor: Actor::System,
            metadata: json!({"description": description}),
            created_at: crate::types::now(),
        };
        self.store.append(event).await?;

        info!(contract_id = %contract.id, "escrow.created");
        Ok(contract)
    }

    /// Transition `CREATED -> FUNDED`: create an escrow wallet and record
    /// funding confirmation via the payment adapter.
    #[instrument(skip(self))]
    pub async fn fund_contract(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;
        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::OnChainConfirmed)?;

        let wallet = self.payments.create_escrow_wallet().await?;
        let funding_ref = self
            .payments
            .confirm_funding(&wallet, contract.amount, &contract.buyer_id)
            .await?;

        contract.escrow_wallet = Some(wallet.clone());
        contract.funding_ref = Some(funding_ref.clone());
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                Transition::OnChainConfirmed,
                Some(old_status),
                new_status,
                Actor::System,
                json!({"escrow_wallet": wallet, "funding_ref": funding_ref}),
            )
            .await?;

        info!(contract_id = %contract_id, "escrow.funded");
        Ok(contract)
    }

    /// Transition `CREATED -> FAILED`: the contract was never funded in
    /// time.
    #[instrument(skip(self))]
    pub async fn expire_contract(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::TimeoutExpired)?;
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                Transition::TimeoutExpired,
                Some(old_status),
                new_status,
                Actor::System,
                json!({}),
            )
            .await?;

        info!(contract_id = %contract_id, "escrow.expired");
        Ok(contract)
    }

    /// Transition `FUNDED -> IN_PROGRESS`: assign `worker_id`. Rejects a
    /// second assignment even when the state-machine event would
    /// otherwise succeed (spec.md §4.5).
    #[instrument(skip(self))]
    pub async fn accept_contract(
        &self,
        contract_id: ContractId,
        worker_id: String,
    ) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        if contract.worker_id.is_some() {
            return Err(ClearinghouseError::WorkerAlreadyAssigned(contract_id));
        }

        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::WorkerAssigned)?;

        contract.worker_id = Some(worker_id.clone());
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                Transition::WorkerAssigned,
                Some(old_status),
                new_status,
                Actor::Agent(worker_id),
                json!({}),
            )
            .await?;

        info!(contract_id = %contract_id, "escrow.worker_accepted");
        Ok(contract)
    }

    /// Transition `IN_PROGRESS -> SUBMITTED`: record a new submission.
    #[instrument(skip(self, payload))]
    pub async fn submit_work(
        &self,
        contract_id: ContractId,
        payload: Vec<u8>,
        submitted_by: Option<String>,
    ) -> Result<Submission, ClearinghouseError> {
        if payload.len() > self.max_payload_bytes {
            return Err(ClearinghouseError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_bytes,
            });
        }

        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::WorkSubmitted)?;

        let actor_id = submitted_by.or_else(|| contract.worker_id.clone());
        let submission = Submission {
            id: SubmissionId::new(),
            contract_id,
            payload,
            submitted_by: actor_id.clone(),
            is_valid: None,
            verification_result: None,
            submitted_at: crate::types::now(),
        };
        let submission = self.store.add_submission(submission).await?;

        contract.status = new_status;
        contract.updated_at = crate::types::now();
        self.save_and_append(
            contract,
            Transition::WorkSubmitted,
            Some(old_status),
            new_status,
            actor_id.map_or(Actor::System, Actor::Agent),
            json!({"submission_id": submission.id}),
        )
        .await?;

        info!(contract_id = %contract_id, submission_id = %submission.id, "escrow.work_submitted");
        Ok(submission)
    }

    /// Transition `SUBMITTED -> VERIFYING`.
    #[instrument(skip(self))]
    pub async fn start_verification(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::VerificationStarted)?;
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                Transition::VerificationStarted,
                Some(old_status),
                new_status,
                Actor::System,
                json!({}),
            )
            .await?;

        Ok(contract)
    }

    /// Transition `VERIFYING -> COMPLETED`. Settlement happens after the
    /// transition is committed (spec.md §9 design note): a
    /// [`ClearinghouseError::PaymentFailed`] here means the contract is
    /// already `COMPLETED` with no `settlement_ref`, for operational
    /// reconciliation rather than automatic retry.
    #[instrument(skip(self, verification_result))]
    pub async fn record_verification_passed(
        &self,
        contract_id: ContractId,
        submission_id: Option<SubmissionId>,
        verification_result: Value,
    ) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::VerificationPassed)?;

        if let Some(submission_id) = submission_id {
            self.store
                .update_submission_verification(submission_id, true, verification_result.clone())
                .await?;
        }

        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                Transition::VerificationPassed,
                Some(old_status),
                new_status,
                Actor::System,
                verification_result,
            )
            .await?;

        info!(contract_id = %contract_id, "escrow.verification_passed");

        let Some(worker_id) = contract.worker_id.clone() else {
            return Ok(contract);
        };
        let Some(wallet) = contract.escrow_wallet.clone() else {
            return Ok(contract);
        };

        let settlement_ref = self
            .payments
            .transfer_to_worker(&wallet, &worker_id, contract.amount)
            .await
            .map_err(|e| ClearinghouseError::PaymentFailed(e.to_string()))?;

        let mut contract = contract;
        contract.settlement_ref = Some(settlement_ref);
        contract.updated_at = crate::types::now();
        let contract = self.store.save(contract).await?;
        Ok(contract)
    }

    /// Transition `VERIFYING -> IN_PROGRESS` (retry) or `VERIFYING ->
    /// FAILED` (retries exhausted). Increments `retry_count` before
    /// deciding which (spec.md §9): the post-increment value against
    /// `max_retries` is the only thing that decides the branch.
    #[instrument(skip(self, verification_result))]
    pub async fn record_verification_failed(
        &self,
        contract_id: ContractId,
        submission_id: Option<SubmissionId>,
        verification_result: Value,
    ) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        if let Some(submission_id) = submission_id {
            self.store
                .update_submission_verification(submission_id, false, verification_result.clone())
                .await?;
        }

        contract.retry_count += 1;
        let old_status = contract.status;

        let mut metadata = verification_result;
        if let Value::Object(ref mut map) = metadata {
            map.insert("retry_count".to_owned(), json!(contract.retry_count));
        }

        let (transition, event_type) = if contract.retry_count >= contract.max_retries {
            (Transition::MaxRetriesExceeded, "escrow.max_retries_exceeded")
        } else {
            (Transition::VerificationFailedRetry, "escrow.verification_failed_retry")
        };

        let new_status = Self::fire(&contract, transition)?;
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                transition,
                Some(old_status),
                new_status,
                Actor::System,
                metadata,
            )
            .await?;

        info!(contract_id = %contract_id, retry_count = contract.retry_count, event_type);
        Ok(contract)
    }

    /// Transition `FUNDED|IN_PROGRESS -> DISPUTED`.
    #[instrument(skip(self, reason))]
    pub async fn raise_dispute(
        &self,
        contract_id: ContractId,
        reason: String,
        raised_by: Actor,
    ) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        let old_status = contract.status;
        let new_status = Self::fire(&contract, Transition::DisputeRaised)?;
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                Transition::DisputeRaised,
                Some(old_status),
                new_status,
                raised_by,
                json!({"reason": reason}),
            )
            .await?;

        info!(contract_id = %contract_id, "escrow.dispute_raised");
        Ok(contract)
    }

    /// Resolve a dispute in the worker's favor (`DISPUTED -> COMPLETED`).
    #[instrument(skip(self))]
    pub async fn resolve_dispute_for_worker(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        self.resolve_dispute(contract_id, Transition::DisputeResolvedWorker).await
    }

    /// Resolve a dispute in the buyer's favor (`DISPUTED -> FAILED`).
    #[instrument(skip(self))]
    pub async fn resolve_dispute_for_buyer(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        self.resolve_dispute(contract_id, Transition::DisputeResolvedBuyer).await
    }

    async fn resolve_dispute(
        &self,
        contract_id: ContractId,
        transition: Transition,
    ) -> Result<Contract, ClearinghouseError> {
        let _guard = self.store.lock(contract_id).await;
        let mut contract = self.load(contract_id).await?;

        let old_status = contract.status;
        let new_status = Self::fire(&contract, transition)?;
        contract.status = new_status;
        contract.updated_at = crate::types::now();
        let contract = self
            .save_and_append(
                contract,
                transition,
                Some(old_status),
                new_status,
                Actor::System,
                json!({}),
            )
            .await?;

        Ok(contract)
    }

    /// Fetch a contract by id.
    pub async fn get_contract(&self, contract_id: ContractId) -> Result<Contract, ClearinghouseError> {
        self.load(contract_id).await
    }

    /// Status, allowed events, and retry counters for a contract.
    pub async fn get_status(&self, contract_id: ContractId) -> Result<ContractStatus, ClearinghouseError> {
        let contract = self.load(contract_id).await?;
        let sm = StateMachine::new(contract.status);
        Ok(ContractStatus {
            status: contract.status,
            allowed_events: sm.allowed_events(),
            retry_count: contract.retry_count,
            max_retries: contract.max_retries,
        })
    }

    /// The full audit trail for a contract, oldest first.
    pub async fn get_events(&self, contract_id: ContractId) -> Result<Vec<AuditEvent>, ClearinghouseError> {
        self.store.list_for_contract(contract_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedPaymentAdapter;
    use crate::store::InMemoryContractStore;
    use rust_decimal::Decimal;

    fn service() -> EscrowService<InMemoryContractStore> {
        EscrowService::new(
            Arc::new(InMemoryContractStore::new()),
            Arc::new(SimulatedPaymentAdapter),
        )
    }

    async fn create(escrow: &EscrowService<InMemoryContractStore>, max_retries: u32) -> Contract {
        escrow
            .create_contract(
                "buyer-1".to_owned(),
                Amount::new(Decimal::new(10000, 2)).unwrap(),
                "write a haiku".to_owned(),
                json!({"type": "mock", "should_pass": true}),
                None,
                max_retries,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn happy_path_settles_and_records_matching_events() {
        let escrow = service();
        let contract = create(&escrow, 3).await;

        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();
        escrow
            .submit_work(contract.id, b"a haiku".to_vec(), None)
            .await
            .unwrap();
        escrow.start_verification(contract.id).await.unwrap();
        let completed = escrow
            .record_verification_passed(contract.id, None, json!({"is_valid": true}))
            .await
            .unwrap();

        assert_eq!(completed.status, Status::Completed);
        assert!(completed.settlement_ref.is_some());
        assert!(completed.escrow_wallet.is_some());

        let events = escrow.get_events(contract.id).await.unwrap();
        let event_types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            event_types,
            vec![
                "CONTRACT_CREATED",
                "CONTRACT_FUNDED",
                "WORKER_ASSIGNED",
                "WORK_SUBMITTED",
                "VERIFICATION_STARTED",
                "VERIFICATION_PASSED",
            ]
        );

        // event-status consistency (spec.md §8 property 2): each event's
        // old_status matches the prior event's new_status.
        for pair in events.windows(2) {
            assert_eq!(pair[1].old_status, Some(pair[0].new_status));
        }
        assert_eq!(events[0].old_status, None);
    }

    #[tokio::test]
    async fn retry_then_pass_increments_retry_count_once() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();
        escrow
            .submit_work(contract.id, b"bad attempt".to_vec(), None)
            .await
            .unwrap();
        escrow.start_verification(contract.id).await.unwrap();

        let retried = escrow
            .record_verification_failed(contract.id, None, json!({}))
            .await
            .unwrap();
        assert_eq!(retried.status, Status::InProgress);
        assert_eq!(retried.retry_count, 1);

        escrow
            .submit_work(contract.id, b"fixed attempt".to_vec(), None)
            .await
            .unwrap();
        escrow.start_verification(contract.id).await.unwrap();
        let completed = escrow
            .record_verification_passed(contract.id, None, json!({}))
            .await
            .unwrap();
        assert_eq!(completed.status, Status::Completed);
        assert_eq!(completed.retry_count, 1);
    }

    #[tokio::test]
    async fn repeated_failures_exhaust_retries_and_fail_permanently() {
        let escrow = service();
        let contract = create(&escrow, 2).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();

        for attempt in 0..2 {
            escrow
                .submit_work(contract.id, format!("attempt-{attempt}").into_bytes(), None)
                .await
                .unwrap();
            escrow.start_verification(contract.id).await.unwrap();
            let result = escrow
                .record_verification_failed(contract.id, None, json!({}))
                .await
                .unwrap();
            if attempt == 0 {
                assert_eq!(result.status, Status::InProgress);
            } else {
                assert_eq!(result.status, Status::Failed);
            }
        }

        let final_contract = escrow.get_contract(contract.id).await.unwrap();
        assert_eq!(final_contract.status, Status::Failed);
        assert_eq!(final_contract.retry_count, 2);

        let events = escrow.get_events(contract.id).await.unwrap();
        assert_eq!(events.last().unwrap().event_type, "MAX_RETRIES_EXCEEDED");
    }

    #[tokio::test]
    async fn second_accept_is_rejected_even_though_state_machine_would_allow_it() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();

        let err = escrow
            .accept_contract(contract.id, "worker-2".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, ClearinghouseError::WorkerAlreadyAssigned(_)));
    }

    #[tokio::test]
    async fn illegal_transition_is_reported_not_retried() {
        let escrow = service();
        let contract = create(&escrow, 3).await;

        let err = escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, ClearinghouseError::IllegalTransition { .. }));

        // the contract is untouched by the rejected attempt
        let reloaded = escrow.get_contract(contract.id).await.unwrap();
        assert_eq!(reloaded.status, Status::Created);
        assert!(reloaded.worker_id.is_none());
    }

    #[tokio::test]
    async fn dispute_raised_from_in_progress_resolves_for_worker() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();

        let disputed = escrow
            .raise_dispute(contract.id, "worker stopped responding".to_owned(), Actor::System)
            .await
            .unwrap();
        assert_eq!(disputed.status, Status::Disputed);

        let events = escrow.get_events(contract.id).await.unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.event_type, "DISPUTE_RAISED");
        assert_eq!(last.old_status, Some(Status::InProgress));

        let resolved = escrow.resolve_dispute_for_worker(contract.id).await.unwrap();
        assert_eq!(resolved.status, Status::Completed);
    }

    #[tokio::test]
    async fn dispute_raised_from_funded_resolves_for_buyer() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();

        let disputed = escrow
            .raise_dispute(contract.id, "buyer wants out".to_owned(), Actor::System)
            .await
            .unwrap();
        assert_eq!(disputed.status, Status::Disputed);

        let resolved = escrow.resolve_dispute_for_buyer(contract.id).await.unwrap();
        assert_eq!(resolved.status, Status::Failed);
    }

    #[tokio::test]
    async fn terminal_contract_accepts_no_further_transitions() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();
        escrow
            .submit_work(contract.id, b"anything".to_vec(), None)
            .await
            .unwrap();
        escrow.start_verification(contract.id).await.unwrap();
        escrow
            .record_verification_passed(contract.id, None, json!({}))
            .await
            .unwrap();

        let err = escrow
            .raise_dispute(contract.id, "too late".to_owned(), Actor::System)
            .await
            .unwrap_err();
        assert!(matches!(err, ClearinghouseError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn expire_contract_fails_an_unfunded_contract() {
        let escrow = service();
        let contract = create(&escrow, 3).await;

        let expired = escrow.expire_contract(contract.id).await.unwrap();
        assert_eq!(expired.status, Status::Failed);

        let events = escrow.get_events(contract.id).await.unwrap();
        assert_eq!(events.last().unwrap().event_type, "CONTRACT_EXPIRED");
    }

    #[tokio::test]
    async fn expire_is_illegal_once_funded() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();

        let err = escrow.expire_contract(contract.id).await.unwrap_err();
        assert!(matches!(err, ClearinghouseError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_touching_the_contract() {
        let escrow = EscrowService::with_max_payload_bytes(
            Arc::new(InMemoryContractStore::new()),
            Arc::new(SimulatedPaymentAdapter),
            4,
        );
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();

        let err = escrow
            .submit_work(contract.id, b"too long".to_vec(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClearinghouseError::PayloadTooLarge { .. }));

        let reloaded = escrow.get_contract(contract.id).await.unwrap();
        assert_eq!(reloaded.status, Status::InProgress);
    }

    #[tokio::test]
    async fn get_status_reports_allowed_events_and_retry_counters() {
        let escrow = service();
        let contract = create(&escrow, 5).await;
        escrow.fund_contract(contract.id).await.unwrap();

        let status = escrow.get_status(contract.id).await.unwrap();
        assert_eq!(status.status, Status::Funded);
        assert_eq!(status.max_retries, 5);
        assert_eq!(status.retry_count, 0);
        assert!(status.allowed_events.contains(&Transition::WorkerAssigned));
        assert!(status.allowed_events.contains(&Transition::DisputeRaised));
        assert!(!status.allowed_events.contains(&Transition::WorkSubmitted));
    }

    #[tokio::test]
    async fn submission_row_records_submitter_and_verification_result() {
        let escrow = service();
        let contract = create(&escrow, 3).await;
        escrow.fund_contract(contract.id).await.unwrap();
        escrow
            .accept_contract(contract.id, "worker-1".to_owned())
            .await
            .unwrap();
        let submission = escrow
            .submit_work(
                contract.id,
                b"a haiku".to_vec(),
                Some("worker-1".to_owned()),
            )
            .await
            .unwrap();
        assert_eq!(submission.submitted_by.as_deref(), Some("worker-1"));

        escrow.start_verification(contract.id).await.unwrap();
        escrow
            .record_verification_passed(
                contract.id,
                Some(submission.id),
                json!({"is_valid": true, "reason": "matched"}),
            )
            .await
            .unwrap();

        let stored = escrow
            .store
            .latest_submission(contract.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.is_valid, Some(true));
        assert_eq!(
            stored.verification_result,
            Some(json!({"is_valid": true, "reason": "matched"}))
        );
    }
}
