//! `DashMap`-backed in-memory store. Default for tests and the demo binary.

use async_trait::async_trait;
use dashmap::DashMap;

use super::lock::LockRegistry;
use super::{Contract, ContractGuard, ContractStore, Submission};
use crate::error::ClearinghouseError;
use crate::event_log::{AuditEvent, EventLog};
use crate::types::{ContractId, SubmissionId};

/// In-memory [`ContractStore`] + [`EventLog`] implementation. Sharded by
/// `DashMap`, so distinct contracts never contend with each other even
/// before the explicit per-contract lock is taken.
#[derive(Default)]
pub struct InMemoryContractStore {
    contracts: DashMap<ContractId, Contract>,
    submissions: DashMap<SubmissionId, Submission>,
    submissions_by_contract: DashMap<ContractId, Vec<SubmissionId>>,
    events: DashMap<ContractId, Vec<AuditEvent>>,
    locks: LockRegistry,
}

impl InMemoryContractStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    async fn lock(&self, contract_id: ContractId) -> ContractGuard {
        self.locks.lock(contract_id).await
    }

    async fn create(&self, contract: Contract) -> Result<Contract, ClearinghouseError> {
        self.contracts.insert(contract.id, contract.clone());
        Ok(contract)
    }

    async fn get(&self, contract_id: ContractId) -> Result<Option<Contract>, ClearinghouseError> {
        Ok(self.contracts.get(&contract_id).map(|r| r.clone()))
    }

    async fn list_by_status(
        &self,
        status: crate::state_machine::Status,
    ) -> Result<Vec<Contract>, ClearinghouseError> {
        let mut contracts: Vec<Contract> = self
            .contracts
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.clone())
            .collect();
        contracts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contracts)
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Contract>, ClearinghouseError> {
        let mut contracts: Vec<Contract> = self
            .contracts
            .iter()
            .filter(|r| r.buyer_id == buyer_id)
            .map(|r| r.clone())
            .collect();
        contracts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contracts)
    }

    async fn save(&self, contract: Contract) -> Result<Contract, ClearinghouseError> {
        self.contracts.insert(contract.id, contract.clone());
        Ok(contract)
    }

    async fn add_submission(
        &self,
        submission: Submission,
    ) -> Result<Submission, ClearinghouseError> {
        self.submissions_by_contract
            .entry(submission.contract_id)
            .or_default()
            .push(submission.id);
        self.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn latest_submission(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<Submission>, ClearinghouseError> {
        let Some(ids) = self.submissions_by_contract.get(&contract_id) else {
            return Ok(None);
        };
        let Some(last_id) = ids.last().copied() else {
            return Ok(None);
        };
        Ok(self.submissions.get(&last_id).map(|r| r.clone()))
    }

    async fn update_submission_verification(
        &self,
        submission_id: SubmissionId,
        is_valid: bool,
        result: serde_json::Value,
    ) -> Result<(), ClearinghouseError> {
        if let Some(mut entry) = self.submissions.get_mut(&submission_id) {
            entry.is_valid = Some(is_valid);
            entry.verification_result = Some(result);
        }
        Ok(())
    }
}

#[async_trait]
impl EventLog for InMemoryContractStore {
    async fn append(&self, event: AuditEvent) -> Result<AuditEvent, ClearinghouseError> {
        self.events
            .entry(event.contract_id)
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    async fn list_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<AuditEvent>, ClearinghouseError> {
        Ok(self
            .events
            .get(&contract_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Status;
    use crate::types::{Amount, now};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn sample_contract() -> Contract {
        Contract {
            id: ContractId::new(),
            buyer_id: "buyer-1".to_owned(),
            worker_id: None,
            amount: Amount::new(Decimal::new(1000, 2)).unwrap(),
            description: "write a haiku".to_owned(),
            verification_descriptor: json!({"type": "mock", "should_pass": true}),
            requirements_schema: None,
            status: Status::Created,
            retry_count: 0,
            max_retries: 3,
            escrow_wallet: None,
            funding_ref: None,
            settlement_ref: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryContractStore::new();
        let contract = sample_contract();
        let id = contract.id;
        store.create(contract).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn latest_submission_is_most_recently_added() {
        let store = InMemoryContractStore::new();
        let contract = sample_contract();
        let contract_id = contract.id;
        store.create(contract).await.unwrap();

        for i in 0..3 {
            let submission = Submission {
                id: SubmissionId::new(),
                contract_id,
                payload: format!("attempt-{i}").into_bytes(),
                submitted_by: None,
                is_valid: None,
                verification_result: None,
                submitted_at: now(),
            };
            store.add_submission(submission).await.unwrap();
        }

        let latest = store.latest_submission(contract_id).await.unwrap().unwrap();
        assert_eq!(latest.payload, b"attempt-2");
    }

    #[tokio::test]
    async fn concurrent_locks_serialize_per_contract() {
        let store = InMemoryContractStore::new();
        let contract = sample_contract();
        let id = contract.id;
        store.create(contract).await.unwrap();

        let guard = store.lock(id).await;
        assert_eq!(guard.contract_id(), id);
        drop(guard);

        let _second = store.lock(id).await;
    }

    #[tokio::test]
    async fn list_by_status_and_buyer_filter_correctly() {
        let store = InMemoryContractStore::new();
        let mut alice_created = sample_contract();
        alice_created.buyer_id = "alice".to_owned();

        let mut alice_funded = sample_contract();
        alice_funded.buyer_id = "alice".to_owned();
        alice_funded.status = Status::Funded;

        let mut bob_created = sample_contract();
        bob_created.buyer_id = "bob".to_owned();

        store.create(alice_created.clone()).await.unwrap();
        store.create(alice_funded.clone()).await.unwrap();
        store.create(bob_created.clone()).await.unwrap();

        let by_status = store.list_by_status(Status::Funded).await.unwrap();
        assert_eq!(by_status.len(), 1);
        assert_eq!(by_status[0].id, alice_funded.id);

        let by_buyer = store.list_by_buyer("alice").await.unwrap();
        assert_eq!(by_buyer.len(), 2);
        assert!(by_buyer.iter().all(|c| c.buyer_id == "alice"));

        let none = store.list_by_buyer("carol").await.unwrap();
        assert!(none.is_empty());
    }
}
