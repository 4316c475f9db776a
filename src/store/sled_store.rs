//! Durable `sled`-backed store.
//!
//! The per-contract [`LockRegistry`] mutex serializes a unit of work
//! against itself, but it gives mutual exclusion, not crash-atomicity:
//! a process that dies between two independent tree writes can still
//! leave the contract row and the event log inconsistent. The contract
//! save and its accompanying audit-event append are therefore co-located
//! in one `sled` multi-tree transaction (spec.md §9); every other entity
//! still gets its own tree, matching the teacher crate's convention of
//! one keyspace per concern.
use std::path::Path;

use async_trait::async_trait;
use sled::Transactional;

use super::lock::LockRegistry;
use super::{Contract, ContractGuard, ContractStore, Submission};
use crate::error::ClearinghouseError;
use crate::event_log::{AuditEvent, EventLog};
use crate::types::{ContractId, SubmissionId};

const CONTRACTS_TREE: &str = "contracts";
const SUBMISSIONS_TREE: &str = "submissions";
const SUBMISSIONS_BY_CONTRACT_TREE: &str = "submissions_by_contract";
const EVENTS_TREE: &str = "events";

/// Durable [`ContractStore`] + [`EventLog`] implementation backed by a
/// local `sled` database.
pub struct SledContractStore {
    contracts: sled::Tree,
    submissions: sled::Tree,
    submissions_by_contract: sled::Tree,
    events: sled::Tree,
    locks: LockRegistry,
}

impl SledContractStore {
    /// Open (or create) a sled database at `path`.
    ///
    /// # Errors
    /// Returns [`ClearinghouseError::Store`] if the database cannot be
    /// opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClearinghouseError> {
        let db = sled::open(path).map_err(|e| ClearinghouseError::Store(e.to_string()))?;
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| ClearinghouseError::Store(e.to_string()))
        };
        Ok(Self {
            contracts: open_tree(CONTRACTS_TREE)?,
            submissions: open_tree(SUBMISSIONS_TREE)?,
            submissions_by_contract: open_tree(SUBMISSIONS_BY_CONTRACT_TREE)?,
            events: open_tree(EVENTS_TREE)?,
            locks: LockRegistry::new(),
        })
    }

    /// Full scan of the contracts tree, for the list-by-* queries. Fine at
    /// the scale this engine targets; a deployment with enough contracts
    /// to need a real secondary index would replace this tree with one
    /// backed by a proper database.
    fn all_contracts(&self) -> Result<Vec<Contract>, ClearinghouseError> {
        self.contracts
            .iter()
            .values()
            .map(|bytes| {
                let bytes = bytes.map_err(store_err)?;
                serde_json::from_slice(&bytes).map_err(store_err)
            })
            .collect()
    }
}

fn store_err(e: impl std::fmt::Display) -> ClearinghouseError {
    ClearinghouseError::Store(e.to_string())
}

fn get_json<T: serde::de::DeserializeOwned>(
    tree: &sled::Tree,
    key: &[u8],
) -> Result<Option<T>, ClearinghouseError> {
    let Some(bytes) = tree.get(key).map_err(store_err)? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes).map(Some).map_err(store_err)
}

fn put_json<T: serde::Serialize>(
    tree: &sled::Tree,
    key: &[u8],
    value: &T,
) -> Result<(), ClearinghouseError> {
    let bytes = serde_json::to_vec(value).map_err(store_err)?;
    tree.insert(key, bytes).map_err(store_err)?;
    Ok(())
}

#[async_trait]
impl ContractStore for SledContractStore {
    async fn lock(&self, contract_id: ContractId) -> ContractGuard {
        self.locks.lock(contract_id).await
    }

    async fn create(&self, contract: Contract) -> Result<Contract, ClearinghouseError> {
        put_json(
            &self.contracts,
            contract.id.as_uuid().as_bytes(),
            &contract,
        )?;
        Ok(contract)
    }

    async fn get(&self, contract_id: ContractId) -> Result<Option<Contract>, ClearinghouseError> {
        get_json(&self.contracts, contract_id.as_uuid().as_bytes())
    }

    async fn list_by_status(
        &self,
        status: crate::state_machine::Status,
    ) -> Result<Vec<Contract>, ClearinghouseError> {
        let mut contracts = self.all_contracts()?;
        contracts.retain(|c| c.status == status);
        contracts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contracts)
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Contract>, ClearinghouseError> {
        let mut contracts = self.all_contracts()?;
        contracts.retain(|c| c.buyer_id == buyer_id);
        contracts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contracts)
    }

    async fn save(&self, contract: Contract) -> Result<Contract, ClearinghouseError> {
        put_json(
            &self.contracts,
            contract.id.as_uuid().as_bytes(),
            &contract,
        )?;
        Ok(contract)
    }

    async fn add_submission(
        &self,
        submission: Submission,
    ) -> Result<Submission, ClearinghouseError> {
        let key = submission.contract_id.as_uuid();
        let mut ids: Vec<SubmissionId> =
            get_json(&self.submissions_by_contract, key.as_bytes())?.unwrap_or_default();
        ids.push(submission.id);
        put_json(&self.submissions_by_contract, key.as_bytes(), &ids)?;
        put_json(
            &self.submissions,
            submission.id.as_uuid().as_bytes(),
            &submission,
        )?;
        Ok(submission)
    }

    async fn latest_submission(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<Submission>, ClearinghouseError> {
        let ids: Option<Vec<SubmissionId>> =
            get_json(&self.submissions_by_contract, contract_id.as_uuid().as_bytes())?;
        let Some(last_id) = ids.and_then(|v| v.last().copied()) else {
            return Ok(None);
        };
        get_json(&self.submissions, last_id.as_uuid().as_bytes())
    }

    async fn update_submission_verification(
        &self,
        submission_id: SubmissionId,
        is_valid: bool,
        result: serde_json::Value,
    ) -> Result<(), ClearinghouseError> {
        let key = submission_id.as_uuid();
        let Some(mut submission): Option<Submission> = get_json(&self.submissions, key.as_bytes())?
        else {
            return Ok(());
        };
        submission.is_valid = Some(is_valid);
        submission.verification_result = Some(result);
        put_json(&self.submissions, key.as_bytes(), &submission)
    }

    async fn save_with_event(
        &self,
        contract: Contract,
        event: AuditEvent,
    ) -> Result<(Contract, AuditEvent), ClearinghouseError> {
        let contract_key = *contract.id.as_uuid().as_bytes();
        let events_key = *event.contract_id.as_uuid().as_bytes();

        (&self.contracts, &self.events)
            .transaction(|(contracts, events)| {
                let contract_bytes = serde_json::to_vec(&contract).map_err(abort)?;
                contracts.insert(&contract_key, contract_bytes)?;

                let mut history: Vec<AuditEvent> = events
                    .get(events_key)?
                    .map(|bytes| serde_json::from_slice(&bytes))
                    .transpose()
                    .map_err(abort)?
                    .unwrap_or_default();
                history.push(event.clone());
                let history_bytes = serde_json::to_vec(&history).map_err(abort)?;
                events.insert(&events_key, history_bytes)?;
                Ok(())
            })
            .map_err(|e| match e {
                sled::transaction::TransactionError::Abort(msg) => {
                    ClearinghouseError::Store(msg)
                }
                sled::transaction::TransactionError::Storage(err) => {
                    ClearinghouseError::Store(err.to_string())
                }
            })?;

        Ok((contract, event))
    }
}

fn abort(e: serde_json::Error) -> sled::transaction::ConflictableTransactionError<String> {
    sled::transaction::ConflictableTransactionError::Abort(e.to_string())
}

#[async_trait]
impl EventLog for SledContractStore {
    async fn append(&self, event: AuditEvent) -> Result<AuditEvent, ClearinghouseError> {
        let key = event.contract_id.as_uuid();
        let mut events: Vec<AuditEvent> = get_json(&self.events, key.as_bytes())?.unwrap_or_default();
        events.push(event.clone());
        put_json(&self.events, key.as_bytes(), &events)?;
        Ok(event)
    }

    async fn list_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<AuditEvent>, ClearinghouseError> {
        Ok(get_json(&self.events, contract_id.as_uuid().as_bytes())?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Status;
    use crate::types::{now, Amount};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn sample_contract() -> Contract {
        Contract {
            id: ContractId::new(),
            buyer_id: "buyer-1".to_owned(),
            worker_id: None,
            amount: Amount::new(Decimal::new(500, 2)).unwrap(),
            description: "transcribe audio".to_owned(),
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
    async fn contract_persists_across_reopen() {
        let dir = tempdir();
        let contract = sample_contract();
        let id = contract.id;
        {
            let store = SledContractStore::open(&dir).unwrap();
            store.create(contract).await.unwrap();
        }
        let store = SledContractStore::open(&dir).unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn save_with_event_commits_both_rows() {
        let dir = tempdir();
        let store = SledContractStore::open(&dir).unwrap();
        let mut contract = sample_contract();
        let id = contract.id;
        store.create(contract.clone()).await.unwrap();

        contract.status = Status::Funded;
        let event = AuditEvent::from_transition(
            id,
            crate::state_machine::Event::OnChainConfirmed,
            Some(Status::Created),
            Status::Funded,
            crate::types::Actor::System,
            json!({}),
        );
        store
            .save_with_event(contract.clone(), event)
            .await
            .unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, Status::Funded);

        let history = store.list_for_contract(id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].new_status, Status::Funded);
    }

    fn tempdir() -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("clearinghouse-test-{}", uuid::Uuid::new_v4()));
        path
    }
}
