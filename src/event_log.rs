//! The append-only audit log (spec.md §4.2, §6 closed event-type set).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClearinghouseError;
use crate::state_machine::{Event as TransitionEvent, Status};
use crate::types::{Actor, ContractId, EventId, Timestamp};

/// One row of the append-only audit log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique id of this log entry.
    pub id: EventId,
    /// The contract this event is about.
    pub contract_id: ContractId,
    /// The canonical event type string (spec.md §6).
    pub event_type: String,
    /// Status before the transition, or `None` for the creation event.
    pub old_status: Option<Status>,
    /// Status after the transition.
    pub new_status: Status,
    /// Who/what caused the event.
    pub actor: Actor,
    /// Free-form structured context (verification results, dispute
    /// reasons, retry counters, ...).
    pub metadata: Value,
    /// When the event was recorded.
    pub created_at: Timestamp,
}

impl AuditEvent {
    /// Build an event from a fired state machine transition.
    #[must_use]
    pub fn from_transition(
        contract_id: ContractId,
        transition: TransitionEvent,
        old_status: Option<Status>,
        new_status: Status,
        actor: Actor,
        metadata: Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            contract_id,
            event_type: crate::state_machine::canonical_event_type(transition).to_owned(),
            old_status,
            new_status,
            actor,
            metadata,
            created_at: crate::types::now(),
        }
    }
}

/// Append-only, ordered-by-append log of [`AuditEvent`]s per contract.
///
/// Implementations never mutate or delete a row once appended; the only
/// operations are append and ordered read.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append one event. Callers are expected to hold the contract's lock
    /// (see [`crate::store::ContractStore::lock`]) for the duration of the
    /// unit of work this append is part of.
    async fn append(&self, event: AuditEvent) -> Result<AuditEvent, ClearinghouseError>;

    /// All events for a contract, oldest first.
    async fn list_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<AuditEvent>, ClearinghouseError>;
}
