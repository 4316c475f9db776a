//! The pure contract lifecycle state machine (spec.md §4.1).
//!
//! Nothing in this module performs I/O. `StateMachine` only ever answers
//! "given this status, is this event legal, and if so what status does it
//! lead to" — the service layer is responsible for persisting the result
//! and appending the corresponding event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClearinghouseError;

/// The eight states a contract can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Created,
    Funded,
    InProgress,
    Submitted,
    Verifying,
    Completed,
    Failed,
    Disputed,
}

impl Status {
    /// Whether a contract in this status can still transition anywhere.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// All status values, for generators and exhaustive iteration in tests.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Created,
            Self::Funded,
            Self::InProgress,
            Self::Submitted,
            Self::Verifying,
            Self::Completed,
            Self::Failed,
            Self::Disputed,
        ]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Funded => "FUNDED",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Verifying => "VERIFYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Disputed => "DISPUTED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Status {
    type Err = ClearinghouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATED" => Self::Created,
            "FUNDED" => Self::Funded,
            "IN_PROGRESS" => Self::InProgress,
            "SUBMITTED" => Self::Submitted,
            "VERIFYING" => Self::Verifying,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "DISPUTED" => Self::Disputed,
            other => return Err(ClearinghouseError::UnknownState(other.to_owned())),
        })
    }
}

/// The eleven events that can be fired against a contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    OnChainConfirmed,
    WorkerAssigned,
    WorkSubmitted,
    VerificationStarted,
    VerificationPassed,
    VerificationFailedRetry,
    MaxRetriesExceeded,
    DisputeRaised,
    DisputeResolvedWorker,
    DisputeResolvedBuyer,
    TimeoutExpired,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OnChainConfirmed => "on_chain_confirmed",
            Self::WorkerAssigned => "worker_assigned",
            Self::WorkSubmitted => "work_submitted",
            Self::VerificationStarted => "verification_started",
            Self::VerificationPassed => "verification_passed",
            Self::VerificationFailedRetry => "verification_failed_retry",
            Self::MaxRetriesExceeded => "max_retries_exceeded",
            Self::DisputeRaised => "dispute_raised",
            Self::DisputeResolvedWorker => "dispute_resolved_worker",
            Self::DisputeResolvedBuyer => "dispute_resolved_buyer",
            Self::TimeoutExpired => "timeout_expired",
        };
        write!(f, "{s}")
    }
}

/// Canonical `event_type` string recorded on the audit log for each event
/// (spec.md §4.1 canonical event mapping / §6 closed event-type set).
#[must_use]
pub const fn canonical_event_type(event: Event) -> &'static str {
    match event {
        Event::OnChainConfirmed => "CONTRACT_FUNDED",
        Event::WorkerAssigned => "WORKER_ASSIGNED",
        Event::WorkSubmitted => "WORK_SUBMITTED",
        Event::VerificationStarted => "VERIFICATION_STARTED",
        Event::VerificationPassed => "VERIFICATION_PASSED",
        Event::VerificationFailedRetry => "VERIFICATION_FAILED",
        Event::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
        Event::DisputeRaised => "DISPUTE_RAISED",
        Event::DisputeResolvedWorker => "DISPUTE_RESOLVED_WORKER",
        Event::DisputeResolvedBuyer => "DISPUTE_RESOLVED_BUYER",
        Event::TimeoutExpired => "CONTRACT_EXPIRED",
    }
}

/// Raised by [`StateMachine::fire`] when `event` is not legal from the
/// machine's current status.
#[derive(Debug, thiserror::Error)]
#[error("cannot apply {event} from {current}")]
pub struct IllegalTransitionError {
    /// The status the machine was in.
    pub current: Status,
    /// The event that was rejected.
    pub event: Event,
}

/// A pure, in-memory view of one contract's lifecycle status. Holds no
/// reference to storage; callers persist the returned status themselves.
#[derive(Clone, Copy, Debug)]
pub struct StateMachine {
    current: Status,
}

impl StateMachine {
    /// Start a state machine in the given status.
    #[must_use]
    pub const fn new(status: Status) -> Self {
        Self { current: status }
    }

    /// The machine's current status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.current
    }

    /// Attempt to fire `event`. On success, the machine's internal status
    /// advances and the new status is returned; on failure the machine is
    /// left unchanged.
    ///
    /// # Errors
    /// Returns [`IllegalTransitionError`] if `event` is not legal from the
    /// current status.
    pub fn fire(&mut self, event: Event) -> Result<Status, IllegalTransitionError> {
        let next = target_status(self.current, event).ok_or(IllegalTransitionError {
            current: self.current,
            event,
        })?;
        self.current = next;
        Ok(next)
    }

    /// The events that are legal from the machine's current status.
    #[must_use]
    pub fn allowed_events(&self) -> Vec<Event> {
        ALL_EVENTS
            .iter()
            .copied()
            .filter(|&event| target_status(self.current, event).is_some())
            .collect()
    }
}

const ALL_EVENTS: [Event; 11] = [
    Event::OnChainConfirmed,
    Event::WorkerAssigned,
    Event::WorkSubmitted,
    Event::VerificationStarted,
    Event::VerificationPassed,
    Event::VerificationFailedRetry,
    Event::MaxRetriesExceeded,
    Event::DisputeRaised,
    Event::DisputeResolvedWorker,
    Event::DisputeResolvedBuyer,
    Event::TimeoutExpired,
];

/// The transition table from spec.md §4.1, as a pure function.
fn target_status(current: Status, event: Event) -> Option<Status> {
    use Event::{
        DisputeRaised, DisputeResolvedBuyer, DisputeResolvedWorker, MaxRetriesExceeded,
        OnChainConfirmed, TimeoutExpired, VerificationFailedRetry, VerificationPassed,
        VerificationStarted, WorkSubmitted, WorkerAssigned,
    };
    use Status::{Completed, Created, Disputed, Failed, Funded, InProgress, Submitted, Verifying};

    match (current, event) {
        (Created, OnChainConfirmed) => Some(Funded),
        (Funded, WorkerAssigned) => Some(InProgress),
        (InProgress, WorkSubmitted) => Some(Submitted),
        (Submitted, VerificationStarted) => Some(Verifying),
        (Verifying, VerificationPassed) => Some(Completed),
        (Verifying, VerificationFailedRetry) => Some(InProgress),
        (Verifying, MaxRetriesExceeded) => Some(Failed),
        (Funded, DisputeRaised) | (InProgress, DisputeRaised) => Some(Disputed),
        (Disputed, DisputeResolvedWorker) => Some(Completed),
        (Disputed, DisputeResolvedBuyer) => Some(Failed),
        (Created, TimeoutExpired) => Some(Failed),
        _ => None,
    }
}
