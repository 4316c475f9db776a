//! Shared value types used across the contract lifecycle engine.

mod actor;
mod amount;
mod ids;
mod timestamp;

pub use actor::Actor;
pub use amount::{Amount, NonPositiveAmount, SCALE};
pub use ids::{ContractId, EventId, SubmissionId};
pub use timestamp::{now, Timestamp};
