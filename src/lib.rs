//! # Clearinghouse
//!
//! An escrow and verification clearinghouse for paid tasks between
//! autonomous agents.
//!
//! ## Architecture
//!
//! A buyer funds a contract, a worker accepts it and submits work, and one
//! of three pluggable verifier strategies (code execution, semantic
//! judgement, or JSON-Schema validation) decides whether the work is
//! accepted. The contract's lifecycle is driven entirely by a pure
//! [`state_machine::StateMachine`]; [`escrow::EscrowService`] is the only
//! component that pairs a transition with the domain update and audit
//! event it implies, inside one per-contract unit of work.
//!
//! ## Modules
//!
//! - [`state_machine`] — the pure contract lifecycle (no I/O)
//! - [`event_log`] — the append-only audit trail
//! - [`store`] — contract/submission persistence, in-memory or `sled`
//! - [`verifier`] — the three verification strategies and their factory
//! - [`adapters`] — sandbox, judge, and payment adapters the verifiers and
//!   escrow service call out to
//! - [`escrow`] — the contract lifecycle orchestrator
//! - [`verification`] — the verification-run orchestrator
//! - [`config`] — TOML configuration with environment overlay
//! - [`error`] — the one error type every fallible operation returns

#![forbid(unsafe_code)]
#![deny(clippy::all, rust_2018_idioms)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::too_many_arguments,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value
)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod escrow;
pub mod event_log;
pub mod state_machine;
pub mod store;
pub mod types;
pub mod verification;
pub mod verifier;

pub use config::Config;
pub use error::{ClearinghouseError, VerificationErrorKind};
pub use escrow::{ContractStatus, EscrowService};
pub use event_log::AuditEvent;
pub use state_machine::{Event, StateMachine, Status};
pub use store::{Contract, ContractStore, Store, Submission};
pub use verification::VerificationService;
pub use verifier::{VerifierFactory, VerifyRequest, VerifyResult};

/// Crate version, as published to crates.io.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
