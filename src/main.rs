//! Clearinghouse demo CLI.
//!
//! Single binary with subcommands driving one in-process instance of the
//! escrow/verification engine against the configured store backend:
//!
//!   clearinghouse-node create  <buyer> <amount> <description> <descriptor.json>
//!   clearinghouse-node fund    <contract_id>
//!   clearinghouse-node accept  <contract_id> <worker>
//!   clearinghouse-node submit  <contract_id> <payload-file>
//!   clearinghouse-node verify  <contract_id>
//!   clearinghouse-node dispute <contract_id> <reason>
//!   clearinghouse-node resolve-worker <contract_id>
//!   clearinghouse-node resolve-buyer  <contract_id>
//!   clearinghouse-node expire  <contract_id>
//!   clearinghouse-node get     <contract_id>
//!   clearinghouse-node list    status:<STATUS> | buyer:<buyer_id>
//!   clearinghouse-node status  <contract_id>
//!   clearinghouse-node events  <contract_id>

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clearinghouse::config::{Config, StoreBackend};
use clearinghouse::error::ClearinghouseError;
use clearinghouse::event_log::{AuditEvent, EventLog};
use clearinghouse::store::{Contract, ContractGuard, ContractStore, InMemoryContractStore, SledContractStore, Submission};
use clearinghouse::types::{Actor, Amount, ContractId};
use clearinghouse::verifier::VerifierFactory;
use clearinghouse::{EscrowService, VerificationService};
use tracing::error;

/// Dispatches to whichever backend the configuration selected. Both
/// variants already implement [`ContractStore`] + [`EventLog`]; this just
/// lets the demo binary pick one at startup without making every service
/// generic over an enum.
enum AnyStore {
    Memory(InMemoryContractStore),
    Sled(SledContractStore),
}

#[async_trait]
impl ContractStore for AnyStore {
    async fn lock(&self, contract_id: ContractId) -> ContractGuard {
        match self {
            Self::Memory(s) => s.lock(contract_id).await,
            Self::Sled(s) => s.lock(contract_id).await,
        }
    }

    async fn create(&self, contract: Contract) -> Result<Contract, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.create(contract).await,
            Self::Sled(s) => s.create(contract).await,
        }
    }

    async fn get(&self, contract_id: ContractId) -> Result<Option<Contract>, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.get(contract_id).await,
            Self::Sled(s) => s.get(contract_id).await,
        }
    }

    async fn list_by_status(
        &self,
        status: clearinghouse::state_machine::Status,
    ) -> Result<Vec<Contract>, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.list_by_status(status).await,
            Self::Sled(s) => s.list_by_status(status).await,
        }
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Contract>, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.list_by_buyer(buyer_id).await,
            Self::Sled(s) => s.list_by_buyer(buyer_id).await,
        }
    }

    async fn save(&self, contract: Contract) -> Result<Contract, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.save(contract).await,
            Self::Sled(s) => s.save(contract).await,
        }
    }

    async fn add_submission(&self, submission: Submission) -> Result<Submission, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.add_submission(submission).await,
            Self::Sled(s) => s.add_submission(submission).await,
        }
    }

    async fn latest_submission(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<Submission>, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.latest_submission(contract_id).await,
            Self::Sled(s) => s.latest_submission(contract_id).await,
        }
    }

    async fn update_submission_verification(
        &self,
        submission_id: clearinghouse::types::SubmissionId,
        is_valid: bool,
        result: serde_json::Value,
    ) -> Result<(), ClearinghouseError> {
        match self {
            Self::Memory(s) => s.update_submission_verification(submission_id, is_valid, result).await,
            Self::Sled(s) => s.update_submission_verification(submission_id, is_valid, result).await,
        }
    }

    async fn save_with_event(
        &self,
        contract: Contract,
        event: AuditEvent,
    ) -> Result<(Contract, AuditEvent), ClearinghouseError> {
        match self {
            Self::Memory(s) => s.save_with_event(contract, event).await,
            Self::Sled(s) => s.save_with_event(contract, event).await,
        }
    }
}

#[async_trait]
impl EventLog for AnyStore {
    async fn append(&self, event: AuditEvent) -> Result<AuditEvent, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.append(event).await,
            Self::Sled(s) => s.append(event).await,
        }
    }

    async fn list_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<AuditEvent>, ClearinghouseError> {
        match self {
            Self::Memory(s) => s.list_for_contract(contract_id).await,
            Self::Sled(s) => s.list_for_contract(contract_id).await,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clearinghouse")
}

fn load_config() -> Config {
    let config_path = data_dir().join("config.toml");
    let config = if config_path.exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            eprintln!("warning: failed to parse {}: {e}, using defaults", config_path.display());
            Config::default()
        })
    } else {
        Config::default()
    };
    config.with_env_overlay()
}

fn build_store(config: &Config) -> Result<AnyStore, ClearinghouseError> {
    Ok(match config.store.backend {
        StoreBackend::Memory => AnyStore::Memory(InMemoryContractStore::new()),
        StoreBackend::Sled => {
            std::fs::create_dir_all(&config.store.data_dir)
                .map_err(|e| ClearinghouseError::Store(e.to_string()))?;
            AnyStore::Sled(SledContractStore::open(&config.store.data_dir)?)
        }
    })
}

fn parse_contract_id(raw: &str) -> Result<ContractId, String> {
    raw.parse::<uuid::Uuid>()
        .map(ContractId::from_uuid)
        .map_err(|e| format!("invalid contract id {raw:?}: {e}"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if let Err(err) = run(args).await {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Vec<String>) -> anyhow::Result<()> {
    use anyhow::Context;

    let config = load_config();
    let store = Arc::new(build_store(&config)?);
    let payments = Arc::new(clearinghouse::adapters::SimulatedPaymentAdapter);
    let escrow = Arc::new(EscrowService::with_max_payload_bytes(
        store.clone(),
        payments,
        config.escrow.max_payload_bytes,
    ));
    let factory = Arc::new(VerifierFactory::new(
        Arc::new(clearinghouse::adapters::ProcessSandbox::new(config.sandbox.interpreter.clone())),
        Arc::new(clearinghouse::adapters::SimulatedJudge),
        &config.sandbox,
        &config.semantic,
    ));
    let verification = VerificationService::new(store.clone(), escrow.clone(), factory);

    match args.get(1).map(String::as_str) {
        Some("create") => {
            let [buyer, amount, description, descriptor_path] = match args.get(2..6) {
                Some([a, b, c, d]) => [a.clone(), b.clone(), c.clone(), d.clone()],
                _ => anyhow::bail!("usage: create <buyer> <amount> <description> <descriptor.json>"),
            };
            let amount = Amount::new(amount.parse().context("invalid amount")?)?;
            let descriptor_raw = std::fs::read_to_string(&descriptor_path)
                .with_context(|| format!("reading {descriptor_path}"))?;
            let descriptor: serde_json::Value = serde_json::from_str(&descriptor_raw)
                .context("parsing descriptor JSON")?;

            let contract = escrow
                .create_contract(buyer, amount, description, descriptor, None, config.escrow.default_max_retries)
                .await?;
            println!("created contract {}", contract.id);
        }
        Some("fund") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: fund <contract_id>")?)?;
            let contract = escrow.fund_contract(contract_id).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Some("accept") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: accept <contract_id> <worker>")?)?;
            let worker = args.get(3).context("usage: accept <contract_id> <worker>")?.clone();
            let contract = escrow.accept_contract(contract_id, worker).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Some("submit") => {
            // Built-in verify-and-settle: a submission is immediately run
            // through the contract's verifier strategy, settling on a pass
            // or recording a retry/failure on a reject, rather than
            // leaving the caller to invoke `verify` as a second step.
            let contract_id = parse_contract_id(args.get(2).context("usage: submit <contract_id> <payload-file>")?)?;
            let payload_path = args.get(3).context("usage: submit <contract_id> <payload-file>")?;
            let payload = std::fs::read(payload_path).with_context(|| format!("reading {payload_path}"))?;
            let submission = escrow.submit_work(contract_id, payload, None).await?;
            println!("recorded submission {}", submission.id);

            let result = verification.run_verification(contract_id).await?;
            let status = escrow.get_status(contract_id).await?;
            println!(
                "verification {}: {} (contract now {})",
                if result.is_valid { "PASSED" } else { "FAILED" },
                result.details,
                status.status
            );
        }
        Some("verify") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: verify <contract_id>")?)?;
            let result = verification.run_verification(contract_id).await?;
            println!(
                "verification {}: {}",
                if result.is_valid { "PASSED" } else { "FAILED" },
                result.details
            );
        }
        Some("dispute") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: dispute <contract_id> <reason>")?)?;
            let reason = args.get(3).context("usage: dispute <contract_id> <reason>")?.clone();
            let contract = escrow.raise_dispute(contract_id, reason, Actor::System).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Some("get") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: get <contract_id>")?)?;
            let contract = escrow.get_contract(contract_id).await?;
            println!("{}", serde_json::to_string_pretty(&contract)?);
        }
        Some("expire") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: expire <contract_id>")?)?;
            let contract = escrow.expire_contract(contract_id).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Some("resolve-worker") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: resolve-worker <contract_id>")?)?;
            let contract = escrow.resolve_dispute_for_worker(contract_id).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Some("resolve-buyer") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: resolve-buyer <contract_id>")?)?;
            let contract = escrow.resolve_dispute_for_buyer(contract_id).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Some("list") => {
            let filter = args.get(2).context("usage: list status:<STATUS> | buyer:<buyer_id>")?;
            let contracts = if let Some(status) = filter.strip_prefix("status:") {
                let status: clearinghouse::state_machine::Status = status.parse()?;
                store.list_by_status(status).await?
            } else if let Some(buyer) = filter.strip_prefix("buyer:") {
                store.list_by_buyer(buyer).await?
            } else {
                anyhow::bail!("usage: list status:<STATUS> | buyer:<buyer_id>");
            };
            for contract in contracts {
                println!("{} {} {} {}", contract.id, contract.status, contract.buyer_id, contract.amount);
            }
        }
        Some("status") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: status <contract_id>")?)?;
            let status = escrow.get_status(contract_id).await?;
            println!(
                "status={} retry_count={}/{} allowed_events={:?}",
                status.status, status.retry_count, status.max_retries, status.allowed_events
            );
        }
        Some("events") => {
            let contract_id = parse_contract_id(args.get(2).context("usage: events <contract_id>")?)?;
            let events = escrow.get_events(contract_id).await?;
            for event in events {
                println!("{} {} -> {:?} {}", event.created_at, event.event_type, event.old_status, event.new_status);
            }
        }
        Some("--version") | Some("-V") => {
            println!("clearinghouse-node {}", clearinghouse::VERSION);
        }
        _ => {
            print_help();
        }
    }

    Ok(())
}

fn print_help() {
    println!("clearinghouse-node {}", clearinghouse::VERSION);
    println!();
    println!("USAGE:");
    println!("    clearinghouse-node <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    create  <buyer> <amount> <description> <descriptor.json>");
    println!("    fund    <contract_id>");
    println!("    accept  <contract_id> <worker>");
    println!("    submit  <contract_id> <payload-file>");
    println!("    verify  <contract_id>");
    println!("    dispute <contract_id> <reason>");
    println!("    resolve-worker <contract_id>");
    println!("    resolve-buyer  <contract_id>");
    println!("    expire  <contract_id>");
    println!("    get     <contract_id>");
    println!("    list    status:<STATUS> | buyer:<buyer_id>");
    println!("    status  <contract_id>");
    println!("    events  <contract_id>");
    println!();
    println!("OPTIONS:");
    println!("    -V, --version   Print version");
}
