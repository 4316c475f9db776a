//! Deterministic-looking fake [`PaymentAdapter`], mirroring the original
//! implementation's `PaymentService(simulate=True)` mode: no real chain
//! calls, just plausible opaque references generated from fresh UUIDs.

use async_trait::async_trait;
use uuid::Uuid;

use super::PaymentAdapter;
use crate::error::ClearinghouseError;
use crate::types::Amount;

/// Offline [`PaymentAdapter`] that never touches a real chain. Wallet ids
/// and transaction refs are `0x`-prefixed hex derived from random UUIDs,
/// shaped like the addresses/tx hashes a real EVM-style adapter would
/// return, so downstream formatting/logging code exercises realistic
/// values.
#[derive(Default)]
pub struct SimulatedPaymentAdapter;

fn fake_address() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

fn fake_tx_hash() -> String {
    format!("0x{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[async_trait]
impl PaymentAdapter for SimulatedPaymentAdapter {
    async fn create_escrow_wallet(&self) -> Result<String, ClearinghouseError> {
        Ok(fake_address())
    }

    async fn confirm_funding(
        &self,
        _wallet: &str,
        _amount: Amount,
        _buyer: &str,
    ) -> Result<String, ClearinghouseError> {
        Ok(fake_tx_hash())
    }

    async fn transfer_to_worker(
        &self,
        _from_wallet: &str,
        _worker: &str,
        _amount: Amount,
    ) -> Result<String, ClearinghouseError> {
        Ok(fake_tx_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn wallet_and_refs_are_distinct_each_call() {
        let adapter = SimulatedPaymentAdapter;
        let wallet = adapter.create_escrow_wallet().await.unwrap();
        let amount = Amount::new(Decimal::new(100, 2)).unwrap();
        let funding_ref = adapter
            .confirm_funding(&wallet, amount, "buyer-1")
            .await
            .unwrap();
        let settlement_ref = adapter
            .transfer_to_worker(&wallet, "worker-1", amount)
            .await
            .unwrap();
        assert_ne!(funding_ref, settlement_ref);
        assert!(wallet.starts_with("0x"));
    }
}
