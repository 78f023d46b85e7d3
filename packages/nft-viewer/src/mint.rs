//! Mint transaction: `mint(amount)` with value and gas scaled by the amount.

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::CollectionDescriptor;
use crate::contract::encode_mint;
use crate::metrics::METRICS;
use crate::mint_counter::MintCounter;
use crate::network::ensure_ready;
use crate::wallet::{TransactionReceipt, TransactionRequest, WalletProvider};

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_RECEIPT_MAX_POLLS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub amount: u64,
    pub value: U256,
}

pub struct Minter {
    wallet: Arc<dyn WalletProvider>,
    contract: Address,
    unit_cost: U256,
    unit_gas: u64,
    max_per_tx: u64,
    expected_chain: u64,
    counter: Option<Arc<MintCounter>>,
    receipt_poll_interval: Duration,
    receipt_max_polls: u32,
}

impl Minter {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        descriptor: &CollectionDescriptor,
        max_per_tx: u64,
    ) -> Self {
        Self {
            wallet,
            contract: descriptor.contract_address,
            unit_cost: descriptor.wei_cost,
            unit_gas: descriptor.gas_limit,
            max_per_tx: max_per_tx.max(1),
            expected_chain: descriptor.network.id,
            counter: None,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_max_polls: DEFAULT_RECEIPT_MAX_POLLS,
        }
    }

    /// How often and how many times to ask for the receipt after sending.
    pub fn with_receipt_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_max_polls = max_polls.max(1);
        self
    }

    /// Refresh `counter` after every successful mint.
    pub fn with_counter(mut self, counter: Arc<MintCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Clamp to `1..=max_per_tx`.
    pub fn clamp_amount(&self, amount: u64) -> u64 {
        amount.clamp(1, self.max_per_tx)
    }

    pub fn build_transaction(&self, from: Address, amount: u64) -> TransactionRequest {
        TransactionRequest {
            from,
            to: self.contract,
            value: self.unit_cost.saturating_mul(U256::from(amount)),
            gas: self.unit_gas.saturating_mul(amount),
            data: encode_mint(amount),
        }
    }

    pub async fn mint(&self, amount: u64) -> Result<MintReceipt, crate::Error> {
        let amount = self.clamp_amount(amount);
        let from = ensure_ready(Some(self.wallet.as_ref()), self.expected_chain).await?;
        let tx = self.build_transaction(from, amount);
        let value = tx.value;

        let tx_hash = match self.wallet.send_transaction(tx).await {
            Ok(hash) => hash,
            Err(e) => {
                METRICS.mints_failed.fetch_add(1, Ordering::Relaxed);
                error!(from = %from, amount, error = %e, "Mint failed");
                return Err(crate::Error::MintFailed(e.to_string()));
            }
        };

        METRICS.mints_sent.fetch_add(1, Ordering::Relaxed);
        info!(from = %from, amount, tx_hash = %tx_hash, "Mint sent");

        let mined = match self.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.success => receipt,
            Ok(_) => {
                METRICS.mints_failed.fetch_add(1, Ordering::Relaxed);
                error!(tx_hash = %tx_hash, "Mint transaction reverted");
                return Err(crate::Error::MintFailed("transaction reverted".into()));
            }
            Err(e) => {
                METRICS.mints_failed.fetch_add(1, Ordering::Relaxed);
                error!(tx_hash = %tx_hash, error = %e, "Mint not confirmed");
                return Err(e);
            }
        };
        info!(tx_hash = %tx_hash, block = mined.block_number, "Mint confirmed");

        if let Some(counter) = &self.counter {
            if let Err(e) = counter.refresh().await {
                warn!(error = %e, "Minted count refresh failed after mint");
            }
        }

        Ok(MintReceipt {
            tx_hash,
            block_number: mined.block_number,
            amount,
            value,
        })
    }

    /// Poll for the receipt, at most `receipt_max_polls` times. Poll errors
    /// are retried like a pending transaction.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, crate::Error> {
        for attempt in 1..=self.receipt_max_polls {
            match self.wallet.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => debug!(tx_hash = %tx_hash, attempt, "Mint pending"),
                Err(e) => warn!(tx_hash = %tx_hash, attempt, error = %e, "Receipt poll failed"),
            }
            if attempt < self.receipt_max_polls {
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        }
        Err(crate::Error::MintFailed(format!(
            "no receipt for {tx_hash} after {} polls",
            self.receipt_max_polls
        )))
    }
}
