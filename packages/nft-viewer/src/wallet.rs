//! Wallet provider capability.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::rpc::{parse_quantity, RpcClient};

/// Transaction handed to the wallet for signing and submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas: u64,
    pub data: Bytes,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub block_number: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
}

/// Connected wallet: chain, account, and transaction submission.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64, crate::Error>;
    /// `None` when no account is connected.
    async fn account(&self) -> Result<Option<Address>, crate::Error>;
    /// Submit and return the transaction hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, crate::Error>;
    /// `None` while the transaction is still pending.
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, crate::Error>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    block_number: Option<String>,
    status: Option<String>,
}

impl RpcReceipt {
    fn parse(self) -> Result<Option<TransactionReceipt>, crate::Error> {
        // Some nodes return a receipt shell before the block is sealed.
        let Some(block) = self.block_number else {
            return Ok(None);
        };
        let status = match self.status {
            Some(s) => parse_quantity(&s)?,
            None => 1,
        };
        Ok(Some(TransactionReceipt {
            block_number: parse_quantity(&block)?,
            success: status == 1,
        }))
    }
}

/// Node-managed wallet: accounts unlocked on the RPC endpoint (`eth_accounts`),
/// or a fixed account for read-only use.
pub struct RpcWallet {
    rpc: Arc<RpcClient>,
    account: Option<Address>,
}

impl RpcWallet {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc, account: None }
    }

    pub fn with_account(rpc: Arc<RpcClient>, account: Address) -> Self {
        Self {
            rpc,
            account: Some(account),
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn chain_id(&self) -> Result<u64, crate::Error> {
        let hex: String = self.rpc.request("eth_chainId", json!([])).await?;
        parse_quantity(&hex)
    }

    async fn account(&self) -> Result<Option<Address>, crate::Error> {
        if let Some(account) = self.account {
            return Ok(Some(account));
        }
        let accounts: Vec<Address> = self.rpc.request("eth_accounts", json!([])).await?;
        Ok(accounts.into_iter().next())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, crate::Error> {
        self.rpc
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": tx.from,
                    "to": tx.to,
                    "value": format!("{:#x}", tx.value),
                    "gas": format!("{:#x}", tx.gas),
                    "data": tx.data,
                }]),
            )
            .await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, crate::Error> {
        let receipt: Option<RpcReceipt> = self
            .rpc
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        match receipt {
            Some(r) => r.parse(),
            None => Ok(None),
        }
    }
}
