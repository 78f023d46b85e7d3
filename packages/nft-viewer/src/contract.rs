//! Read capability over the ERC-721 collection contract.
//!
//! [`CollectionReader`] is the seam the ownership resolver and metadata fetcher
//! work against; [`RpcCollection`] implements it with `eth_call` / `eth_getLogs`.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::rpc::RpcClient;

sol! {
    interface IMintCollection {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function tokenURI(uint256 tokenId) external view returns (string);
        function tokensOfOwner(address owner) external view returns (uint256[]);
        function ownerOf(uint256 tokenId) external view returns (address);
        function totalMinted() external view returns (uint256);
        function mint(uint256 amount) external payable;

        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

/// One decoded `Transfer(from, to, tokenId)` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLog {
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
}

/// Which side of a transfer the queried address is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Logs where the address is the recipient.
    Received,
    /// Logs where the address is the sender.
    Sent,
}

/// Fixed read surface of the collection contract.
///
/// Any method may be unsupported by a given deployment; implementations
/// report that as [`crate::Error::Contract`].
#[async_trait]
pub trait CollectionReader: Send + Sync {
    async fn name(&self) -> Result<String, crate::Error>;
    async fn symbol(&self) -> Result<String, crate::Error>;
    async fn balance_of(&self, owner: Address) -> Result<U256, crate::Error>;
    async fn token_of_owner_by_index(
        &self,
        owner: Address,
        index: U256,
    ) -> Result<U256, crate::Error>;
    async fn token_uri(&self, token_id: U256) -> Result<String, crate::Error>;
    async fn tokens_of_owner(&self, owner: Address) -> Result<Vec<U256>, crate::Error>;
    async fn owner_of(&self, token_id: U256) -> Result<Address, crate::Error>;
    async fn total_minted(&self) -> Result<U256, crate::Error>;
    /// All `Transfer` logs from genesis to latest on one side of `owner`.
    async fn transfer_logs(
        &self,
        owner: Address,
        direction: TransferDirection,
    ) -> Result<Vec<TransferLog>, crate::Error>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcLog {
    pub topics: Vec<B256>,
    #[serde(default)]
    pub removed: bool,
}

impl RpcLog {
    /// `None` for logs that are not an ERC-721 `Transfer` (e.g. an unindexed tokenId).
    pub(crate) fn decode_transfer(&self) -> Option<TransferLog> {
        if self.removed || self.topics.len() != 4 {
            return None;
        }
        if self.topics[0] != IMintCollection::Transfer::SIGNATURE_HASH {
            return None;
        }
        Some(TransferLog {
            from: Address::from_word(self.topics[1]),
            to: Address::from_word(self.topics[2]),
            token_id: U256::from_be_slice(self.topics[3].as_slice()),
        })
    }
}

/// `eth_call` backed collection reader.
#[derive(Clone)]
pub struct RpcCollection {
    rpc: Arc<RpcClient>,
    address: Address,
}

impl RpcCollection {
    pub fn new(rpc: Arc<RpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return, crate::Error> {
        let data: Bytes = self
            .rpc
            .request(
                "eth_call",
                json!([
                    { "to": self.address, "data": Bytes::from(call.abi_encode()) },
                    "latest"
                ]),
            )
            .await?;
        C::abi_decode_returns(&data, true)
            .map_err(|e| crate::Error::Contract(format!("{}: {e}", C::SIGNATURE)))
    }
}

#[async_trait]
impl CollectionReader for RpcCollection {
    async fn name(&self) -> Result<String, crate::Error> {
        Ok(self.call(IMintCollection::nameCall {}).await?._0)
    }

    async fn symbol(&self) -> Result<String, crate::Error> {
        Ok(self.call(IMintCollection::symbolCall {}).await?._0)
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, crate::Error> {
        Ok(self.call(IMintCollection::balanceOfCall { owner }).await?._0)
    }

    async fn token_of_owner_by_index(
        &self,
        owner: Address,
        index: U256,
    ) -> Result<U256, crate::Error> {
        Ok(self
            .call(IMintCollection::tokenOfOwnerByIndexCall { owner, index })
            .await?
            ._0)
    }

    async fn token_uri(&self, token_id: U256) -> Result<String, crate::Error> {
        Ok(self
            .call(IMintCollection::tokenURICall { tokenId: token_id })
            .await?
            ._0)
    }

    async fn tokens_of_owner(&self, owner: Address) -> Result<Vec<U256>, crate::Error> {
        Ok(self.call(IMintCollection::tokensOfOwnerCall { owner }).await?._0)
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address, crate::Error> {
        Ok(self
            .call(IMintCollection::ownerOfCall { tokenId: token_id })
            .await?
            ._0)
    }

    async fn total_minted(&self) -> Result<U256, crate::Error> {
        Ok(self.call(IMintCollection::totalMintedCall {}).await?._0)
    }

    async fn transfer_logs(
        &self,
        owner: Address,
        direction: TransferDirection,
    ) -> Result<Vec<TransferLog>, crate::Error> {
        let owner_topic = owner.into_word();
        let topics = match direction {
            TransferDirection::Received => {
                json!([IMintCollection::Transfer::SIGNATURE_HASH, null, owner_topic])
            }
            TransferDirection::Sent => {
                json!([IMintCollection::Transfer::SIGNATURE_HASH, owner_topic])
            }
        };
        let logs: Vec<RpcLog> = self
            .rpc
            .request(
                "eth_getLogs",
                json!([{
                    "address": self.address,
                    "fromBlock": "0x0",
                    "toBlock": "latest",
                    "topics": topics,
                }]),
            )
            .await?;
        Ok(logs.iter().filter_map(RpcLog::decode_transfer).collect())
    }
}

/// Calldata for `mint(amount)`.
pub fn encode_mint(amount: u64) -> Bytes {
    Bytes::from(
        IMintCollection::mintCall {
            amount: U256::from(amount),
        }
        .abi_encode(),
    )
}
