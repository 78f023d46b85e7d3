//! # NFT Viewer
//!
//! Client side of an ERC-721 mint page: mint transactions, a live minted
//! count, and a holder gallery that resolves on-chain ownership into
//! displayable metadata fetched through IPFS gateways.
//!
//! ## Quick Start
//! ```bash
//! cargo run --bin nft-viewer -- view --owner 0x...
//! ```
//!
//! ## Pipeline
//! - Network guard: wallet present, account connected, expected chain
//! - Ownership resolver: `tokensOfOwner` → enumerable index → `Transfer`
//!   logs → `ownerOf` scan
//! - Metadata fetcher: inline `data:` JSON or gateway fetch, normalized
//! - Gateway fanout: ordered candidates, per-attempt timeout

pub mod concurrency;
pub mod config;
pub mod contract;
mod error;
pub mod feed;
pub mod gateway;
pub mod metadata;
pub mod metrics;
pub mod mint;
pub mod mint_counter;
pub mod network;
pub mod ownership;
pub mod rpc;
pub mod viewer;
pub mod wallet;

#[cfg(test)]
mod test_utils;

pub use config::{CollectionDescriptor, Config};
pub use contract::{CollectionReader, RpcCollection};
pub use error::Error;
pub use feed::{RpcTransferFeed, TransferFeed};
pub use gateway::Gateway;
pub use metadata::{MetadataFetcher, OwnedToken};
pub use mint::{MintReceipt, Minter};
pub use mint_counter::MintCounter;
pub use ownership::{OwnershipResolver, Resolution, Strategy};
pub use rpc::RpcClient;
pub use viewer::{CollectionInfo, NftViewer, ViewerState};
pub use wallet::{RpcWallet, WalletProvider};
