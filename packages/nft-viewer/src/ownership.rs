//! Ownership resolution: which token ids does an address hold?
//!
//! Four strategies are tried in a fixed order. Each one either yields a list
//! or is "not applicable" (any error, or an empty list); the first non-empty
//! list wins and later strategies never run. Results are never merged.

use alloy_primitives::{Address, U256};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::concurrency::map_with_concurrency;
use crate::contract::{CollectionReader, TransferDirection};
use crate::metrics::METRICS;

/// In-flight `ownerOf` reads during the exhaustive scan.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 10;

/// Largest `totalMinted()` the exhaustive scan will walk.
pub const DEFAULT_MAX_SCAN_TOKENS: u64 = 100_000;

const INDEX_PREALLOC: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `tokensOfOwner(owner)` (ERC721A queryable).
    DirectEnumeration = 0,
    /// `balanceOf` + `tokenOfOwnerByIndex` (ERC721 enumerable).
    IndexedEnumeration = 1,
    /// Replay of `Transfer` logs to and from the owner.
    EventReplay = 2,
    /// `ownerOf` over `1..=totalMinted()`.
    ExhaustiveScan = 3,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::DirectEnumeration,
        Strategy::IndexedEnumeration,
        Strategy::EventReplay,
        Strategy::ExhaustiveScan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::DirectEnumeration => "direct_enumeration",
            Strategy::IndexedEnumeration => "indexed_enumeration",
            Strategy::EventReplay => "event_replay",
            Strategy::ExhaustiveScan => "exhaustive_scan",
        }
    }
}

/// Outcome of a resolution: the ids and the strategy that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    pub strategy: Option<Strategy>,
    pub token_ids: Vec<String>,
}

pub struct OwnershipResolver {
    scan_concurrency: usize,
    max_scan_tokens: u64,
}

impl Default for OwnershipResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CONCURRENCY)
    }
}

impl OwnershipResolver {
    pub fn new(scan_concurrency: usize) -> Self {
        Self {
            scan_concurrency: scan_concurrency.max(1),
            max_scan_tokens: DEFAULT_MAX_SCAN_TOKENS,
        }
    }

    /// Treat collections with more than `max` minted tokens as unscannable.
    pub fn with_max_scan_tokens(mut self, max: u64) -> Self {
        self.max_scan_tokens = max;
        self
    }

    /// Token ids owned by `owner` as decimal strings. Never fails: an address
    /// no strategy finds anything for resolves to an empty list.
    pub async fn resolve(&self, reader: &dyn CollectionReader, owner: Address) -> Resolution {
        for strategy in Strategy::ORDER {
            match self.run(strategy, reader, owner).await {
                Ok(ids) if !ids.is_empty() => {
                    info!(
                        owner = %owner,
                        strategy = strategy.label(),
                        count = ids.len(),
                        "Resolved owned tokens"
                    );
                    METRICS.record_resolution(Some(strategy));
                    return Resolution {
                        strategy: Some(strategy),
                        token_ids: ids.iter().map(U256::to_string).collect(),
                    };
                }
                Ok(_) => {
                    debug!(owner = %owner, strategy = strategy.label(), "Strategy found nothing");
                }
                Err(e) => {
                    debug!(
                        owner = %owner,
                        strategy = strategy.label(),
                        error = %e,
                        "Strategy not applicable"
                    );
                }
            }
        }

        info!(owner = %owner, "No tokens found by any strategy");
        METRICS.record_resolution(None);
        Resolution::default()
    }

    async fn run(
        &self,
        strategy: Strategy,
        reader: &dyn CollectionReader,
        owner: Address,
    ) -> Result<Vec<U256>, crate::Error> {
        match strategy {
            Strategy::DirectEnumeration => reader.tokens_of_owner(owner).await,
            Strategy::IndexedEnumeration => indexed_enumeration(reader, owner).await,
            Strategy::EventReplay => event_replay(reader, owner).await,
            Strategy::ExhaustiveScan => {
                exhaustive_scan(reader, owner, self.scan_concurrency, self.max_scan_tokens).await
            }
        }
    }
}

async fn indexed_enumeration(
    reader: &dyn CollectionReader,
    owner: Address,
) -> Result<Vec<U256>, crate::Error> {
    let balance = reader.balance_of(owner).await?;
    let balance = u64::try_from(balance)
        .map_err(|_| crate::Error::Contract(format!("balanceOf out of range: {balance}")))?;

    // Sequential: one index at a time. The balance is untrusted.
    let mut ids = Vec::with_capacity(balance.min(INDEX_PREALLOC) as usize);
    for i in 0..balance {
        ids.push(reader.token_of_owner_by_index(owner, U256::from(i)).await?);
    }
    Ok(ids)
}

/// Received minus sent, partitioned by direction rather than replayed in
/// block order: a token sent away and received back is reported as not owned.
async fn event_replay(
    reader: &dyn CollectionReader,
    owner: Address,
) -> Result<Vec<U256>, crate::Error> {
    let received = reader
        .transfer_logs(owner, TransferDirection::Received)
        .await?;
    let sent = reader.transfer_logs(owner, TransferDirection::Sent).await?;

    let sent: HashSet<U256> = sent.iter().map(|l| l.token_id).collect();
    let mut seen = HashSet::new();
    Ok(received
        .iter()
        .map(|l| l.token_id)
        .filter(|id| seen.insert(*id) && !sent.contains(id))
        .collect())
}

async fn exhaustive_scan(
    reader: &dyn CollectionReader,
    owner: Address,
    concurrency: usize,
    max_tokens: u64,
) -> Result<Vec<U256>, crate::Error> {
    let total = reader.total_minted().await?;
    let total = u64::try_from(total)
        .map_err(|_| crate::Error::Contract(format!("totalMinted out of range: {total}")))?;
    if total == 0 {
        return Ok(Vec::new());
    }
    if total > max_tokens {
        return Err(crate::Error::Contract(format!(
            "totalMinted {total} exceeds scan limit {max_tokens}"
        )));
    }

    let candidates = (1..=total).map(U256::from);
    let owned = map_with_concurrency(candidates, concurrency, |id| async move {
        match reader.owner_of(id).await {
            // Address equality is case-insensitive by construction.
            Ok(who) if who == owner => Some(id),
            Ok(_) => None,
            Err(e) => {
                debug!(token_id = %id, error = %e, "ownerOf failed, treating as not owned");
                None
            }
        }
    })
    .await;

    Ok(owned.into_iter().flatten().collect())
}
