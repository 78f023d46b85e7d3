//! "View my NFTs" session: guard → collection info → resolve → fetch-all,
//! committed into a display state.

use alloy_primitives::Address;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::contract::CollectionReader;
use crate::metadata::{MetadataFetcher, OwnedToken};
use crate::metrics::METRICS;
use crate::network::{ensure_network, ensure_ready};
use crate::ownership::OwnershipResolver;
use crate::wallet::WalletProvider;

/// Contract `name()` / `symbol()`; either may be unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewerState {
    pub items: Vec<OwnedToken>,
    pub loading: bool,
    pub error: Option<String>,
    pub collection: CollectionInfo,
    /// Generation of the request that produced `items`.
    pub generation: u64,
}

/// Held while a view runs. Dropping it (completion, error, or the caller
/// abandoning the future) clears the loading flag and the in-flight flag.
struct InFlight<'a> {
    viewer: &'a NftViewer,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.viewer.write_state().loading = false;
        self.viewer.in_flight.store(false, Ordering::Release);
    }
}

pub struct NftViewer {
    reader: Arc<dyn CollectionReader>,
    wallet: Option<Arc<dyn WalletProvider>>,
    resolver: OwnershipResolver,
    fetcher: MetadataFetcher,
    expected_chain: u64,
    state: RwLock<ViewerState>,
    in_flight: AtomicBool,
    generation: AtomicU64,
}

impl NftViewer {
    pub fn new(
        reader: Arc<dyn CollectionReader>,
        wallet: Option<Arc<dyn WalletProvider>>,
        resolver: OwnershipResolver,
        fetcher: MetadataFetcher,
        expected_chain: u64,
    ) -> Self {
        Self {
            reader,
            wallet,
            resolver,
            fetcher,
            expected_chain,
            state: RwLock::new(ViewerState::default()),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the display state.
    pub fn state(&self) -> ViewerState {
        self.read_state().clone()
    }

    /// Drop the displayed list (e.g. the wallet disconnected). Results of a
    /// view still in flight are discarded when it completes.
    pub fn clear(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut state = self.write_state();
        *state = ViewerState {
            generation,
            ..ViewerState::default()
        };
    }

    /// List the NFTs of the connected account.
    pub async fn view_my_nfts(&self) -> Result<Vec<OwnedToken>, crate::Error> {
        let _in_flight = self.begin()?;
        let (generation, started) = self.start_request();

        let result = async {
            let owner = ensure_ready(self.wallet.as_deref(), self.expected_chain).await?;
            Ok::<_, crate::Error>(self.load(owner).await)
        }
        .await;

        self.finish(generation, started, result)
    }

    /// List the NFTs of `owner` without requiring a connected account.
    pub async fn view_owner(&self, owner: Address) -> Result<Vec<OwnedToken>, crate::Error> {
        let _in_flight = self.begin()?;
        let (generation, started) = self.start_request();

        let result = async {
            let wallet = self
                .wallet
                .as_deref()
                .ok_or(crate::Error::NoWalletProvider)?;
            ensure_network(wallet, self.expected_chain).await?;
            Ok::<_, crate::Error>(self.load(owner).await)
        }
        .await;

        self.finish(generation, started, result)
    }

    fn begin(&self) -> Result<InFlight<'_>, crate::Error> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            METRICS.views_rejected.fetch_add(1, Ordering::Relaxed);
            debug!("View already in flight, rejecting");
            return Err(crate::Error::ViewInProgress);
        }
        Ok(InFlight { viewer: self })
    }

    fn start_request(&self) -> (u64, Instant) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut state = self.write_state();
        state.loading = true;
        state.error = None;
        state.items.clear();
        (generation, Instant::now())
    }

    async fn load(&self, owner: Address) -> (CollectionInfo, Vec<OwnedToken>) {
        let (name, symbol) = tokio::join!(self.reader.name(), self.reader.symbol());
        if let Err(e) = &name {
            debug!(error = %e, "name() unavailable");
        }
        if let Err(e) = &symbol {
            debug!(error = %e, "symbol() unavailable");
        }
        let collection = CollectionInfo {
            name: name.ok(),
            symbol: symbol.ok(),
        };

        let resolution = self.resolver.resolve(self.reader.as_ref(), owner).await;
        let items = self
            .fetcher
            .fetch_all(
                self.reader.as_ref(),
                &resolution.token_ids,
                collection.name.as_deref(),
            )
            .await;

        (collection, items)
    }

    fn finish(
        &self,
        generation: u64,
        started: Instant,
        result: Result<(CollectionInfo, Vec<OwnedToken>), crate::Error>,
    ) -> Result<Vec<OwnedToken>, crate::Error> {
        METRICS.views_total.fetch_add(1, Ordering::Relaxed);
        METRICS.record_view_duration(started);

        let current = self.generation.load(Ordering::Acquire) == generation;
        let mut state = self.write_state();

        match result {
            Ok((collection, items)) => {
                METRICS
                    .tokens_listed
                    .fetch_add(items.len() as u64, Ordering::Relaxed);
                if current {
                    info!(generation, count = items.len(), "View committed");
                    state.items = items.clone();
                    state.collection = collection;
                    state.generation = generation;
                } else {
                    debug!(generation, "Discarding stale view results");
                }
                Ok(items)
            }
            Err(e) => {
                METRICS.view_errors.fetch_add(1, Ordering::Relaxed);
                error!(generation, error = %e, "View failed");
                if current {
                    state.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ViewerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ViewerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
