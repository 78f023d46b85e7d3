//! Test doubles for the contract, wallet, and feed capabilities.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::contract::{CollectionReader, TransferDirection, TransferLog};
use crate::feed::TransferFeed;
use crate::wallet::{TransactionReceipt, TransactionRequest, WalletProvider};

/// Serve `app` on an ephemeral local port; returns `http://127.0.0.1:<port>`.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn unsupported(method: &str) -> crate::Error {
    crate::Error::Contract(format!("{method}: execution reverted"))
}

/// Collection whose every method is unsupported until configured.
#[derive(Default)]
pub struct MockCollection {
    pub name: Option<String>,
    pub symbol: Option<String>,
    queryable: Option<HashMap<Address, Vec<u64>>>,
    enumerable: Option<HashMap<Address, Vec<u64>>>,
    logs: Option<Vec<TransferLog>>,
    total_minted: Mutex<Option<u64>>,
    owners: HashMap<u64, Address>,
    uris: HashMap<u64, String>,
    owner_of_delay: Option<Duration>,
    index_fails_at: Option<u64>,
    calls: Mutex<Vec<&'static str>>,
    owner_of_in_flight: AtomicUsize,
    owner_of_peak: AtomicUsize,
    total_minted_reads: AtomicU64,
}

impl MockCollection {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    /// Supports `tokensOfOwner`.
    pub fn with_queryable(mut self, owner: Address, ids: &[u64]) -> Self {
        self.queryable
            .get_or_insert_with(HashMap::new)
            .insert(owner, ids.to_vec());
        self
    }

    /// Supports `balanceOf` + `tokenOfOwnerByIndex`.
    pub fn with_enumerable(mut self, owner: Address, ids: &[u64]) -> Self {
        self.enumerable
            .get_or_insert_with(HashMap::new)
            .insert(owner, ids.to_vec());
        self
    }

    pub fn with_logs(mut self, logs: Vec<TransferLog>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Supports `totalMinted`; ids missing from `owners` revert in `ownerOf`.
    pub fn with_minted(mut self, total: u64, owners: &[(u64, Address)]) -> Self {
        self.total_minted = Mutex::new(Some(total));
        self.owners = owners.iter().copied().collect();
        self
    }

    pub fn with_uri(mut self, id: u64, uri: String) -> Self {
        self.uris.insert(id, uri);
        self
    }

    pub fn with_owner_of_delay(mut self, delay: Duration) -> Self {
        self.owner_of_delay = Some(delay);
        self
    }

    /// `tokenOfOwnerByIndex` reverts from this index on.
    pub fn with_index_failure_at(mut self, index: u64) -> Self {
        self.index_fails_at = Some(index);
        self
    }

    pub fn set_total_minted(&self, total: u64) {
        *self.total_minted.lock().unwrap() = Some(total);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, method: &str) -> bool {
        self.calls().iter().any(|m| *m == method)
    }

    pub fn owner_of_peak(&self) -> usize {
        self.owner_of_peak.load(Ordering::SeqCst)
    }

    pub fn total_minted_reads(&self) -> u64 {
        self.total_minted_reads.load(Ordering::SeqCst)
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }
}

fn small(v: U256) -> u64 {
    u64::try_from(v).unwrap()
}

#[async_trait]
impl CollectionReader for MockCollection {
    async fn name(&self) -> Result<String, crate::Error> {
        self.record("name");
        self.name.clone().ok_or_else(|| unsupported("name"))
    }

    async fn symbol(&self) -> Result<String, crate::Error> {
        self.record("symbol");
        self.symbol.clone().ok_or_else(|| unsupported("symbol"))
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, crate::Error> {
        self.record("balanceOf");
        let map = self.enumerable.as_ref().ok_or_else(|| unsupported("balanceOf"))?;
        Ok(U256::from(map.get(&owner).map_or(0, Vec::len)))
    }

    async fn token_of_owner_by_index(
        &self,
        owner: Address,
        index: U256,
    ) -> Result<U256, crate::Error> {
        self.record("tokenOfOwnerByIndex");
        if self.index_fails_at.is_some_and(|at| small(index) >= at) {
            return Err(unsupported("tokenOfOwnerByIndex"));
        }
        let map = self
            .enumerable
            .as_ref()
            .ok_or_else(|| unsupported("tokenOfOwnerByIndex"))?;
        map.get(&owner)
            .and_then(|ids| ids.get(small(index) as usize))
            .map(|id| U256::from(*id))
            .ok_or_else(|| unsupported("tokenOfOwnerByIndex"))
    }

    async fn token_uri(&self, token_id: U256) -> Result<String, crate::Error> {
        self.record("tokenURI");
        self.uris
            .get(&small(token_id))
            .cloned()
            .ok_or_else(|| unsupported("tokenURI"))
    }

    async fn tokens_of_owner(&self, owner: Address) -> Result<Vec<U256>, crate::Error> {
        self.record("tokensOfOwner");
        let map = self.queryable.as_ref().ok_or_else(|| unsupported("tokensOfOwner"))?;
        Ok(map
            .get(&owner)
            .map(|ids| ids.iter().map(|id| U256::from(*id)).collect())
            .unwrap_or_default())
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address, crate::Error> {
        self.record("ownerOf");
        let now = self.owner_of_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.owner_of_peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.owner_of_delay {
            // Vary completion order across ids.
            let jitter = (small(token_id) % 3) as u32;
            tokio::time::sleep(delay * (jitter + 1)).await;
        }
        self.owner_of_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.owners
            .get(&small(token_id))
            .copied()
            .ok_or_else(|| unsupported("ownerOf"))
    }

    async fn total_minted(&self) -> Result<U256, crate::Error> {
        self.record("totalMinted");
        self.total_minted_reads.fetch_add(1, Ordering::SeqCst);
        self.total_minted
            .lock()
            .unwrap()
            .map(U256::from)
            .ok_or_else(|| unsupported("totalMinted"))
    }

    async fn transfer_logs(
        &self,
        owner: Address,
        direction: TransferDirection,
    ) -> Result<Vec<TransferLog>, crate::Error> {
        self.record("getLogs");
        let logs = self.logs.as_ref().ok_or_else(|| unsupported("getLogs"))?;
        Ok(logs
            .iter()
            .filter(|l| match direction {
                TransferDirection::Received => l.to == owner,
                TransferDirection::Sent => l.from == owner,
            })
            .copied()
            .collect())
    }
}

type MinedHook = Box<dyn Fn() + Send + Sync>;

/// Wallet whose transactions are mined on the first receipt poll unless
/// configured otherwise.
pub struct MockWallet {
    chain: AtomicU64,
    account: Option<Address>,
    fail_send: bool,
    revert: bool,
    pending_polls: AtomicU64,
    on_mined: Option<MinedHook>,
    receipt_polls: AtomicU64,
    pub sent: Mutex<Vec<TransactionRequest>>,
}

impl MockWallet {
    pub fn new(chain: u64, account: Option<Address>) -> Self {
        Self {
            chain: AtomicU64::new(chain),
            account,
            fail_send: false,
            revert: false,
            pending_polls: AtomicU64::new(0),
            on_mined: None,
            receipt_polls: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_send = true;
        self
    }

    /// Mined with status 0.
    pub fn reverting(mut self) -> Self {
        self.revert = true;
        self
    }

    /// Report the transaction as pending for the first `polls` receipt reads.
    pub fn pending_for(self, polls: u64) -> Self {
        self.pending_polls.store(polls, Ordering::SeqCst);
        self
    }

    /// Run `hook` when the receipt is first reported (the chain state changes).
    pub fn on_mined(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_mined = Some(Box::new(hook));
        self
    }

    pub fn set_chain(&self, chain: u64) {
        self.chain.store(chain, Ordering::SeqCst);
    }

    pub fn receipt_polls(&self) -> u64 {
        self.receipt_polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn chain_id(&self) -> Result<u64, crate::Error> {
        Ok(self.chain.load(Ordering::SeqCst))
    }

    async fn account(&self) -> Result<Option<Address>, crate::Error> {
        Ok(self.account)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, crate::Error> {
        if self.fail_send {
            return Err(crate::Error::Contract("user rejected transaction".into()));
        }
        self.sent.lock().unwrap().push(tx);
        Ok(B256::repeat_byte(0xab))
    }

    async fn transaction_receipt(
        &self,
        _tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, crate::Error> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending {
            return Ok(None);
        }
        if let Some(hook) = &self.on_mined {
            if !self.revert {
                hook();
            }
        }
        Ok(Some(TransactionReceipt {
            block_number: 1,
            success: !self.revert,
        }))
    }
}

/// Feed handing out one pre-built receiver; `None` means no push transport.
pub struct MockFeed {
    rx: Mutex<Option<mpsc::Receiver<TransferLog>>>,
}

impl MockFeed {
    pub fn new() -> (Self, mpsc::Sender<TransferLog>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }

    pub fn unavailable() -> Self {
        Self {
            rx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TransferFeed for MockFeed {
    async fn subscribe(
        &self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TransferLog>, crate::Error> {
        self.rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| crate::Error::Rpc("eth_newFilter: method not found".into()))
    }
}
