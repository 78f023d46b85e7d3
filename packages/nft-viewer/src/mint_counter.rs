//! Live "N minted" counter.
//!
//! `totalMinted()` is read once, then re-read on every transfer the feed
//! reports. Without a push transport the counter keeps the value it has.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::contract::CollectionReader;
use crate::feed::TransferFeed;

pub struct MintCounter {
    reader: Arc<dyn CollectionReader>,
    tx: watch::Sender<u64>,
}

/// Background follower; stop it when the count is no longer displayed.
pub struct MintCounterTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MintCounterTask {
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Mint counter task ended abnormally");
        }
    }
}

impl MintCounter {
    pub fn new(reader: Arc<dyn CollectionReader>) -> Self {
        let (tx, _) = watch::channel(0);
        Self { reader, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Re-read `totalMinted()` and publish it.
    pub async fn refresh(&self) -> Result<u64, crate::Error> {
        let total = self.reader.total_minted().await?;
        let total = u64::try_from(total)
            .map_err(|_| crate::Error::Contract(format!("totalMinted out of range: {total}")))?;
        self.tx.send_replace(total);
        debug!(total, "Minted count refreshed");
        Ok(total)
    }

    /// Read once, then follow `feed` until `cancel` fires.
    pub fn start(
        self: &Arc<Self>,
        feed: Arc<dyn TransferFeed>,
        cancel: CancellationToken,
    ) -> MintCounterTask {
        let counter = Arc::clone(self);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = counter.refresh().await {
                warn!(error = %e, "totalMinted() read failed");
            }

            let mut events = match feed.subscribe(task_cancel.child_token()).await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(error = %e, "No transfer feed, minted count is static");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(transfer) => {
                            debug!(token_id = %transfer.token_id, "Transfer observed");
                            if let Err(e) = counter.refresh().await {
                                warn!(error = %e, "totalMinted() read failed");
                            }
                        }
                        None => break,
                    },
                }
            }
            info!("Mint counter stopped");
        });

        MintCounterTask { cancel, task }
    }
}
