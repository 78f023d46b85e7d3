//! Live `Transfer` event feed.
//!
//! The RPC implementation installs a log filter and polls
//! `eth_getFilterChanges`. Dropping the receiver or cancelling the token
//! stops the poller and uninstalls the filter.

use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::contract::{IMintCollection, RpcCollection, RpcLog, TransferLog};

const FEED_CHANNEL_CAPACITY: usize = 64;

/// Push source of collection `Transfer` events.
#[async_trait]
pub trait TransferFeed: Send + Sync {
    /// Start delivering events until `cancel` fires or the receiver is dropped.
    ///
    /// Errors when the transport has no subscription support.
    async fn subscribe(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TransferLog>, crate::Error>;
}

/// Filter-polling feed over [`RpcCollection`].
pub struct RpcTransferFeed {
    collection: RpcCollection,
    poll_interval: Duration,
}

impl RpcTransferFeed {
    pub fn new(collection: RpcCollection, poll_interval: Duration) -> Self {
        Self {
            collection,
            poll_interval,
        }
    }
}

#[async_trait]
impl TransferFeed for RpcTransferFeed {
    async fn subscribe(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TransferLog>, crate::Error> {
        let rpc = self.collection.rpc().clone();
        let filter_id: String = rpc
            .request(
                "eth_newFilter",
                json!([{
                    "address": self.collection.address(),
                    "fromBlock": "latest",
                    "topics": [IMintCollection::Transfer::SIGNATURE_HASH],
                }]),
            )
            .await?;

        info!(filter = %filter_id, "Transfer filter installed");

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let interval = self.poll_interval;
        tokio::spawn(async move {
            'poll: loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {},
                    _ = cancel.cancelled() => break 'poll,
                    _ = tx.closed() => break 'poll,
                }

                let logs: Vec<RpcLog> = match rpc
                    .request("eth_getFilterChanges", json!([filter_id]))
                    .await
                {
                    Ok(logs) => logs,
                    Err(crate::Error::Contract(e)) => {
                        // Node dropped the filter (expired or restarted).
                        warn!(filter = %filter_id, error = %e, "Transfer filter lost");
                        break 'poll;
                    }
                    Err(e) => {
                        warn!(filter = %filter_id, error = %e, "Filter poll failed");
                        continue;
                    }
                };

                for log in logs.iter().filter_map(RpcLog::decode_transfer) {
                    if tx.send(log).await.is_err() {
                        break 'poll;
                    }
                }
            }

            if let Err(e) = rpc
                .request::<bool>("eth_uninstallFilter", json!([filter_id]))
                .await
            {
                debug!(filter = %filter_id, error = %e, "Filter uninstall failed");
            }
            info!(filter = %filter_id, "Transfer feed stopped");
        });

        Ok(rx)
    }
}
