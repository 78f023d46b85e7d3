//! NFT Viewer binary.

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use nft_viewer::metrics::METRICS;
use nft_viewer::{
    CollectionDescriptor, Config, Gateway, MetadataFetcher, MintCounter, Minter, NftViewer,
    OwnershipResolver, RpcClient, RpcCollection, RpcTransferFeed, RpcWallet, WalletProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about = "Mint and holder gallery for an ERC-721 collection")]
struct Cli {
    /// Act as this account instead of asking the node for one
    #[arg(long, global = true)]
    account: Option<Address>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the NFTs held by the connected account (or `--owner`)
    View {
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Mint `amount` tokens (clamped to the per-transaction maximum)
    Mint {
        #[arg(short, long, default_value_t = 1)]
        amount: u64,
    },
    /// Print the minted count; `--watch` follows transfers until Ctrl+C
    Minted {
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let descriptor = CollectionDescriptor::from_file(&config.descriptor_path)?;
    info!(
        contract = %descriptor.contract_address,
        chain = descriptor.network.id,
        rpc = %config.rpc_url,
        "Configuration loaded"
    );

    let rpc = Arc::new(RpcClient::new(&config.rpc_url, &config.fallback_rpc_url)?);
    let collection = RpcCollection::new(Arc::clone(&rpc), descriptor.contract_address);
    let wallet: Arc<dyn WalletProvider> = match cli.account.or(config.account) {
        Some(account) => Arc::new(RpcWallet::with_account(Arc::clone(&rpc), account)),
        None => Arc::new(RpcWallet::new(Arc::clone(&rpc))),
    };

    match cli.command {
        Commands::View { owner } => {
            let gateway = Gateway::new(config.ipfs_gateways.clone(), config.fetch_timeout())?;
            let viewer = NftViewer::new(
                Arc::new(collection),
                Some(wallet),
                OwnershipResolver::new(config.scan_concurrency)
                    .with_max_scan_tokens(config.max_scan_tokens),
                MetadataFetcher::new(gateway, config.default_collection_name.clone())
                    .with_concurrency(config.metadata_concurrency),
                descriptor.network.id,
            );
            let result = match owner {
                Some(owner) => viewer.view_owner(owner).await,
                None => viewer.view_my_nfts().await,
            };
            println!("{}", serde_json::to_string_pretty(&viewer.state())?);
            result?;
        }
        Commands::Mint { amount } => {
            let counter = Arc::new(MintCounter::new(Arc::new(collection)));
            let minter = Minter::new(wallet, &descriptor, config.max_mint_per_tx)
                .with_counter(Arc::clone(&counter))
                .with_receipt_polling(config.receipt_poll_interval(), config.receipt_max_polls);
            let receipt = minter.mint(amount).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            info!(minted = counter.current(), max_supply = descriptor.max_supply, "Minted count");
        }
        Commands::Minted { watch } => {
            let counter = Arc::new(MintCounter::new(Arc::new(collection.clone())));
            if !watch {
                println!("{} / {}", counter.refresh().await?, descriptor.max_supply);
            } else {
                watch_minted(counter, collection, &config, descriptor.max_supply).await;
            }
        }
    }

    debug!(metrics = %METRICS.render(), "Final metrics");
    Ok(())
}

async fn watch_minted(
    counter: Arc<MintCounter>,
    collection: RpcCollection,
    config: &Config,
    max_supply: u64,
) {
    let cancel = CancellationToken::new();
    let feed = Arc::new(RpcTransferFeed::new(collection, config.feed_poll_interval()));
    let mut rx = counter.subscribe();
    let task = counter.start(feed, cancel.clone());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let minted = *rx.borrow_and_update();
                println!("{minted} / {max_supply}");
            }
            _ = &mut shutdown => break,
        }
    }

    task.stop().await;
    info!("Stopped watching minted count");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received SIGINT, shutting down...");
}
