//! Error types for the viewer.

use std::fmt;

/// Viewer error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No wallet provider attached.
    NoWalletProvider,
    /// Wallet attached but no account connected.
    NoAccount,
    /// Wallet is connected to an unexpected chain.
    WrongNetwork { expected: u64, actual: u64 },
    /// Contract read rejected by the node (revert, unknown method, bad return data).
    Contract(String),
    /// Every gateway candidate failed for a storage reference.
    AllGatewaysFailed(String),
    /// Plain HTTP fetch failure (status, timeout, body).
    Http(String),
    /// RPC transport failure on both endpoints.
    Rpc(String),
    /// Configuration error.
    Config(String),
    /// A view request is already running.
    ViewInProgress,
    /// Mint transaction was rejected or could not be sent.
    MintFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoWalletProvider => write!(f, "No wallet provider."),
            Error::NoAccount => write!(f, "Connect your wallet first."),
            Error::WrongNetwork { expected, .. } => {
                write!(f, "Switch wallet to the expected network (chainId {expected}).")
            }
            Error::Contract(msg) => write!(f, "contract read failed: {msg}"),
            Error::AllGatewaysFailed(reference) => {
                write!(f, "All IPFS gateways failed for {reference}")
            }
            Error::Http(msg) => write!(f, "http error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::ViewInProgress => write!(f, "NFTs are already loading."),
            Error::MintFailed(_) => write!(f, "Something went wrong. Try again later."),
        }
    }
}

impl std::error::Error for Error {}
