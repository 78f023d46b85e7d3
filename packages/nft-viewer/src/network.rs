//! Network guard: nothing is read until the wallet is on the expected chain.

use alloy_primitives::Address;
use tracing::warn;

use crate::wallet::WalletProvider;

/// Fail with `WrongNetwork` unless `actual == expected`.
pub fn ensure_chain(actual: u64, expected: u64) -> Result<(), crate::Error> {
    if actual != expected {
        return Err(crate::Error::WrongNetwork { expected, actual });
    }
    Ok(())
}

/// Read the wallet's chain and check it against `expected_chain`.
pub async fn ensure_network(
    wallet: &dyn WalletProvider,
    expected_chain: u64,
) -> Result<(), crate::Error> {
    let chain = wallet.chain_id().await?;
    if let Err(e) = ensure_chain(chain, expected_chain) {
        warn!(expected = expected_chain, actual = chain, "Wallet on wrong network");
        return Err(e);
    }
    Ok(())
}

/// Check provider, account, and chain. Returns the connected account.
pub async fn ensure_ready(
    wallet: Option<&dyn WalletProvider>,
    expected_chain: u64,
) -> Result<Address, crate::Error> {
    let wallet = wallet.ok_or(crate::Error::NoWalletProvider)?;
    let account = wallet.account().await?.ok_or(crate::Error::NoAccount)?;
    ensure_network(wallet, expected_chain).await?;
    Ok(account)
}
