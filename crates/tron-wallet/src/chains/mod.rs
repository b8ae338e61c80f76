pub mod tron;
pub mod tron_keys;

use crate::{config::Network, wallet::WalletRecord};
use rust_decimal::Decimal;

/// Fresh key material, hex-encoded, plus its base58check address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAccount {
    pub address: String,
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything the wallet needs from the chain. The network is always an explicit argument
/// (for transfers it comes from the wallet record).
pub trait ChainGateway {
    fn create_account(&self) -> eyre::Result<GeneratedAccount>;

    fn is_valid_address(&self, address: &str) -> bool;

    /// TRX balance as a decimal string.
    async fn trx_balance(&self, network: Network, address: &str) -> eyre::Result<String>;

    /// USDT balance as a decimal string.
    async fn usdt_balance(&self, network: Network, address: &str) -> eyre::Result<String>;

    async fn usdt_contract_metadata(
        &self,
        network: Network,
        owner: &str,
    ) -> eyre::Result<ContractMetadata>;

    /// Returns the transaction id.
    async fn send_trx(&self, wallet: &WalletRecord, to: &str, amount: Decimal)
        -> eyre::Result<String>;

    /// Returns the transaction id.
    async fn send_usdt(
        &self,
        wallet: &WalletRecord,
        to: &str,
        amount: Decimal,
    ) -> eyre::Result<String>;
}
