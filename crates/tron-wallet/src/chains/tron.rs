use super::{tron_keys, ChainGateway, ContractMetadata, GeneratedAccount};
use crate::{
    amount::{format_base_units, to_base_units, TRX_DECIMALS, USDT_DECIMALS},
    config::{Network, NetworkTable, Settings},
    errors::WalletError,
    retry::{retry_with_backoff, BackoffConfig},
    wallet::WalletRecord,
};
use alloy::{
    primitives::U256,
    sol,
    sol_types::{SolCall, SolValue as _},
};
use eyre::Context as _;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use sha2::{Digest as _, Sha256};
use std::time::Duration;

/// Upper bound on TRX burnt for energy by a TRC-20 transfer (100 TRX).
const TRC20_FEE_LIMIT_SUN: u64 = 100_000_000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

sol! {
    interface ITrc20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 value) returns (bool);
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AccountResp {
    #[serde(default)]
    balance: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CallResult {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConstantCallResp {
    #[serde(default)]
    constant_result: Vec<String>,
    #[serde(default)]
    result: CallResult,
}

#[derive(Debug, Clone, Deserialize)]
struct TriggerResp {
    #[serde(default)]
    result: CallResult,
    #[serde(default)]
    transaction: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct BroadcastResp {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// TronGrid sends error messages hex-encoded; fall back to the raw text if they are not.
fn decode_node_message(message: &str) -> String {
    hex::decode(message.trim())
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .unwrap_or_else(|| message.to_owned())
}

fn call_failure(result: &CallResult, what: &str) -> eyre::Report {
    let code = result.code.as_deref().unwrap_or("UNKNOWN");
    let msg = result
        .message
        .as_deref()
        .map(decode_node_message)
        .unwrap_or_default();
    WalletError::Gateway(format!("{what} failed: {code} {msg}")).into()
}

/// ABI-encoded call arguments without the 4-byte selector, as TronGrid expects them.
fn abi_parameter<C: SolCall>(call: &C) -> String {
    let encoded = call.abi_encode();
    hex::encode(encoded.get(4..).unwrap_or_default())
}

/// Check that `txID` is the SHA-256 of `raw_data_hex` and return the 32-byte id.
///
/// Signing the id of a transaction whose body we have not hashed ourselves would let a
/// misbehaving node get an arbitrary payload signed.
fn verified_txid(tx: &Value) -> eyre::Result<[u8; 32]> {
    if let Some(err) = tx.get("Error").and_then(Value::as_str) {
        return Err(WalletError::Gateway(format!("node rejected transaction: {err}")).into());
    }
    let txid_hex = tx
        .get("txID")
        .and_then(Value::as_str)
        .ok_or_else(|| eyre::eyre!("transaction missing txID"))?;
    let raw_hex = tx
        .get("raw_data_hex")
        .and_then(Value::as_str)
        .ok_or_else(|| eyre::eyre!("transaction missing raw_data_hex"))?;
    let raw = hex::decode(raw_hex).context("decode raw_data_hex")?;
    let digest: [u8; 32] = Sha256::digest(&raw).into();
    let txid = hex::decode(txid_hex).context("decode txID")?;
    if txid.as_slice() != digest.as_slice() {
        eyre::bail!("txID does not match raw_data_hex; refusing to sign");
    }
    Ok(digest)
}

/// `createtransaction` body. The recipient is sent in base58 whatever form the user typed,
/// since `visible: true` makes the node parse every address as base58.
fn trx_transfer_body(owner: &str, to: &str, amount_sun: u64) -> eyre::Result<Value> {
    let to = tron_keys::encode_base58(&tron_keys::decode_address(to)?);
    Ok(json!({
        "owner_address": owner,
        "to_address": to,
        "amount": amount_sun,
        "visible": true,
    }))
}

#[derive(Debug, Clone)]
pub struct TronGrid {
    networks: NetworkTable,
    api_key: Option<String>,
    http: Client,
    read_backoff: BackoffConfig,
}

impl TronGrid {
    pub fn new(settings: &Settings) -> eyre::Result<Self> {
        let http = Client::builder()
            .timeout(settings.http_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self {
            networks: settings.networks.clone(),
            api_key: settings.trongrid_api_key.clone(),
            http,
            read_backoff: BackoffConfig::with_rounds(settings.read_retry_rounds),
        })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        network: Network,
        path: &str,
        body: &Value,
    ) -> eyre::Result<T> {
        let url = format!("{}{path}", self.networks.profile(network).endpoint);
        tracing::debug!(%network, path, "tron rpc");
        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.header("TRON-PRO-API-KEY", key);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            eyre::bail!("tron upstream returned http {status} for {path}: {text}");
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decode {path} response"))
    }

    /// Idempotent query, retried with backoff.
    async fn post_read<T: DeserializeOwned>(
        &self,
        network: Network,
        path: &str,
        body: &Value,
        label: &'static str,
    ) -> eyre::Result<T> {
        retry_with_backoff(
            &self.read_backoff,
            move || self.post_json(network, path, body),
            label,
        )
        .await
    }

    async fn constant_call<C: SolCall>(
        &self,
        network: Network,
        owner: &str,
        contract: &str,
        call: &C,
        label: &'static str,
    ) -> eyre::Result<Vec<u8>> {
        let body = json!({
            "owner_address": owner,
            "contract_address": contract,
            "function_selector": C::SIGNATURE,
            "parameter": abi_parameter(call),
            "visible": true,
        });
        let resp: ConstantCallResp = self
            .post_read(network, "/wallet/triggerconstantcontract", &body, label)
            .await?;
        if !resp.result.result {
            return Err(call_failure(&resp.result, C::SIGNATURE));
        }
        let first = resp
            .constant_result
            .first()
            .ok_or_else(|| eyre::eyre!("{} returned no result", C::SIGNATURE))?;
        hex::decode(first).with_context(|| format!("decode {} result", C::SIGNATURE))
    }

    /// Sign `tx` with the wallet key and broadcast it. Never retried.
    async fn sign_and_broadcast(
        &self,
        network: Network,
        wallet: &WalletRecord,
        mut tx: Value,
    ) -> eyre::Result<String> {
        let txid = verified_txid(&tx)?;
        let key = tron_keys::signing_key_from_hex(&wallet.private_key)?;
        let signature = tron_keys::sign_txid(&key, &txid)?;
        let obj = tx
            .as_object_mut()
            .ok_or_else(|| eyre::eyre!("transaction is not a JSON object"))?;
        obj.insert("signature".to_owned(), json!([hex::encode(signature)]));

        let resp: BroadcastResp = self
            .post_json(network, "/wallet/broadcasttransaction", &tx)
            .await?;
        if !resp.result {
            let code = resp.code.as_deref().unwrap_or("UNKNOWN");
            let msg = resp
                .message
                .as_deref()
                .map(decode_node_message)
                .unwrap_or_default();
            return Err(WalletError::Gateway(format!("broadcast failed: {code} {msg}")).into());
        }
        let txid_hex = resp.txid.unwrap_or_else(|| hex::encode(txid));
        tracing::info!(%network, txid = %txid_hex, "transaction broadcast");
        Ok(txid_hex)
    }

    fn ensure_key_matches(wallet: &WalletRecord) -> eyre::Result<()> {
        let derived = tron_keys::account_from_private_key_hex(&wallet.private_key)?;
        if derived.address != wallet.address {
            eyre::bail!("wallet private key does not match its address");
        }
        Ok(())
    }
}

impl ChainGateway for TronGrid {
    fn create_account(&self) -> eyre::Result<GeneratedAccount> {
        tron_keys::generate_account()
    }

    fn is_valid_address(&self, address: &str) -> bool {
        tron_keys::is_valid_address(address)
    }

    async fn trx_balance(&self, network: Network, address: &str) -> eyre::Result<String> {
        let body = json!({ "address": address, "visible": true });
        let resp: AccountResp = self
            .post_read(network, "/wallet/getaccount", &body, "query TRX balance")
            .await?;
        format_base_units(u128::from(resp.balance), TRX_DECIMALS)
    }

    async fn usdt_balance(&self, network: Network, address: &str) -> eyre::Result<String> {
        let contract = self.networks.usdt_contract(network)?;
        let call = ITrc20::balanceOfCall {
            account: tron_keys::evm_address(address)?,
        };
        let out = self
            .constant_call(network, address, contract, &call, "query USDT balance")
            .await?;
        let raw = U256::abi_decode(&out).context("decode balanceOf result")?;
        let base = u128::try_from(raw).map_err(|e| eyre::eyre!("USDT balance out of range: {e:?}"))?;
        format_base_units(base, USDT_DECIMALS)
    }

    async fn usdt_contract_metadata(
        &self,
        network: Network,
        owner: &str,
    ) -> eyre::Result<ContractMetadata> {
        let contract = self.networks.usdt_contract(network)?;
        let name = self
            .constant_call(network, owner, contract, &ITrc20::nameCall {}, "query token name")
            .await?;
        let symbol = self
            .constant_call(network, owner, contract, &ITrc20::symbolCall {}, "query token symbol")
            .await?;
        let decimals = self
            .constant_call(
                network,
                owner,
                contract,
                &ITrc20::decimalsCall {},
                "query token decimals",
            )
            .await?;
        let decimals = U256::abi_decode(&decimals).context("decode decimals")?;
        Ok(ContractMetadata {
            name: String::abi_decode(&name).context("decode name")?,
            symbol: String::abi_decode(&symbol).context("decode symbol")?,
            decimals: u8::try_from(decimals).map_err(|e| eyre::eyre!("decimals out of range: {e:?}"))?,
        })
    }

    async fn send_trx(
        &self,
        wallet: &WalletRecord,
        to: &str,
        amount: Decimal,
    ) -> eyre::Result<String> {
        let amount_sun = to_base_units(amount, TRX_DECIMALS)?;
        Self::ensure_key_matches(wallet)?;
        let body = trx_transfer_body(&wallet.address, to, amount_sun)?;
        let tx: Value = self
            .post_json(wallet.network, "/wallet/createtransaction", &body)
            .await?;
        self.sign_and_broadcast(wallet.network, wallet, tx).await
    }

    async fn send_usdt(
        &self,
        wallet: &WalletRecord,
        to: &str,
        amount: Decimal,
    ) -> eyre::Result<String> {
        let contract = self.networks.usdt_contract(wallet.network)?;
        let amount_base = to_base_units(amount, USDT_DECIMALS)?;
        Self::ensure_key_matches(wallet)?;
        let call = ITrc20::transferCall {
            to: tron_keys::evm_address(to)?,
            value: U256::from(amount_base),
        };
        let body = json!({
            "owner_address": wallet.address,
            "contract_address": contract,
            "function_selector": ITrc20::transferCall::SIGNATURE,
            "parameter": abi_parameter(&call),
            "fee_limit": TRC20_FEE_LIMIT_SUN,
            "call_value": 0,
            "visible": true,
        });
        let resp: TriggerResp = self
            .post_json(wallet.network, "/wallet/triggersmartcontract", &body)
            .await?;
        if !resp.result.result {
            return Err(call_failure(&resp.result, "transfer(address,uint256)"));
        }
        let tx = resp
            .transaction
            .ok_or_else(|| eyre::eyre!("triggersmartcontract returned no transaction"))?;
        self.sign_and_broadcast(wallet.network, wallet, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    fn offline_settings() -> Settings {
        let mut s = Settings::from_lookup(|k| match k {
            "MAINNET_RPC_URL" | "SHASTA_RPC_URL" | "NILE_RPC_URL" => {
                Some("http://127.0.0.1:9".to_owned())
            }
            _ => None,
        })
        .unwrap_or_default();
        s.read_retry_rounds = 1;
        s.http_timeout = Duration::from_secs(2);
        s
    }

    fn wallet_on(network: Network) -> eyre::Result<WalletRecord> {
        let acct = tron_keys::generate_account()?;
        Ok(WalletRecord {
            address: acct.address,
            private_key: acct.private_key,
            public_key: acct.public_key,
            network,
            created_at: String::new(),
            last_updated: String::new(),
        })
    }

    #[test]
    fn transfer_parameter_encodes_recipient_and_amount() -> eyre::Result<()> {
        let to = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
        let call = ITrc20::transferCall {
            to: tron_keys::evm_address(to)?,
            value: U256::from(1_500_000_u64),
        };
        let p = abi_parameter(&call);
        assert_eq!(p.len(), 128);
        let raw = tron_keys::decode_address(to)?;
        let addr_hex = hex::encode(raw.get(1..).unwrap_or_default());
        assert_eq!(p.get(..64), Some(format!("{addr_hex:0>64}").as_str()));
        assert_eq!(p.get(64..), Some(format!("{:064x}", 1_500_000_u64).as_str()));
        assert_eq!(ITrc20::transferCall::SIGNATURE, "transfer(address,uint256)");
        Ok(())
    }

    #[test]
    fn hex_recipient_is_sent_as_base58() -> eyre::Result<()> {
        let hex_form = hex::encode(tron_keys::decode_address(KNOWN)?);
        assert!(tron_keys::is_valid_address(&hex_form));

        let body = trx_transfer_body("TOwner", &hex_form, 1_000_000)?;
        assert_eq!(body.get("to_address").and_then(Value::as_str), Some(KNOWN));
        assert_eq!(body.get("amount").and_then(Value::as_u64), Some(1_000_000));
        assert_eq!(body.get("visible").and_then(Value::as_bool), Some(true));

        let body = trx_transfer_body("TOwner", KNOWN, 5)?;
        assert_eq!(body.get("to_address").and_then(Value::as_str), Some(KNOWN));
        assert!(trx_transfer_body("TOwner", "41zz", 5).is_err());
        Ok(())
    }

    #[test]
    fn txid_must_match_raw_data() {
        let raw = hex::encode(b"raw transaction bytes");
        let good_id = hex::encode(Sha256::digest(b"raw transaction bytes"));
        let good = json!({ "txID": good_id, "raw_data_hex": raw });
        assert!(verified_txid(&good).is_ok());

        let bad = json!({ "txID": "00".repeat(32), "raw_data_hex": raw });
        assert!(verified_txid(&bad).is_err());

        let rejected = json!({ "Error": "account does not exist" });
        let err = verified_txid(&rejected);
        assert!(
            matches!(&err, Err(e) if e.to_string().contains("account does not exist")),
            "got {err:?}"
        );
    }

    #[test]
    fn node_messages_are_hex_decoded() {
        assert_eq!(decode_node_message(&hex::encode("balance is not sufficient")), "balance is not sufficient");
        assert_eq!(decode_node_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn unconfigured_usdt_fails_before_any_request() -> eyre::Result<()> {
        let gw = TronGrid::new(&offline_settings())?;
        let wallet = wallet_on(Network::Nile)?;
        let err = gw
            .send_usdt(&wallet, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", Decimal::ONE)
            .await;
        let typed = err.as_ref().err().and_then(|e| e.downcast_ref::<WalletError>());
        assert!(
            matches!(typed, Some(WalletError::Configuration { network: Network::Nile, .. })),
            "got {err:?}"
        );

        let err = gw.usdt_balance(Network::Nile, &wallet.address).await;
        assert!(err.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn too_precise_amount_is_rejected_locally() -> eyre::Result<()> {
        let gw = TronGrid::new(&offline_settings())?;
        let wallet = wallet_on(Network::Shasta)?;
        let err = gw
            .send_trx(&wallet, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", Decimal::new(1, 7))
            .await;
        let typed = err.as_ref().err().and_then(|e| e.downcast_ref::<WalletError>());
        assert!(matches!(typed, Some(WalletError::Validation(_))), "got {err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_key_is_never_signed() -> eyre::Result<()> {
        let gw = TronGrid::new(&offline_settings())?;
        let mut wallet = wallet_on(Network::Shasta)?;
        wallet.address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_owned();
        let err = gw
            .send_trx(&wallet, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", Decimal::ONE)
            .await;
        assert!(
            matches!(&err, Err(e) if e.to_string().contains("does not match")),
            "got {err:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_node_surfaces_an_error() -> eyre::Result<()> {
        let gw = TronGrid::new(&offline_settings())?;
        let r = gw
            .trx_balance(Network::Shasta, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t")
            .await;
        assert!(r.is_err(), "expected connection failure, got {r:?}");
        Ok(())
    }
}
