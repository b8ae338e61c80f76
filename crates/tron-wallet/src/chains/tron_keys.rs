//! TRON key material and address codec.
//!
//! An address is `0x41 || keccak256(uncompressed_pubkey[1..])[12..]`, shown to users as
//! base58check (34 chars, leading `T`) and to some RPC endpoints as 42-char hex.

use super::GeneratedAccount;
use alloy::primitives::keccak256;
use eyre::Context as _;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint as _;
use rand::Rng as _;
use zeroize::Zeroizing;

pub const ADDRESS_PREFIX: u8 = 0x41;
const BASE58_ADDRESS_LEN: usize = 34;
const HEX_ADDRESS_LEN: usize = 42;

/// Generate a random secp256k1 key and derive its TRON address.
pub fn generate_account() -> eyre::Result<GeneratedAccount> {
    let signing_key = loop {
        let mut secret = Zeroizing::new([0_u8; 32]);
        rand::rng().fill_bytes(secret.as_mut_slice());
        // Retry on the (astronomically unlikely) out-of-range scalar.
        if let Ok(k) = SigningKey::from_slice(secret.as_slice()) {
            break k;
        }
    };
    Ok(account_from_signing_key(&signing_key))
}

pub fn account_from_private_key_hex(private_key: &str) -> eyre::Result<GeneratedAccount> {
    let key = signing_key_from_hex(private_key)?;
    Ok(account_from_signing_key(&key))
}

fn account_from_signing_key(key: &SigningKey) -> GeneratedAccount {
    let secret = Zeroizing::new(key.to_bytes().to_vec());
    let public = k256::PublicKey::from(key.verifying_key()).to_encoded_point(false);
    let address_bytes = address_bytes_from_uncompressed(public.as_bytes());
    GeneratedAccount {
        address: encode_base58(&address_bytes),
        private_key: hex::encode(secret.as_slice()),
        public_key: hex::encode(public.as_bytes()),
    }
}

fn address_bytes_from_uncompressed(public: &[u8]) -> [u8; 21] {
    let body = public.get(1..).unwrap_or_default();
    let hash = keccak256(body);
    let mut out = [0_u8; 21];
    out[0] = ADDRESS_PREFIX;
    out[1..].copy_from_slice(&hash.as_slice()[12..]);
    out
}

pub fn signing_key_from_hex(private_key: &str) -> eyre::Result<SigningKey> {
    let bytes = Zeroizing::new(
        hex::decode(private_key.trim().trim_start_matches("0x")).context("decode private key hex")?,
    );
    SigningKey::from_slice(&bytes).map_err(|e| eyre::eyre!("invalid private key: {e}"))
}

pub fn encode_base58(address: &[u8; 21]) -> String {
    bs58::encode(address).with_check().into_string()
}

/// Decode a base58check or hex address into its 21 raw bytes.
pub fn decode_address(address: &str) -> eyre::Result<[u8; 21]> {
    let a = address.trim();
    let bytes = if a.len() == HEX_ADDRESS_LEN {
        hex::decode(a).context("decode hex address")?
    } else if a.len() == BASE58_ADDRESS_LEN {
        bs58::decode(a)
            .with_check(None)
            .into_vec()
            .context("decode base58check address")?
    } else {
        eyre::bail!("invalid address length: {}", a.len());
    };
    let out: [u8; 21] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| eyre::eyre!("invalid address payload length: {}", b.len()))?;
    if out[0] != ADDRESS_PREFIX {
        eyre::bail!("invalid address prefix: {:#04x}", out[0]);
    }
    Ok(out)
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// The 20-byte account id, as used inside ABI-encoded contract arguments.
pub fn evm_address(address: &str) -> eyre::Result<alloy::primitives::Address> {
    let raw = decode_address(address)?;
    Ok(alloy::primitives::Address::from_slice(&raw[1..]))
}

/// Sign a 32-byte transaction id. Returns the 65-byte `r || s || v` signature (v = 27/28).
pub fn sign_txid(key: &SigningKey, txid: &[u8]) -> eyre::Result<[u8; 65]> {
    if txid.len() != 32 {
        eyre::bail!("transaction id must be 32 bytes, got {}", txid.len());
    }
    let (sig, recid) = key
        .sign_prehash_recoverable(txid)
        .map_err(|e| eyre::eyre!("sign transaction: {e}"))?;
    let mut out = [0_u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recid.to_byte() + 27;
    Ok(out)
}
