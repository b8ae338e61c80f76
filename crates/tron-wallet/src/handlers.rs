//! Menu actions and the wallet info panel.
//!
//! Every action takes the current [`Session`] by reference and returns the session the shell
//! should continue with. Failures are reported and logged here; only
//! [`WalletError::InputClosed`] escapes, since no further input can arrive after it.

use crate::{
    amount::{parse_positive_amount, to_base_units, TRX_DECIMALS, USDT_DECIMALS},
    chains::ChainGateway,
    config::{Network, NetworkTable},
    console::Console,
    errors::{error_code, is_input_closed, WalletError},
    menu::Action,
    session::Session,
    wallet::{WalletRecord, WalletStore},
};
use std::io::{BufRead, Write};

/// What the actions operate on.
pub struct App<G> {
    pub store: WalletStore,
    pub gateway: G,
    pub networks: NetworkTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Currency {
    Trx,
    Usdt,
}

impl Currency {
    const fn label(self) -> &'static str {
        match self {
            Self::Trx => "TRX",
            Self::Usdt => "USDT",
        }
    }

    const fn decimals(self) -> u32 {
        match self {
            Self::Trx => TRX_DECIMALS,
            Self::Usdt => USDT_DECIMALS,
        }
    }
}

const fn failure_prefix(action: Action) -> &'static str {
    match action {
        Action::CreateWallet => "Failed to create wallet",
        Action::LoadWallet => "Failed to load wallet",
        Action::TransferTrx | Action::TransferUsdt => "Transfer failed",
        Action::ValidateAddress | Action::ShowFaucet => "Action failed",
    }
}

const fn fallback_code(action: Action) -> &'static str {
    match action {
        Action::CreateWallet | Action::LoadWallet | Action::ShowFaucet => "io",
        Action::ValidateAddress | Action::TransferTrx | Action::TransferUsdt => "gateway",
    }
}

/// Run one menu action. On failure the given session is returned unchanged.
pub async fn run_action<R, W, G>(
    action: Action,
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    let result = match action {
        Action::CreateWallet => create_wallet(session, app, con).await,
        Action::LoadWallet => load_wallet(session, app, con),
        Action::ValidateAddress => validate_address(session, app, con),
        Action::TransferTrx => transfer(Currency::Trx, session, app, con).await,
        Action::TransferUsdt => transfer(Currency::Usdt, session, app, con).await,
        Action::ShowFaucet => show_faucet(session, app, con),
    };
    match result {
        Ok(next) => Ok(next),
        Err(e) if is_input_closed(&e) => Err(e),
        Err(e) => {
            tracing::warn!(
                ?action,
                code = error_code(&e, fallback_code(action)),
                error = %format!("{e:#}"),
                "action failed"
            );
            con.say(&format!("{}: {e:#}", failure_prefix(action)))?;
            Ok(session.clone())
        }
    }
}

fn header<R: BufRead, W: Write>(con: &mut Console<R, W>, title: &str) -> eyre::Result<()> {
    con.blank()?;
    con.say(&format!("Action: {title}"))?;
    con.blank()
}

pub fn select_network<R: BufRead, W: Write>(con: &mut Console<R, W>) -> eyre::Result<Network> {
    con.say("Select Network:")?;
    con.say("  1. Mainnet (Production)")?;
    con.say("  2. Shasta (Testnet)")?;
    con.say("  3. Nile (Testnet)")?;
    con.blank()?;
    loop {
        match con.ask("Select network (enter number): ")?.as_str() {
            "1" => return Ok(Network::Mainnet),
            "2" => return Ok(Network::Shasta),
            "3" => return Ok(Network::Nile),
            _ => con.say("Invalid choice, please enter 1-3")?,
        }
    }
}

async fn create_wallet<R, W, G>(
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    header(con, "Create New Wallet")?;
    let network = select_network(con)?;
    con.blank()?;
    let name = con.ask("Enter wallet name: ")?;
    if name.is_empty() {
        con.say("Wallet name cannot be empty")?;
        return Ok(session.clone());
    }

    let (wallet, filename) = app.store.create(&app.gateway, network, &name)?;

    con.say("New wallet created and loaded")?;
    con.say("WARNING: Keep your private key safe, it cannot be recovered if lost!")?;
    con.blank()?;
    con.say(&format!("Address: {}", wallet.address))?;
    con.say(&format!("Network: {}", wallet.network))?;
    con.say(&format!("Created: {}", wallet.created_at))?;
    Ok(Session::with_wallet(wallet, filename))
}

fn load_wallet<R, W, G>(
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
{
    header(con, "Load Wallet")?;
    if let Some(current) = session.wallet() {
        con.say("Current wallet is loaded:")?;
        con.say(&format!("  Address: {}", current.address))?;
        con.say(&format!("  Network: {}", current.network))?;
        con.blank()?;
    }

    let wallets = app.store.list()?;
    if wallets.is_empty() {
        con.say("No wallets found in the wallets directory")?;
        return Ok(session.clone());
    }

    con.say("Available wallets:")?;
    for (i, file) in wallets.iter().enumerate() {
        con.say(&format!("  {}. {file}", i + 1))?;
    }
    con.blank()?;

    let choice = con.ask("Select wallet to load (enter number or 0 to cancel): ")?;
    let picked = match choice.parse::<usize>() {
        Ok(0) => {
            con.say("Cancelled")?;
            return Ok(session.clone());
        }
        Ok(n) => wallets.get(n - 1),
        Err(_) => None,
    };
    let Some(filename) = picked else {
        con.say("Invalid choice")?;
        return Ok(session.clone());
    };

    let wallet = app
        .store
        .load(filename)?
        .ok_or_else(|| WalletError::NotFound(filename.clone()))?;
    tracing::info!(file = %filename, address = %wallet.address, network = %wallet.network, "wallet loaded");

    con.say("Wallet loaded successfully")?;
    con.say(&format!("Address: {}", wallet.address))?;
    con.say(&format!("Network: {}", wallet.network))?;
    Ok(Session::with_wallet(wallet, filename.clone()))
}

fn validate_address<R, W, G>(
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    header(con, "Validate Address")?;
    let address = con.ask("Enter address to validate: ")?;
    if app.gateway.is_valid_address(&address) {
        con.say(&format!("{address} is a valid TRON address"))?;
    } else {
        con.say(&format!("{address} is not a valid TRON address"))?;
    }
    Ok(session.clone())
}

struct TransferRequest {
    to: String,
    amount_text: String,
    amount: rust_decimal::Decimal,
}

/// Ask for recipient and amount. `None` means the input was rejected (and reported).
fn read_transfer_input<R, W, G>(
    currency: Currency,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Option<TransferRequest>>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    let to = con.ask("Enter recipient address: ")?;
    if !app.gateway.is_valid_address(&to) {
        con.say("Invalid recipient address")?;
        return Ok(None);
    }

    let amount_text = con.ask(&format!("Enter amount ({}): ", currency.label()))?;
    let checked = parse_positive_amount(&amount_text)
        .and_then(|a| to_base_units(a, currency.decimals()).map(|_| a));
    let amount = match checked {
        Ok(a) => a,
        Err(e) => {
            tracing::debug!(error = %e, "rejected transfer amount");
            con.say("Invalid amount")?;
            return Ok(None);
        }
    };

    Ok(Some(TransferRequest {
        to,
        amount_text,
        amount,
    }))
}

async fn transfer<R, W, G>(
    currency: Currency,
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    header(con, &format!("Transfer {}", currency.label()))?;
    let Some(wallet) = session.wallet() else {
        con.say("Please load a wallet first")?;
        return Ok(session.clone());
    };

    let Some(req) = read_transfer_input(currency, app, con)? else {
        return Ok(session.clone());
    };

    con.blank()?;
    let confirm = con.ask_raw(&format!(
        "Transfer {} {} to {}? (y/N): ",
        req.amount_text,
        currency.label(),
        req.to
    ))?;
    if confirm.to_ascii_lowercase() != "y" {
        con.say("Cancelled")?;
        return Ok(session.clone());
    }

    let txid = match currency {
        Currency::Trx => app.gateway.send_trx(wallet, &req.to, req.amount).await?,
        Currency::Usdt => app.gateway.send_usdt(wallet, &req.to, req.amount).await?,
    };
    tracing::info!(
        currency = currency.label(),
        network = %wallet.network,
        to = %req.to,
        amount = %req.amount,
        txid = %txid,
        "transfer submitted"
    );

    print_transfer_result(currency, &req, wallet, &txid, app, con)?;
    Ok(session.clone())
}

fn print_transfer_result<R, W, G>(
    currency: Currency,
    req: &TransferRequest,
    wallet: &WalletRecord,
    txid: &str,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<()>
where
    R: BufRead,
    W: Write,
{
    con.blank()?;
    con.say("Transfer successful")?;
    con.say(&format!("Currency: {}", currency.label()))?;
    con.say(&format!("Amount: {}", req.amount_text))?;
    con.say(&format!("To: {}", req.to))?;
    con.say(&format!("Network: {}", wallet.network))?;
    con.say(&format!("Transaction ID: {txid}"))?;
    let url = app.networks.profile(wallet.network).transaction_url(txid);
    con.say(&format!("Explorer: {url}"))
}

fn show_faucet<R, W, G>(
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<Session>
where
    R: BufRead,
    W: Write,
{
    header(con, "Show Faucet URL")?;
    let Some(wallet) = session.wallet() else {
        con.say("Please load a wallet first")?;
        return Ok(session.clone());
    };
    match &app.networks.profile(wallet.network).faucet_url {
        Some(url) => {
            con.say(&format!("Faucet URL: {url}"))?;
            con.say("Instructions: Copy your address to the faucet website to claim test TRX")?;
        }
        None => con.say("No faucet on mainnet, you need to purchase real TRX")?,
    }
    Ok(session.clone())
}

/// Wallet panel shown above the menu. Balance and contract lookups that fail are shown as
/// warnings; the rest of the panel still renders.
pub async fn display_info<R, W, G>(
    session: &Session,
    app: &App<G>,
    con: &mut Console<R, W>,
) -> eyre::Result<()>
where
    R: BufRead,
    W: Write,
    G: ChainGateway,
{
    let Some(active) = session.active() else {
        con.say("No wallet loaded")?;
        return con.blank();
    };
    let wallet = &active.wallet;
    let network = wallet.network;
    let profile = app.networks.profile(network);

    con.say("Wallet")?;
    con.say(&format!("  File: {}", active.filename))?;
    con.say(&format!("  Address: {}", wallet.address))?;
    con.say(&format!("  Network: {network}"))?;
    con.say(&format!("  Created: {}", wallet.created_at))?;
    con.say(&format!("  Explorer: {}", profile.address_url(&wallet.address)))?;

    let (trx, usdt) = tokio::join!(
        app.gateway.trx_balance(network, &wallet.address),
        app.gateway.usdt_balance(network, &wallet.address),
    );
    for (label, balance) in [("TRX", trx), ("USDT", usdt)] {
        match balance {
            Ok(v) => con.say(&format!("  {label} Balance: {v}"))?,
            Err(e) => {
                tracing::warn!(%network, currency = label, error = %format!("{e:#}"), "balance query failed");
                con.say(&format!("  ({label} balance unavailable: {e:#})"))?;
            }
        }
    }
    con.blank()?;

    match app
        .gateway
        .usdt_contract_metadata(network, &wallet.address)
        .await
    {
        Ok(meta) => {
            con.say("USDT Contract")?;
            con.say(&format!("  Name: {}", meta.name))?;
            con.say(&format!("  Symbol: {}", meta.symbol))?;
            con.say(&format!("  Decimals: {}", meta.decimals))?;
        }
        Err(e) => {
            tracing::warn!(%network, error = %format!("{e:#}"), "USDT contract check failed");
            con.say(&format!("USDT Contract (Failed to verify: {e:#})"))?;
        }
    }
    con.blank()
}
