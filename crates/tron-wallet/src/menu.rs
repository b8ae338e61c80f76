//! Menu table and choice resolution.
//!
//! Which entries are offered depends only on the [`SessionState`]; an entry that needs a
//! loaded wallet is neither shown nor accepted without one.

use crate::session::SessionState;

pub const EXIT_KEY: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateWallet,
    LoadWallet,
    ValidateAddress,
    TransferTrx,
    TransferUsdt,
    ShowFaucet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuOption {
    pub key: &'static str,
    pub label: &'static str,
    pub action: Action,
    pub requires_wallet: bool,
    /// Hold the action's output on screen briefly before the next redraw.
    pub needs_pause: bool,
}

impl MenuOption {
    pub const fn available_in(&self, state: SessionState) -> bool {
        !self.requires_wallet || matches!(state, SessionState::WalletLoaded)
    }
}

const fn option(
    key: &'static str,
    label: &'static str,
    action: Action,
    requires_wallet: bool,
) -> MenuOption {
    MenuOption {
        key,
        label,
        action,
        requires_wallet,
        needs_pause: true,
    }
}

pub const MENU: [MenuOption; 6] = [
    option("1", "Create New Wallet", Action::CreateWallet, false),
    option("2", "Load Wallet", Action::LoadWallet, false),
    option("3", "Validate Address", Action::ValidateAddress, false),
    option("4", "Transfer TRX", Action::TransferTrx, true),
    option("5", "Transfer USDT", Action::TransferUsdt, true),
    option("6", "Show Faucet URL", Action::ShowFaucet, true),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Exit,
    Run(&'static MenuOption),
    /// A real entry that needs a wallet while none is loaded.
    NeedsWallet(&'static MenuOption),
    Invalid,
}

pub fn visible_options(state: SessionState) -> impl Iterator<Item = &'static MenuOption> {
    MENU.iter().filter(move |o| o.available_in(state))
}

pub fn resolve(input: &str, state: SessionState) -> Choice {
    let key = input.trim();
    if key == EXIT_KEY {
        return Choice::Exit;
    }
    match MENU.iter().find(|o| o.key == key) {
        Some(o) if o.available_in(state) => Choice::Run(o),
        Some(o) => Choice::NeedsWallet(o),
        None => Choice::Invalid,
    }
}

pub fn render(state: SessionState) -> String {
    let mut lines = vec!["Menu:".to_owned()];
    lines.extend(visible_options(state).map(|o| format!("  {}. {}", o.key, o.label)));
    lines.push(format!("  {EXIT_KEY}. Exit"));
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn invalid_choice_message(state: SessionState) -> String {
    let keys: Vec<&str> = visible_options(state).map(|o| o.key).collect();
    format!("Invalid choice, please enter {EXIT_KEY} or {}", keys.join(", "))
}
