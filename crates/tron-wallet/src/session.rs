use crate::wallet::WalletRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoWallet,
    WalletLoaded,
}

/// A persisted (or just created) wallet together with the file it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWallet {
    pub wallet: WalletRecord,
    pub filename: String,
}

/// What the shell currently has loaded.
///
/// Sessions are values: an action that loads or creates a wallet hands back a new `Session`,
/// and a failed or cancelled action hands back the one it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    active: Option<ActiveWallet>,
}

impl Session {
    pub const fn empty() -> Self {
        Self { active: None }
    }

    pub fn with_wallet(wallet: WalletRecord, filename: impl Into<String>) -> Self {
        Self {
            active: Some(ActiveWallet {
                wallet,
                filename: filename.into(),
            }),
        }
    }

    pub const fn state(&self) -> SessionState {
        match self.active {
            Some(_) => SessionState::WalletLoaded,
            None => SessionState::NoWallet,
        }
    }

    pub const fn active(&self) -> Option<&ActiveWallet> {
        self.active.as_ref()
    }

    pub fn wallet(&self) -> Option<&WalletRecord> {
        self.active.as_ref().map(|a| &a.wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    fn record(address: &str) -> WalletRecord {
        WalletRecord {
            address: address.to_owned(),
            private_key: "11".repeat(32),
            public_key: format!("04{}", "22".repeat(64)),
            network: Network::Shasta,
            created_at: "2024-01-01T00:00:00.000Z".to_owned(),
            last_updated: "2024-01-01T00:00:00.000Z".to_owned(),
        }
    }

    #[test]
    fn starts_empty() {
        let s = Session::empty();
        assert_eq!(s.state(), SessionState::NoWallet);
        assert!(s.wallet().is_none());
        assert_eq!(s, Session::default());
    }

    #[test]
    fn replacement_is_wholesale() {
        let first = Session::with_wallet(record("TFirst"), "a-shasta.json");
        let second = Session::with_wallet(record("TSecond"), "b-shasta.json");
        assert_eq!(first.state(), SessionState::WalletLoaded);

        let active = second.active();
        assert_eq!(active.map(|a| a.filename.as_str()), Some("b-shasta.json"));
        assert_eq!(active.map(|a| a.wallet.address.as_str()), Some("TSecond"));
        // The earlier value is untouched by building a new one.
        assert_eq!(first.wallet().map(|w| w.address.as_str()), Some("TFirst"));
    }
}
