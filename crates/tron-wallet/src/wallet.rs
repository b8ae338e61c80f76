use crate::{
    chains::ChainGateway,
    config::Network,
    errors::WalletError,
    fsutil,
};
use chrono::{SecondsFormat, Utc};
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

const MAX_BACKUPS: u32 = 10_000;

/// One keypair on one network, as persisted in `<name>-<network>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub address: String,
    pub private_key: String,
    pub public_key: String,
    pub network: Network,
    pub created_at: String,
    pub last_updated: String,
}

impl WalletRecord {
    /// Two records describe the same logical wallet iff their identity fields match.
    pub fn same_identity(&self, other: &Self) -> bool {
        self.address == other.address
            && self.private_key == other.private_key
            && self.public_key == other.public_key
            && self.network == other.network
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `true` for names ending in `.bk` with an optional numeric suffix (`.bk`, `.bk2`, ...).
pub fn is_backup_name(name: &str) -> bool {
    name.rfind(".bk").is_some_and(|i| {
        name.get(i + 3..)
            .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// The n-th backup slot for `path`: `.bk` for n=1, then `.bk2`, `.bk3`, ...
pub fn backup_path(path: &Path, n: u32) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    if n <= 1 {
        s.push(".bk");
    } else {
        s.push(format!(".bk{n}"));
    }
    PathBuf::from(s)
}

pub fn wallet_filename(name: &str, network: Network) -> Result<String, WalletError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WalletError::validation("Wallet name cannot be empty"));
    }
    if name.contains(['/', '\\']) || name.contains("..") || name.starts_with('.') {
        return Err(WalletError::validation(
            "Wallet name must not contain path separators or start with '.'",
        ));
    }
    Ok(format!("{name}-{network}.json"))
}

#[derive(Debug, Clone)]
pub struct WalletStore {
    dir: PathBuf,
}

impl WalletStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Wallet files in the directory, sorted by name. A missing directory is an empty list.
    pub fn list(&self) -> eyre::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(eyre::Report::new(e)
                    .wrap_err(format!("read wallet dir {}", self.dir.display())))
            }
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("read entry in {}", self.dir.display()))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(".json") && !is_backup_name(&name) {
                out.push(name);
            }
        }
        out.sort();
        Ok(out)
    }

    /// `Ok(None)` if the file does not exist; `CorruptWalletFile` if it does not parse.
    pub fn load(&self, filename: &str) -> eyre::Result<Option<WalletRecord>> {
        let path = self.path_for(filename);
        let data = match fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(eyre::Report::new(e).wrap_err(format!("read {}", path.display())))
            }
        };
        let record = serde_json::from_str::<WalletRecord>(&data).map_err(|e| {
            WalletError::CorruptWalletFile {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(record))
    }

    /// Persist `record` at `path`, stamping `lastUpdated`.
    ///
    /// An existing file holding a different wallet (or unparseable content) is first moved to
    /// the lowest free backup slot; an existing file with the same identity is overwritten.
    pub fn save(record: &WalletRecord, path: &Path) -> eyre::Result<WalletRecord> {
        if path.exists() {
            let same = fs::read_to_string(path)
                .ok()
                .and_then(|s| serde_json::from_str::<WalletRecord>(&s).ok())
                .is_some_and(|existing| existing.same_identity(record));
            if !same {
                let backup = Self::backup_existing(path)?;
                tracing::info!(
                    file = %path.display(),
                    backup = %backup.display(),
                    "wallet identity changed; previous file backed up"
                );
            }
        }

        let mut saved = record.clone();
        saved.last_updated = now_iso();
        let s = serde_json::to_string_pretty(&saved).context("serialize wallet")?;
        fsutil::write_private_atomic(path, s.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        tracing::info!(file = %path.display(), address = %saved.address, "wallet saved");
        Ok(saved)
    }

    fn backup_existing(path: &Path) -> eyre::Result<PathBuf> {
        for n in 1..=MAX_BACKUPS {
            let candidate = backup_path(path, n);
            if fsutil::rename_no_clobber(path, &candidate)? {
                return Ok(candidate);
            }
        }
        eyre::bail!("no free backup slot for {}", path.display())
    }

    /// Generate a fresh account on `network` and persist it as `<name>-<network>.json`.
    pub fn create(
        &self,
        gateway: &impl ChainGateway,
        network: Network,
        name: &str,
    ) -> eyre::Result<(WalletRecord, String)> {
        let filename = wallet_filename(name, network)?;
        fsutil::ensure_private_dir(&self.dir)?;

        let account = gateway.create_account()?;
        let now = now_iso();
        let record = WalletRecord {
            address: account.address,
            private_key: account.private_key,
            public_key: account.public_key,
            network,
            created_at: now.clone(),
            last_updated: now,
        };

        let saved = Self::save(&record, &self.path_for(&filename))?;
        tracing::info!(%network, file = %filename, address = %saved.address, "wallet created");
        Ok((saved, filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::test_support::FakeGateway;
    use std::{thread::sleep, time::Duration};

    fn sample(address: &str) -> WalletRecord {
        WalletRecord {
            address: address.to_owned(),
            private_key: "aa".repeat(32),
            public_key: format!("04{}", "bb".repeat(64)),
            network: Network::Shasta,
            created_at: "2024-01-01T00:00:00.000Z".to_owned(),
            last_updated: "2024-01-01T00:00:00.000Z".to_owned(),
        }
    }

    fn backups_in(dir: &Path) -> eyre::Result<Vec<String>> {
        let mut v: Vec<String> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| is_backup_name(n))
            .collect();
        v.sort();
        Ok(v)
    }

    #[test]
    fn backup_name_pattern() {
        assert!(is_backup_name("w-shasta.json.bk"));
        assert!(is_backup_name("w-shasta.json.bk2"));
        assert!(is_backup_name("w-shasta.json.bk17"));
        assert!(!is_backup_name("w-shasta.json"));
        assert!(!is_backup_name("w-shasta.json.bkx"));
        assert!(!is_backup_name("bk-shasta.json"));
    }

    #[test]
    fn backup_slots_follow_bk_bk2_bk3() {
        let p = Path::new("/w/a.json");
        assert_eq!(backup_path(p, 1), PathBuf::from("/w/a.json.bk"));
        assert_eq!(backup_path(p, 2), PathBuf::from("/w/a.json.bk2"));
        assert_eq!(backup_path(p, 3), PathBuf::from("/w/a.json.bk3"));
    }

    #[test]
    fn filename_rejects_empty_and_traversal() {
        assert_eq!(
            wallet_filename(" test ", Network::Shasta).ok().as_deref(),
            Some("test-shasta.json")
        );
        assert!(wallet_filename("  ", Network::Mainnet).is_err());
        assert!(wallet_filename("../evil", Network::Mainnet).is_err());
        assert!(wallet_filename("a/b", Network::Mainnet).is_err());
    }

    #[test]
    fn list_missing_dir_is_empty() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = WalletStore::new(dir.path().join("nope"));
        assert!(store.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn list_skips_backups_and_non_json() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in [
            "b-nile.json",
            "a-shasta.json",
            "a-shasta.json.bk",
            "a-shasta.json.bk2",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "{}")?;
        }
        let store = WalletStore::new(dir.path());
        assert_eq!(store.list()?, vec!["a-shasta.json", "b-nile.json"]);
        Ok(())
    }

    #[test]
    fn load_missing_is_none_and_garbage_is_corrupt() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = WalletStore::new(dir.path());
        assert!(store.load("absent.json")?.is_none());

        fs::write(dir.path().join("bad.json"), "{not json")?;
        let err = store.load("bad.json");
        assert!(
            matches!(
                err.as_ref().map_err(|e| e.downcast_ref::<WalletError>()),
                Err(Some(WalletError::CorruptWalletFile { .. }))
            ),
            "expected corrupt wallet error, got {err:?}"
        );

        fs::write(dir.path().join("shape.json"), r#"{"address":"T1"}"#)?;
        assert!(store.load("shape.json").is_err());
        Ok(())
    }

    #[test]
    fn save_then_load_round_trips() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = WalletStore::new(dir.path());
        let path = store.path_for("rt-shasta.json");
        let saved = WalletStore::save(&sample("TA"), &path)?;
        let loaded = store.load("rt-shasta.json")?;
        assert_eq!(loaded, Some(saved));

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(raw.get("network").and_then(|v| v.as_str()), Some("shasta"));
        assert!(raw.get("privateKey").is_some());
        assert!(raw.get("lastUpdated").is_some());
        Ok(())
    }

    #[test]
    fn same_identity_save_refreshes_without_backup() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("w-shasta.json");
        let first = WalletStore::save(&sample("TA"), &path)?;
        sleep(Duration::from_millis(5));
        let second = WalletStore::save(&first, &path)?;

        assert!(backups_in(dir.path())?.is_empty());
        assert_ne!(first.last_updated, second.last_updated);
        assert_eq!(first.created_at, second.created_at);
        Ok(())
    }

    #[test]
    fn divergent_save_backs_up_original_bytes() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("w-shasta.json");
        WalletStore::save(&sample("TA"), &path)?;
        let original = fs::read(&path)?;

        WalletStore::save(&sample("TB"), &path)?;
        assert_eq!(backups_in(dir.path())?, vec!["w-shasta.json.bk"]);
        assert_eq!(fs::read(dir.path().join("w-shasta.json.bk"))?, original);

        let second_original = fs::read(&path)?;
        WalletStore::save(&sample("TC"), &path)?;
        assert_eq!(
            backups_in(dir.path())?,
            vec!["w-shasta.json.bk", "w-shasta.json.bk2"]
        );
        assert_eq!(fs::read(dir.path().join("w-shasta.json.bk"))?, original);
        assert_eq!(
            fs::read(dir.path().join("w-shasta.json.bk2"))?,
            second_original
        );
        Ok(())
    }

    #[test]
    fn unparseable_existing_file_is_treated_as_divergent() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("w-nile.json");
        fs::write(&path, "garbage")?;
        WalletStore::save(&sample("TA"), &path)?;
        assert_eq!(fs::read_to_string(dir.path().join("w-nile.json.bk"))?, "garbage");
        Ok(())
    }

    #[test]
    fn fills_first_unused_backup_slot() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("w-shasta.json");
        fs::write(dir.path().join("w-shasta.json.bk"), "kept")?;
        WalletStore::save(&sample("TA"), &path)?;
        WalletStore::save(&sample("TB"), &path)?;
        assert_eq!(fs::read_to_string(dir.path().join("w-shasta.json.bk"))?, "kept");
        assert!(dir.path().join("w-shasta.json.bk2").exists());
        Ok(())
    }

    #[test]
    fn create_recreate_and_hand_edit_scenario() -> eyre::Result<()> {
        let root = tempfile::tempdir()?;
        let wallet_dir = root.path().join("wallets");
        let store = WalletStore::new(&wallet_dir);
        let gateway = FakeGateway::default();

        let (created, filename) = store.create(&gateway, Network::Shasta, "test")?;
        assert_eq!(filename, "test-shasta.json");
        assert_eq!(created.network, Network::Shasta);
        assert!(!created.address.is_empty());
        assert!(!created.private_key.is_empty());
        assert!(created.created_at <= created.last_updated);

        let loaded = store.load(&filename)?;
        assert_eq!(loaded.as_ref(), Some(&created));

        // Same identity under the same filename: refresh only.
        sleep(Duration::from_millis(5));
        let path = store.path_for(&filename);
        let refreshed = WalletStore::save(&created, &path)?;
        assert!(backups_in(&wallet_dir)?.is_empty());
        assert_ne!(refreshed.last_updated, created.last_updated);

        // Hand-edited identity: exactly one `.bk` holding the prior content.
        let prior = fs::read(&path)?;
        let mut edited = refreshed;
        edited.private_key = "cc".repeat(32);
        WalletStore::save(&edited, &path)?;
        assert_eq!(backups_in(&wallet_dir)?, vec!["test-shasta.json.bk"]);
        assert_eq!(fs::read(wallet_dir.join("test-shasta.json.bk"))?, prior);
        Ok(())
    }

    #[test]
    fn create_failure_in_gateway_propagates() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = WalletStore::new(dir.path());
        let gateway = FakeGateway {
            fail_create: true,
            ..FakeGateway::default()
        };
        assert!(store.create(&gateway, Network::Nile, "x").is_err());
        assert!(store.list()?.is_empty());
        Ok(())
    }
}
