use directories::ProjectDirs;
use eyre::ContextCompat as _;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "tron-wallet.log.jsonl";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl AppPaths {
    pub fn discover() -> eyre::Result<Self> {
        // Test/CI override knob.
        if let Ok(data_dir) = std::env::var("TRON_WALLET_DATA_DIR") {
            let data_dir = PathBuf::from(data_dir);
            let log_file = data_dir.join(LOG_FILE_NAME);
            return Ok(Self { data_dir, log_file });
        }

        // macOS: ~/Library/Application Support/tron-wallet
        // Linux: ~/.local/share/tron-wallet
        // Windows: %APPDATA%\\tron-wallet
        let proj =
            ProjectDirs::from("", "", "tron-wallet").context("failed to resolve project dirs")?;
        let data_dir = proj.data_dir().to_path_buf();
        let log_file = data_dir.join(LOG_FILE_NAME);

        Ok(Self { data_dir, log_file })
    }

    pub fn ensure_private_dirs(&self) -> eyre::Result<()> {
        crate::fsutil::ensure_private_dir(&self.data_dir)
    }
}
