#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::Parser;
use eyre::Context as _;
use tracing_subscriber::prelude::*;

mod amount;
mod chains;
mod config;
mod console;
mod errors;
mod fsutil;
mod handlers;
mod menu;
mod paths;
mod retry;
mod session;
mod shell;
mod wallet;

/// Interactive TRON wallet. Run without arguments and follow the menu.
#[derive(Parser, Debug)]
#[command(name = "tron-wallet", version)]
struct Cli {}

fn init_logging(paths: &paths::AppPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tron-wallet.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // stdout/stderr belong to the interactive session; logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(file_layer).init();

    guard
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let _cli = Cli::parse();
    // A missing .env is normal.
    let _env_file = dotenvy::dotenv().ok();

    let paths = paths::AppPaths::discover()?;
    paths.ensure_private_dirs().context("create data dir")?;
    let _log_guard = init_logging(&paths);

    let settings = config::Settings::from_env().context("load settings")?;
    let store = wallet::WalletStore::new(settings.wallet_dir.clone());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        wallet_dir = %store.dir().display(),
        "starting"
    );

    let app = handlers::App {
        store,
        gateway: chains::tron::TronGrid::new(&settings)?,
        networks: settings.networks.clone(),
    };

    let mut con = console::stdio();
    shell::run(&app, &mut con).await.context("wallet shell failed")?;
    tracing::info!("exiting");
    Ok(())
}
