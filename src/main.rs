use std::time::Duration;

use alcohol_intake_tracker::{
    commands::{self, Cli, Context},
    config::{Config, StoreKind},
    http::build_client,
    logging,
    remote::RemoteStore,
    storage::{LocalStore, HISTORY_FILE},
    store::EntryStore,
};
use anyhow::Context as _;
use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is the normal case
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("unable to load config")?;
    let data_dir = config.data_dir()?;

    let _log_guard = logging::init(&config.log_level, &data_dir.join("logs"))?;
    debug!(?config.store, ?data_dir, "starting");

    let store: Box<dyn EntryStore> = match config.store {
        StoreKind::Local => Box::new(
            LocalStore::open(&data_dir.join(HISTORY_FILE))
                .context("unable to open drink history")?,
        ),
        StoreKind::Remote => {
            let client = build_client(Duration::from_secs(config.backend.timeout_secs))?;
            Box::new(RemoteStore::new(client, &config.backend, config.classifier_disabled)?)
        }
    };

    let ctx = Context {
        config,
        store,
        json: cli.json,
    };

    commands::run(cli.command, &ctx).await
}
