//! `shardkeepd`: runs the Shardkeep job scheduler until Ctrl-C.
//!
//! ```text
//! shardkeepd [config.json]
//! ```
//!
//! Without an argument the file named by `SHARDKEEP_CONFIG` is read, if
//! set. `SHARDKEEP_*` variables override the file; `RUST_LOG` sets the
//! log filter.

use std::path::PathBuf;
use std::sync::Arc;

use shardkeep::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ShardkeepError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("SHARDKEEP_CONFIG").map(PathBuf::from));
    let config = ControlConfig::load(config_path.as_deref())?;
    info!(root = %config.paths.root.display(), lang = %config.lang, "configuration loaded");

    let store = Arc::new(JsonFileStore::open(config.state_path()).await?);
    let sessions = SessionController::new(
        Arc::new(BashRunner::new(&config.paths.root)),
        Arc::new(SysinfoTable::new()),
        config.session.clone(),
    );
    let host = SysinfoHost::new(&config.paths.root);

    let app = App::new(config, sessions, store, host)?;
    app.start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "signal handler failed, shutting down");
    }
    info!("shutdown signal received");
    app.shutdown();
    Ok(())
}
