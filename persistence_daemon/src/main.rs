//! Thin process wrapper around `persistence_core`: loads configuration,
//! runs startup recovery, and schedules the GC timer. No HTTP listener,
//! routing, or wire (de)serialization lives here — those belong to
//! whatever service embeds `persistence_core` as a library.

use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use persistence_core::recovery::PersistenceStore;
use persistence_core::reference_source::ReferencedExtentsSource;
use persistence_core::StoreConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use utils::logging::{self, LogFormat};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (see `StoreConfig`).
    #[arg(long)]
    config: Utf8PathBuf,

    /// Switch log output to JSON, for production log shipping.
    #[arg(long, default_value_t = false)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_log { LogFormat::Json } else { LogFormat::Plain };
    logging::init(format).context("failed to install tracing subscriber")?;

    let config_text = tokio::fs::read_to_string(cli.config.as_std_path())
        .await
        .with_context(|| format!("reading config file {}", cli.config))?;
    let config: StoreConfig =
        toml_edit::de::from_str(&config_text).context("parsing config file as TOML")?;

    let store = PersistenceStore::init(config.clone())
        .await
        .context("startup recovery failed")?;

    // No blob/queue metadata catalog is implemented in this workspace
    // (spec's external collaborator boundary); a real deployment wires
    // its own `ReferencedExtentsSource` implementations in here.
    let sources: Vec<Arc<dyn ReferencedExtentsSource>> = Vec::new();
    let gc = Arc::new(store.garbage_collector(sources));

    let cancel = CancellationToken::new();
    let gc_handle = gc.clone().spawn_periodic(config.gc_interval, cancel.clone());

    info!("persistence_daemon running, awaiting shutdown signal");
    wait_for_shutdown_signal().await;

    info!("shutdown signal received, stopping");
    cancel.cancel();
    let _ = gc_handle.await;
    store.close().await.context("graceful shutdown failed")?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
