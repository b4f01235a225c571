//! Mock credential registry
//!
//! Serves the registry API the gate validates cards against, backed by an
//! in-memory client list. Timestamps alternate entry/exit per client.
//!
//! Usage:
//!   cargo run --bin mock-registry -- --port 8000 --client AB12=Ana --client C0FFEE=Bruno

use clap::Parser;
use parking_gate::io::registry_server::{start_registry_server, RegistryStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock-registry")]
#[command(about = "Mock credential registry for local simulation")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Registered client as UID=NAME (repeatable)
    #[arg(short, long = "client", value_parser = parse_client)]
    clients: Vec<(String, String)>,
}

fn parse_client(s: &str) -> Result<(String, String), String> {
    let (uid, name) = s.split_once('=').ok_or_else(|| format!("expected UID=NAME, got '{}'", s))?;
    let uid = uid.trim();
    if uid.is_empty() {
        return Err("UID must not be empty".to_string());
    }
    Ok((uid.to_uppercase(), name.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let store = Arc::new(RegistryStore::new());
    for (uid, name) in &args.clients {
        if store.add_client(uid.as_str(), name.as_str()) {
            info!(uid = %uid, name = %name, "client_registered");
        } else {
            warn!(uid = %uid, "client_duplicate_ignored");
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    info!(port = %args.port, clients = %args.clients.len(), "mock_registry_starting");
    start_registry_server(args.port, store, shutdown_rx).await
}
