//! Parking gate controller
//!
//! Senses per-space occupancy, shows where to park, and admits registered
//! cards through a barrier that only closes once the transit zone has been
//! clear for the full transition delay.
//!
//! Module structure:
//! - `domain/` - Core types (spaces, distances, credentials)
//! - `io/` - External interfaces (hardware, registry, access log, display, console)
//! - `services/` - Control logic (debounce, availability, barrier, access flow, cycle)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use parking_gate::infra::{Config, Metrics};
use parking_gate::io::{
    run_console, start_sim_listener, AccessLog, ConsoleDisplay, CredentialRegistry,
    RegistryClient, SimulatedHardware,
};
use parking_gate::services::{
    create_access_worker, create_barrier_controller, AccessFlow, Availability, BarrierActuator,
    DistanceSampler, MainCycle,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Parking facility access controller
#[derive(Parser, Debug)]
#[command(name = "parking-gate", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/parking.toml)
    #[arg(short, long)]
    config: Option<String>,
}

/// Queue depth between the card reader and the access worker
const CREDENTIAL_QUEUE: usize = 4;
const BARRIER_COMMAND_QUEUE: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: INFO, use RUST_LOG=debug for per-sample visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "parking-gate starting");

    let args = Args::parse();
    let config = match args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(&[]),
    };

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        registry = %config.registry_base_url(),
        registry_timeout_ms = %config.registry_timeout().as_millis(),
        spaces = %config.space_count(),
        thresholds_cm = ?config.space_thresholds_cm(),
        debounce_ms = %config.debounce().as_millis(),
        transition_delay_ms = %config.transition_delay().as_millis(),
        access_log = %config.access_log_file(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());
    let hardware = SimulatedHardware::new(config.space_count());

    // Barrier controller: sole owner of the barrier and its closing countdown
    let actuator = BarrierActuator::new(
        Box::new(hardware.clone()),
        config.open_angle(),
        config.closed_angle(),
    );
    let (barrier, controller) = create_barrier_controller(
        actuator,
        Arc::new(hardware.clone()),
        config.transition_delay(),
        config.barrier_poll_interval(),
        metrics.clone(),
        BARRIER_COMMAND_QUEUE,
    );
    tokio::spawn(controller.run(shutdown_rx.clone()));

    // Access log runs degraded if the file cannot be opened
    let access_log = Arc::new(AccessLog::open(config.access_log_file()));

    // Access worker
    let registry: Arc<dyn CredentialRegistry> = Arc::new(RegistryClient::new(&config)?);
    let (availability_tx, availability_rx) =
        watch::channel(Availability::all_free(config.space_count()));
    let flow = AccessFlow::new(
        registry,
        barrier,
        availability_rx,
        access_log.clone(),
        config.registry_timeout(),
        metrics.clone(),
    );
    let (access_tx, access_worker) = create_access_worker(flow, CREDENTIAL_QUEUE);
    tokio::spawn(access_worker.run());

    // Main cycle; a display that fails to initialize halts startup
    let sampler = DistanceSampler::new(Arc::new(hardware.clone()), config.echo_timeout());
    let cycle = MainCycle::new(
        config.space_thresholds_cm(),
        sampler,
        Box::new(hardware.clone()),
        Box::new(ConsoleDisplay::new(config.display_width())),
        config.debounce(),
        config.cycle_interval(),
        availability_tx,
        access_tx,
        access_log.clone(),
        metrics.clone(),
    )?;

    // Card reader: bench listener feeds presented cards into the cycle
    let (card_tx, card_rx) = mpsc::channel(CREDENTIAL_QUEUE);
    if config.sim_listener_enabled() {
        let port = config.sim_listener_port();
        let sim_hw = hardware.clone();
        let sim_log = access_log.clone();
        let sim_metrics = metrics.clone();
        let sim_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) =
                start_sim_listener(port, sim_hw, card_tx, sim_log, sim_metrics, sim_shutdown).await
            {
                error!(error = %e, "sim_listener_error");
            }
        });
    } else {
        info!("sim_listener_disabled");
        drop(card_tx);
    }

    // Operator console on stdin
    let console_log = access_log.clone();
    let console_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = run_console(stdin, tokio::io::stdout(), console_log, console_shutdown).await {
            error!(error = %e, "operator_console_error");
        }
    });

    // Metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    let mut metrics_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick fires immediately
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => metrics_clone.report().log(),
                _ = metrics_shutdown.changed() => break,
            }
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    // Runs until shutdown
    cycle.run(card_rx, shutdown_rx).await;

    metrics.report().log();
    info!("parking-gate shutdown complete");
    Ok(())
}
