//! Bench TCP listener driving `SimulatedHardware`
//!
//! Line protocol, one command per line, answered with `OK` or `ERR <reason>`:
//! - `CARD <hex byte> [<hex byte> ...]` present a card to the reader
//! - `DIST <space number> <cm>|none` set the reading of a space (1-based)
//! - `BEAM blocked|clear` set the transit-zone break-beam

use crate::domain::types::{Credential, Distance, SpaceIndex};
use crate::infra::metrics::Metrics;
use crate::io::access_log::AccessLog;
use crate::io::sim::SimulatedHardware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    Card(Credential),
    Distance { space: SpaceIndex, distance: Option<Distance> },
    Beam { interrupted: bool },
}

/// Parse one protocol line. `None` for anything unrecognized.
pub fn parse_line(line: &str) -> Option<SimCommand> {
    let mut parts = line.split_whitespace();
    let keyword = parts.next()?.to_ascii_uppercase();

    match keyword.as_str() {
        "CARD" => {
            let bytes = parts
                .map(|part| u8::from_str_radix(part.trim_start_matches("0x"), 16))
                .collect::<Result<Vec<u8>, _>>()
                .ok()?;
            if bytes.is_empty() {
                return None;
            }
            Some(SimCommand::Card(Credential::from_uid_bytes(&bytes)))
        }
        "DIST" => {
            let space = SpaceIndex::from_number(parts.next()?.parse().ok()?)?;
            let value = parts.next()?;
            let distance = if value.eq_ignore_ascii_case("none") {
                None
            } else {
                let cm: f32 = value.parse().ok()?;
                if !cm.is_finite() || cm < 0.0 {
                    return None;
                }
                Some(Distance(cm))
            };
            if parts.next().is_some() {
                return None;
            }
            Some(SimCommand::Distance { space, distance })
        }
        "BEAM" => {
            let interrupted = match parts.next()?.to_ascii_lowercase().as_str() {
                "blocked" => true,
                "clear" => false,
                _ => return None,
            };
            Some(SimCommand::Beam { interrupted })
        }
        _ => None,
    }
}

/// Bind `0.0.0.0:port` and serve until shutdown
pub async fn start_sim_listener(
    port: u16,
    hardware: SimulatedHardware,
    card_tx: mpsc::Sender<Credential>,
    log: Arc<AccessLog>,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve_sim_listener(listener, hardware, card_tx, log, metrics, shutdown).await;
    Ok(())
}

/// Accept bench connections on an already bound listener
pub async fn serve_sim_listener(
    listener: TcpListener,
    hardware: SimulatedHardware,
    card_tx: mpsc::Sender<Credential>,
    log: Arc<AccessLog>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(addr = ?listener.local_addr().ok(), "sim_listener_started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("sim_listener_shutdown");
                    return;
                }
            }
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        let hw = hardware.clone();
                        let tx = card_tx.clone();
                        let l = log.clone();
                        let m = metrics.clone();
                        tokio::spawn(async move {
                            handle_sim_connection(socket, addr, hw, tx, l, m).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "sim_listener_accept_failed");
                    }
                }
            }
        }
    }
}

async fn handle_sim_connection(
    socket: TcpStream,
    addr: SocketAddr,
    hardware: SimulatedHardware,
    card_tx: mpsc::Sender<Credential>,
    log: Arc<AccessLog>,
    metrics: Arc<Metrics>,
) {
    debug!(peer = %addr, "sim_connection_accepted");

    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(peer = %addr, error = %e, "sim_connection_read_failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match parse_line(line) {
            Some(command) => apply(command, &hardware, &card_tx, &log, &metrics),
            None => {
                debug!(peer = %addr, line = %line, "sim_unknown_message");
                Err("unknown command".to_string())
            }
        };

        let reply = match reply {
            Ok(()) => "OK\n".to_string(),
            Err(reason) => format!("ERR {}\n", reason),
        };
        if write_half.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }

    debug!(peer = %addr, "sim_connection_closed");
}

fn apply(
    command: SimCommand,
    hardware: &SimulatedHardware,
    card_tx: &mpsc::Sender<Credential>,
    log: &AccessLog,
    metrics: &Metrics,
) -> Result<(), String> {
    match command {
        SimCommand::Card(credential) => {
            info!(uid = %credential, "sim_card_presented");
            let (credential, reason) = match card_tx.try_send(credential) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(credential)) => (credential, "reader busy"),
                Err(TrySendError::Closed(credential)) => (credential, "reader closed"),
            };
            metrics.record_credential_dropped();
            log.append(&format!("RFID access attempt dropped: {}", reason), Some(&credential));
            warn!(uid = %credential, reason = %reason, "sim_card_dropped");
            Err(reason.to_string())
        }
        SimCommand::Distance { space, distance } => {
            hardware.set_distance(space, distance).map_err(|e| e.to_string())
        }
        SimCommand::Beam { interrupted } => {
            hardware.set_beam_interrupted(interrupted);
            Ok(())
        }
    }
}
