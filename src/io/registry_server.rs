//! In-memory credential registry served over HTTP
//!
//! Speaks the same API the gate's `RegistryClient` calls:
//! - `GET  /check_uid/{uid}` → `{"message": "UID registrado", "name": ...}` or
//!   `{"message": "UID não registrado"}` (both 200)
//! - `POST /timestamps?uid={uid}` → `{"message": "entry_registered"}` on the
//!   first call, `{"message": "exit_registered"}` on the next (open visit is
//!   closed), 404 for an unknown UID
//!
//! Used by the `mock-registry` binary and by integration tests.

use crate::io::registry::REGISTERED_MESSAGE;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Body returned for a known client; the gate validates against this
pub const REGISTERED: &str = REGISTERED_MESSAGE;
pub const NOT_REGISTERED: &str = "UID não registrado";

/// One stay in the facility
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub uid: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    Entry,
    Exit,
}

#[derive(Default)]
struct StoreState {
    /// UID → client name
    clients: HashMap<String, String>,
    visits: Vec<Visit>,
}

#[derive(Default)]
pub struct RegistryStore {
    state: Mutex<StoreState>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Returns false if the UID is already taken.
    pub fn add_client(&self, uid: impl Into<String>, name: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        let uid = uid.into();
        if state.clients.contains_key(&uid) {
            return false;
        }
        state.clients.insert(uid, name.into());
        true
    }

    pub fn client_name(&self, uid: &str) -> Option<String> {
        self.state.lock().clients.get(uid).cloned()
    }

    /// Open a visit, or close the one already open. `None` for unknown UIDs.
    pub fn record_timestamp(&self, uid: &str, at: DateTime<Utc>) -> Option<TimestampKind> {
        let mut state = self.state.lock();
        if !state.clients.contains_key(uid) {
            return None;
        }

        let open = state.visits.iter().position(|v| v.uid == uid && v.exit_time.is_none());
        match open {
            Some(i) => {
                state.visits[i].exit_time = Some(at);
                Some(TimestampKind::Exit)
            }
            None => {
                state.visits.push(Visit { uid: uid.to_string(), entry_time: at, exit_time: None });
                Some(TimestampKind::Entry)
            }
        }
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.state.lock().visits.clone()
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
    response
}

fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    store: Arc<RegistryStore>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    debug!(method = %req.method(), path = %path, "registry_request");

    let response = match (req.method(), path) {
        (&Method::GET, p) if p.starts_with("/check_uid/") => {
            let uid = &p["/check_uid/".len()..];
            match store.client_name(uid) {
                Some(name) => {
                    info!(uid = %uid, name = %name, "registry_uid_known");
                    json_response(StatusCode::OK, json!({ "message": REGISTERED, "name": name }))
                }
                None => {
                    info!(uid = %uid, "registry_uid_unknown");
                    json_response(StatusCode::OK, json!({ "message": NOT_REGISTERED }))
                }
            }
        }
        (&Method::POST, "/timestamps") => match query_param(req.uri().query(), "uid") {
            None => json_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "detail": "missing uid query parameter" }),
            ),
            Some(uid) => match store.record_timestamp(uid, Utc::now()) {
                Some(TimestampKind::Entry) => {
                    info!(uid = %uid, "registry_entry_registered");
                    json_response(StatusCode::OK, json!({ "message": "entry_registered" }))
                }
                Some(TimestampKind::Exit) => {
                    info!(uid = %uid, "registry_exit_registered");
                    json_response(StatusCode::OK, json!({ "message": "exit_registered" }))
                }
                None => json_response(StatusCode::NOT_FOUND, json!({ "detail": NOT_REGISTERED })),
            },
        },
        _ => json_response(StatusCode::NOT_FOUND, json!({ "detail": "Not Found" })),
    };

    Ok(response)
}

/// Bind `0.0.0.0:port` and serve until shutdown
pub async fn start_registry_server(
    port: u16,
    store: Arc<RegistryStore>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    serve_registry(listener, store, shutdown).await;
    Ok(())
}

/// Serve the registry API on an already bound listener
pub async fn serve_registry(
    listener: TcpListener,
    store: Arc<RegistryStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(addr = ?listener.local_addr().ok(), "registry_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let store = store.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let store = store.clone();
                                async move { handle_request(req, store).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "registry_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "registry_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("registry_server_shutdown");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_then_exit() {
        let store = RegistryStore::new();
        assert!(store.add_client("AB12", "Ana"));
        let t0 = Utc::now();

        assert_eq!(store.record_timestamp("AB12", t0), Some(TimestampKind::Entry));
        assert_eq!(
            store.record_timestamp("AB12", t0 + Duration::hours(2)),
            Some(TimestampKind::Exit)
        );
        assert_eq!(
            store.record_timestamp("AB12", t0 + Duration::hours(3)),
            Some(TimestampKind::Entry)
        );

        let visits = store.visits();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].exit_time, Some(t0 + Duration::hours(2)));
        assert_eq!(visits[1].exit_time, None);
    }

    #[test]
    fn test_unknown_uid_not_recorded() {
        let store = RegistryStore::new();
        assert_eq!(store.record_timestamp("FFFF", Utc::now()), None);
        assert!(store.visits().is_empty());
    }

    #[test]
    fn test_duplicate_client_rejected() {
        let store = RegistryStore::new();
        assert!(store.add_client("AB12", "Ana"));
        assert!(!store.add_client("AB12", "Bruno"));
        assert_eq!(store.client_name("AB12").as_deref(), Some("Ana"));
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("uid=AB12"), "uid"), Some("AB12"));
        assert_eq!(query_param(Some("x=1&uid=CD"), "uid"), Some("CD"));
        assert_eq!(query_param(Some("uid="), "uid"), None);
        assert_eq!(query_param(None, "uid"), None);
    }
}
