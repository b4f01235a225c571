//! Registry client against the in-memory registry server over real HTTP

use parking_gate::domain::types::Credential;
use parking_gate::io::registry::{
    CredentialRegistry, RegistrationOutcome, RegistryClient, RegistryError,
};
use parking_gate::io::registry_server::{serve_registry, RegistryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

struct Server {
    base_url: String,
    store: Arc<RegistryStore>,
    _shutdown: watch::Sender<bool>,
}

async fn start_server() -> Server {
    let store = Arc::new(RegistryStore::new());
    store.add_client("AB12", "Ana");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(serve_registry(listener, store.clone(), shutdown_rx));

    Server { base_url: format!("http://{}", addr), store, _shutdown: shutdown_tx }
}

fn client(base_url: &str) -> RegistryClient {
    RegistryClient::with_base_url(base_url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_validate_known_and_unknown() {
    let server = start_server().await;
    let registry = client(&server.base_url);

    assert!(registry.validate(&Credential::new("AB12")).await.unwrap());
    assert!(!registry.validate(&Credential::new("FFFF")).await.unwrap());
}

#[tokio::test]
async fn test_register_toggles_entry_and_exit() {
    let server = start_server().await;
    let registry = client(&server.base_url);
    let uid = Credential::new("AB12");

    assert_eq!(registry.register_timestamp(&uid).await.unwrap(), RegistrationOutcome::Entry);
    assert_eq!(registry.register_timestamp(&uid).await.unwrap(), RegistrationOutcome::Exit);

    let visits = server.store.visits();
    assert_eq!(visits.len(), 1);
    assert!(visits[0].exit_time.is_some());
}

#[tokio::test]
async fn test_register_unknown_uid_is_error() {
    let server = start_server().await;
    let registry = client(&server.base_url);

    let result = registry.register_timestamp(&Credential::new("FFFF")).await;
    assert!(matches!(result, Err(RegistryError::Status(404))));
}

#[tokio::test]
async fn test_basic_auth_url_accepted() {
    let server = start_server().await;
    let with_auth = server.base_url.replace("http://", "http://gate:secret@");
    let registry = client(&with_auth);

    assert_eq!(registry.base_url(), server.base_url);
    assert!(registry.validate(&Credential::new("AB12")).await.unwrap());
}

#[tokio::test]
async fn test_unreachable_registry_is_transport_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let registry = client(&format!("http://{}", addr));
    let result = registry.validate(&Credential::new("AB12")).await;
    assert!(matches!(result, Err(RegistryError::Transport(_))));
}
