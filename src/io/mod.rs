//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `hardware` - Peripheral traits (echo sensors, break-beam, servo, lights)
//! - `sim` - Simulated bench hardware implementing every peripheral trait
//! - `sim_listener` - TCP line protocol driving the bench hardware
//! - `registry` - HTTP client for the credential registry
//! - `registry_server` - In-memory registry stub served over HTTP
//! - `access_log` - Append-only access log file
//! - `display` - Two-line status display
//! - `console` - Operator console (`logs` replay)

pub mod access_log;
pub mod console;
pub mod display;
pub mod hardware;
pub mod registry;
pub mod registry_server;
pub mod sim;
pub mod sim_listener;

// Re-export commonly used types
pub use access_log::AccessLog;
pub use console::run_console;
pub use display::{ConsoleDisplay, StatusDisplay, StatusScreen};
pub use hardware::HardwareError;
pub use registry::{CredentialRegistry, RegistrationOutcome, RegistryClient, RegistryError};
pub use registry_server::RegistryStore;
pub use sim::SimulatedHardware;
pub use sim_listener::start_sim_listener;
