//! Services - control logic and state management
//!
//! This module contains the core control services:
//! - `sampler` - Echo timing to distance conversion
//! - `debouncer` - Per-space occupancy debounce state machine
//! - `availability` - Facility-wide free/nearest-free view
//! - `barrier` - Barrier actuator
//! - `countdown` - Obstruction-aware closing countdown
//! - `barrier_controller` - Background task owning barrier and countdown
//! - `access_flow` - Credential validation, entry and registration worker
//! - `cycle` - Periodic sensing and status output loop

pub mod access_flow;
pub mod availability;
pub mod barrier;
pub mod barrier_controller;
pub mod countdown;
pub mod cycle;
pub mod debouncer;
pub mod sampler;

// Re-export commonly used types
pub use access_flow::{create_access_worker, AccessDecision, AccessFlow, CredentialEvent};
pub use availability::Availability;
pub use barrier::BarrierActuator;
pub use barrier_controller::{create_barrier_controller, BarrierHandle, BarrierSnapshot};
pub use cycle::MainCycle;
pub use sampler::DistanceSampler;
