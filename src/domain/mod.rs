//! Domain models - core types shared by every component
//!
//! - `SpaceIndex` - stable position of a parking space
//! - `Distance` - ultrasonic reading in centimeters (with a no-echo sentinel)
//! - `Credential` - identifier presented at the reader
//! - `IndicatorColor` - per-space occupancy light

pub mod types;

pub use types::{Credential, Distance, IndicatorColor, SpaceIndex};
