//! Hardware seams
//!
//! The controller talks to its peripherals only through these traits. Pulse
//! timing, servo PWM and LED drivers live behind them; `io::sim` provides the
//! bench implementation used by the binary and the tests.

use crate::domain::types::{IndicatorColor, SpaceIndex};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by peripheral initialization
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("display initialization failed: {0}")]
    DisplayInit(String),

    #[error("unknown space {0}")]
    UnknownSpace(SpaceIndex),
}

/// Ultrasonic ranging channel (one per space, dedicated trigger/echo pins)
#[async_trait]
pub trait EchoSensor: Send + Sync {
    /// Fire a trigger pulse and wait for the echo.
    ///
    /// Returns the round-trip echo duration, or `None` when nothing came back.
    async fn pulse(&self, channel: SpaceIndex) -> Option<Duration>;
}

/// Break-beam across the barrier's transit zone
pub trait BreakBeam: Send + Sync {
    /// True while an object interrupts the beam
    fn is_interrupted(&self) -> bool;
}

/// Barrier arm servo
pub trait BarrierServo: Send {
    fn set_angle(&mut self, degrees: u16);
}

/// Per-space two-color occupancy lights
pub trait SpaceIndicators: Send {
    fn show(&mut self, space: SpaceIndex, color: IndicatorColor);
}
