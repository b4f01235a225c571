//! Distance sampler - converts ultrasonic echo timing into distance
//!
//! Never fails: a missing, zero or late echo becomes `Distance::NO_ECHO`,
//! which no occupancy threshold will ever accept as "occupied".

use crate::domain::types::{Distance, SpaceIndex};
use crate::io::hardware::EchoSensor;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Speed of sound in centimeters per microsecond
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0344;

/// Convert a round-trip echo duration into a one-way distance
#[inline]
pub fn echo_to_distance(echo: Duration) -> Distance {
    if echo.is_zero() {
        return Distance::NO_ECHO;
    }
    let micros = echo.as_micros() as f32;
    Distance((micros / 2.0) * SPEED_OF_SOUND_CM_PER_US)
}

/// Inverse of [`echo_to_distance`], used by the bench hardware
#[inline]
pub fn distance_to_echo(distance: Distance) -> Duration {
    let micros = (distance.cm() / SPEED_OF_SOUND_CM_PER_US) * 2.0;
    Duration::from_micros(micros.round() as u64)
}

pub struct DistanceSampler {
    sensor: Arc<dyn EchoSensor>,
    echo_timeout: Duration,
}

impl DistanceSampler {
    pub fn new(sensor: Arc<dyn EchoSensor>, echo_timeout: Duration) -> Self {
        Self { sensor, echo_timeout }
    }

    /// Measure one channel, bounded by the echo timeout
    pub async fn measure(&self, channel: SpaceIndex) -> Distance {
        match tokio::time::timeout(self.echo_timeout, self.sensor.pulse(channel)).await {
            Ok(Some(echo)) => echo_to_distance(echo),
            Ok(None) => {
                debug!(space = %channel, "echo_missing");
                Distance::NO_ECHO
            }
            Err(_) => {
                debug!(
                    space = %channel,
                    timeout_ms = %self.echo_timeout.as_millis(),
                    "echo_timeout"
                );
                Distance::NO_ECHO
            }
        }
    }
}
