//! Simulated bench hardware
//!
//! One shared state block backs every peripheral trait so a single handle can
//! be cloned into the sampler, the barrier controller, the main cycle and the
//! sim listener. Readings are set from outside (listener or tests) and the
//! servo/LED outputs are recorded for inspection.

use crate::domain::types::{Distance, IndicatorColor, SpaceIndex};
use crate::io::hardware::{BarrierServo, BreakBeam, EchoSensor, HardwareError, SpaceIndicators};
use crate::services::sampler::distance_to_echo;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct SimState {
    /// Per-space target distance; `None` means no echo
    distances: Vec<Option<Distance>>,
    beam_interrupted: bool,
    servo_angle: Option<u16>,
    indicators: Vec<Option<IndicatorColor>>,
}

#[derive(Clone, Default)]
pub struct SimulatedHardware {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHardware {
    pub fn new(spaces: usize) -> Self {
        let state = SimState {
            distances: vec![None; spaces],
            beam_interrupted: false,
            servo_angle: None,
            indicators: vec![None; spaces],
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn spaces(&self) -> usize {
        self.state.lock().distances.len()
    }

    /// Set what the ranging channel of `space` will see
    pub fn set_distance(
        &self,
        space: SpaceIndex,
        distance: Option<Distance>,
    ) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        let slot = state.distances.get_mut(space.0).ok_or(HardwareError::UnknownSpace(space))?;
        *slot = distance;
        debug!(space = %space, distance = ?distance.map(|d| d.cm()), "sim_distance_set");
        Ok(())
    }

    pub fn set_beam_interrupted(&self, interrupted: bool) {
        self.state.lock().beam_interrupted = interrupted;
        debug!(interrupted = %interrupted, "sim_beam_set");
    }

    /// Last angle commanded to the servo (`None` before any command)
    pub fn servo_angle(&self) -> Option<u16> {
        self.state.lock().servo_angle
    }

    /// Last color shown for `space`
    pub fn indicator(&self, space: SpaceIndex) -> Option<IndicatorColor> {
        self.state.lock().indicators.get(space.0).copied().flatten()
    }
}

#[async_trait]
impl EchoSensor for SimulatedHardware {
    async fn pulse(&self, channel: SpaceIndex) -> Option<Duration> {
        let distance = self.state.lock().distances.get(channel.0).copied().flatten();
        distance.map(distance_to_echo)
    }
}

impl BreakBeam for SimulatedHardware {
    fn is_interrupted(&self) -> bool {
        self.state.lock().beam_interrupted
    }
}

impl BarrierServo for SimulatedHardware {
    fn set_angle(&mut self, degrees: u16) {
        self.state.lock().servo_angle = Some(degrees);
    }
}

impl SpaceIndicators for SimulatedHardware {
    fn show(&mut self, space: SpaceIndex, color: IndicatorColor) {
        let mut state = self.state.lock();
        if let Some(slot) = state.indicators.get_mut(space.0) {
            *slot = Some(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sampler::echo_to_distance;

    #[tokio::test]
    async fn test_pulse_reflects_distance() {
        let hw = SimulatedHardware::new(2);
        hw.set_distance(SpaceIndex(1), Some(Distance(12.5))).unwrap();

        assert_eq!(hw.pulse(SpaceIndex(0)).await, None);
        let echo = hw.pulse(SpaceIndex(1)).await.unwrap();
        assert!((echo_to_distance(echo).cm() - 12.5).abs() < 0.05);
    }

    #[test]
    fn test_unknown_space_rejected() {
        let hw = SimulatedHardware::new(2);
        assert!(matches!(
            hw.set_distance(SpaceIndex(2), Some(Distance(1.0))),
            Err(HardwareError::UnknownSpace(SpaceIndex(2)))
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let hw = SimulatedHardware::new(1);
        let mut servo = hw.clone();
        let mut leds = hw.clone();

        servo.set_angle(90);
        leds.show(SpaceIndex(0), IndicatorColor::Red);
        hw.set_beam_interrupted(true);

        assert_eq!(hw.servo_angle(), Some(90));
        assert_eq!(hw.indicator(SpaceIndex(0)), Some(IndicatorColor::Red));
        assert!(servo.is_interrupted());
    }
}
