//! Barrier actuator
//!
//! The servo angle is a pure function of `is_open`. Commands are assumed to
//! succeed; there is no position feedback, so `BarrierState` is the single
//! source of truth for where the arm is.

use crate::io::hardware::BarrierServo;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BarrierState {
    pub is_open: bool,
    /// Time of the last open transition
    pub opened_at: Option<Instant>,
}

pub struct BarrierActuator {
    servo: Box<dyn BarrierServo>,
    open_angle: u16,
    closed_angle: u16,
    state: BarrierState,
}

impl BarrierActuator {
    pub fn new(servo: Box<dyn BarrierServo>, open_angle: u16, closed_angle: u16) -> Self {
        Self { servo, open_angle, closed_angle, state: BarrierState::default() }
    }

    pub fn open(&mut self, now: Instant) {
        self.servo.set_angle(self.open_angle);
        self.state.is_open = true;
        self.state.opened_at = Some(now);
        info!(angle = %self.open_angle, "barrier_opened");
    }

    pub fn close(&mut self) {
        self.servo.set_angle(self.closed_angle);
        self.state.is_open = false;
        info!(angle = %self.closed_angle, "barrier_closed");
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    #[inline]
    pub fn state(&self) -> BarrierState {
        self.state
    }
}
