//! Per-space occupancy debouncer
//!
//! Turns raw ultrasonic samples into a stable occupied/free signal. A space
//! only changes its stable state after the contrary reading has persisted,
//! sample after sample, for the whole debounce window.
//!
//! Transitions (`d` = fresh sample, `T` = space threshold):
//! - Free + d < T → PendingOccupied (window starts)
//! - PendingOccupied + d < T, window elapsed → Occupied
//! - PendingOccupied + d ≥ T → Free
//! - Occupied + d ≥ T → PendingFree (window starts)
//! - PendingFree + d ≥ T, window elapsed → Free
//! - PendingFree + d < T → Occupied
//!
//! The reversions are immediate: a single contrary sample drops the pending
//! state without a debounce of its own.

use crate::domain::types::{Distance, SpaceIndex};
use tokio::time::{Duration, Instant};

/// Observable debounce state of a space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyState {
    Free,
    PendingOccupied,
    Occupied,
    PendingFree,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Free,
    PendingOccupied { since: Instant },
    Occupied,
    PendingFree { since: Instant },
}

/// One physical parking space
#[derive(Debug, Clone)]
pub struct ParkingSpace {
    index: SpaceIndex,
    threshold: Distance,
    phase: Phase,
}

impl ParkingSpace {
    /// New space, initially free
    pub fn new(index: SpaceIndex, threshold: Distance) -> Self {
        Self { index, threshold, phase: Phase::Free }
    }

    #[inline]
    pub fn index(&self) -> SpaceIndex {
        self.index
    }

    #[inline]
    pub fn threshold(&self) -> Distance {
        self.threshold
    }

    /// Current stable state
    #[inline]
    pub fn occupied(&self) -> bool {
        matches!(self.phase, Phase::Occupied | Phase::PendingFree { .. })
    }

    /// True while a contrary reading is being debounced
    #[inline]
    pub fn transitioning(&self) -> bool {
        matches!(self.phase, Phase::PendingOccupied { .. } | Phase::PendingFree { .. })
    }

    /// When the current disagreement began (only while transitioning)
    pub fn pending_since(&self) -> Option<Instant> {
        match self.phase {
            Phase::PendingOccupied { since } | Phase::PendingFree { since } => Some(since),
            Phase::Free | Phase::Occupied => None,
        }
    }

    pub fn state(&self) -> OccupancyState {
        match self.phase {
            Phase::Free => OccupancyState::Free,
            Phase::PendingOccupied { .. } => OccupancyState::PendingOccupied,
            Phase::Occupied => OccupancyState::Occupied,
            Phase::PendingFree { .. } => OccupancyState::PendingFree,
        }
    }

    /// Feed one fresh sample.
    ///
    /// Returns `Some(occupied)` when the stable state flips, `None` otherwise.
    pub fn observe(&mut self, sample: Distance, now: Instant, debounce: Duration) -> Option<bool> {
        let below = sample.is_below(self.threshold);

        let (next, flipped) = match (self.phase, below) {
            (Phase::Free, true) => (Phase::PendingOccupied { since: now }, None),
            (Phase::Free, false) => (Phase::Free, None),
            (Phase::PendingOccupied { since }, true) => {
                if now.saturating_duration_since(since) >= debounce {
                    (Phase::Occupied, Some(true))
                } else {
                    (self.phase, None)
                }
            }
            (Phase::PendingOccupied { .. }, false) => (Phase::Free, None),
            (Phase::Occupied, false) => (Phase::PendingFree { since: now }, None),
            (Phase::Occupied, true) => (Phase::Occupied, None),
            (Phase::PendingFree { since }, false) => {
                if now.saturating_duration_since(since) >= debounce {
                    (Phase::Free, Some(false))
                } else {
                    (self.phase, None)
                }
            }
            (Phase::PendingFree { .. }, true) => (Phase::Occupied, None),
        };

        self.phase = next;
        flipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn space() -> ParkingSpace {
        ParkingSpace::new(SpaceIndex(0), Distance(16.92))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Feed `value` every 100ms over [from, to] (inclusive) relative to `t0`
    fn feed(space: &mut ParkingSpace, t0: Instant, from: u64, to: u64, value: f32) -> Vec<bool> {
        let mut flips = Vec::new();
        let mut t = from;
        while t <= to {
            if let Some(f) = space.observe(Distance(value), t0 + ms(t), DEBOUNCE) {
                flips.push(f);
            }
            t += 100;
        }
        flips
    }

    #[test]
    fn test_new_space_is_free() {
        let s = space();
        assert!(!s.occupied());
        assert!(!s.transitioning());
        assert_eq!(s.pending_since(), None);
        assert_eq!(s.state(), OccupancyState::Free);
    }

    #[test]
    fn test_sub_threshold_starts_pending() {
        let mut s = space();
        let t0 = Instant::now();

        assert_eq!(s.observe(Distance(10.0), t0, DEBOUNCE), None);
        assert_eq!(s.state(), OccupancyState::PendingOccupied);
        assert!(s.transitioning());
        assert!(!s.occupied());
        assert_eq!(s.pending_since(), Some(t0));
    }

    #[test]
    fn test_occupied_after_full_window() {
        let mut s = space();
        let t0 = Instant::now();

        let flips = feed(&mut s, t0, 0, 600, 10.0);

        assert_eq!(flips, vec![true]);
        assert!(s.occupied());
        assert!(!s.transitioning());
    }

    #[test]
    fn test_not_occupied_before_window() {
        let mut s = space();
        let t0 = Instant::now();

        feed(&mut s, t0, 0, 400, 10.0);

        assert!(!s.occupied());
        assert_eq!(s.state(), OccupancyState::PendingOccupied);
    }

    #[test]
    fn test_window_boundary_exact() {
        let mut s = space();
        let t0 = Instant::now();

        s.observe(Distance(10.0), t0, DEBOUNCE);
        assert_eq!(s.observe(Distance(10.0), t0 + ms(499), DEBOUNCE), None);
        assert_eq!(s.observe(Distance(10.0), t0 + ms(500), DEBOUNCE), Some(true));
    }

    #[test]
    fn test_single_isolated_reading_never_flips() {
        let mut s = space();
        let t0 = Instant::now();

        s.observe(Distance(30.0), t0, DEBOUNCE);
        s.observe(Distance(10.0), t0 + ms(100), DEBOUNCE);
        // Even a long gap before the next (clear) sample does not flip
        assert_eq!(s.observe(Distance(30.0), t0 + ms(5000), DEBOUNCE), None);

        assert!(!s.occupied());
        assert_eq!(s.state(), OccupancyState::Free);
    }

    #[test]
    fn test_reversion_restarts_window() {
        let mut s = space();
        let t0 = Instant::now();

        feed(&mut s, t0, 0, 400, 10.0);
        s.observe(Distance(30.0), t0 + ms(450), DEBOUNCE);
        assert_eq!(s.state(), OccupancyState::Free);

        // Window restarts at 500, so 900 is not enough but 1000 is
        assert_eq!(feed(&mut s, t0, 500, 900, 10.0), Vec::<bool>::new());
        assert_eq!(s.observe(Distance(10.0), t0 + ms(1000), DEBOUNCE), Some(true));
    }

    #[test]
    fn test_occupied_to_free_needs_window() {
        let mut s = space();
        let t0 = Instant::now();
        feed(&mut s, t0, 0, 500, 10.0);
        assert!(s.occupied());

        assert_eq!(s.observe(Distance(30.0), t0 + ms(1000), DEBOUNCE), None);
        assert_eq!(s.state(), OccupancyState::PendingFree);
        assert!(s.occupied());

        assert_eq!(s.observe(Distance(30.0), t0 + ms(1400), DEBOUNCE), None);
        assert_eq!(s.observe(Distance(30.0), t0 + ms(1500), DEBOUNCE), Some(false));
        assert!(!s.occupied());
    }

    #[test]
    fn test_pending_free_reverts_to_occupied() {
        let mut s = space();
        let t0 = Instant::now();
        feed(&mut s, t0, 0, 500, 10.0);

        s.observe(Distance(30.0), t0 + ms(600), DEBOUNCE);
        assert_eq!(s.observe(Distance(10.0), t0 + ms(700), DEBOUNCE), None);

        assert_eq!(s.state(), OccupancyState::Occupied);
        assert!(s.occupied());
        assert_eq!(s.pending_since(), None);
    }

    #[test]
    fn test_no_echo_counts_as_clear() {
        let mut s = space();
        let t0 = Instant::now();
        feed(&mut s, t0, 0, 500, 10.0);

        s.observe(Distance::NO_ECHO, t0 + ms(600), DEBOUNCE);
        assert_eq!(s.state(), OccupancyState::PendingFree);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut s = space();
        let t0 = Instant::now();

        s.observe(Distance(16.92), t0, DEBOUNCE);
        assert_eq!(s.state(), OccupancyState::Free);
    }
}
