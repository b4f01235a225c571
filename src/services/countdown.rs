//! Obstruction-aware closing countdown
//!
//! The barrier may only close after the transit zone has been clear for the
//! full transition delay without interruption. Any beam interruption while
//! open aborts the countdown; the next clear tick starts it over from zero.

use tokio::time::{Duration, Instant};

/// What a single evaluation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownAction {
    /// Barrier closed or beam blocked with nothing running
    Idle,
    /// Countdown started on this tick
    Started,
    /// Countdown running, not yet elapsed
    Running { elapsed: Duration },
    /// Delay elapsed: the caller must close the barrier now
    Expired,
    /// A running countdown was aborted (beam interrupted or barrier closed)
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosingCountdown {
    started_at: Option<Instant>,
}

impl ClosingCountdown {
    pub fn new() -> Self {
        Self { started_at: None }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    #[inline]
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn reset(&mut self) {
        self.started_at = None;
    }

    /// Run one control tick.
    ///
    /// When this returns `Expired` the countdown is already inactive.
    pub fn evaluate(
        &mut self,
        is_open: bool,
        beam_clear: bool,
        now: Instant,
        delay: Duration,
    ) -> CountdownAction {
        if !(is_open && beam_clear) {
            return match self.started_at.take() {
                Some(_) => CountdownAction::Cancelled,
                None => CountdownAction::Idle,
            };
        }

        match self.started_at {
            Some(started_at) => {
                let elapsed = now.saturating_duration_since(started_at);
                if elapsed >= delay {
                    self.started_at = None;
                    CountdownAction::Expired
                } else {
                    CountdownAction::Running { elapsed }
                }
            }
            None => {
                self.started_at = Some(now);
                CountdownAction::Started
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(10);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_idle_when_closed() {
        let mut c = ClosingCountdown::new();
        assert_eq!(c.evaluate(false, true, Instant::now(), DELAY), CountdownAction::Idle);
        assert!(!c.is_active());
    }

    #[test]
    fn test_starts_when_open_and_clear() {
        let mut c = ClosingCountdown::new();
        let t0 = Instant::now();
        assert_eq!(c.evaluate(true, true, t0, DELAY), CountdownAction::Started);
        assert!(c.is_active());
        assert_eq!(c.started_at(), Some(t0));
    }

    #[test]
    fn test_expires_after_delay() {
        let mut c = ClosingCountdown::new();
        let t0 = Instant::now();
        c.evaluate(true, true, t0, DELAY);

        assert_eq!(
            c.evaluate(true, true, t0 + ms(9_999), DELAY),
            CountdownAction::Running { elapsed: ms(9_999) }
        );
        assert_eq!(c.evaluate(true, true, t0 + ms(10_000), DELAY), CountdownAction::Expired);
        assert!(!c.is_active());
    }

    #[test]
    fn test_interruption_cancels() {
        let mut c = ClosingCountdown::new();
        let t0 = Instant::now();
        c.evaluate(true, true, t0, DELAY);

        assert_eq!(c.evaluate(true, false, t0 + ms(5_000), DELAY), CountdownAction::Cancelled);
        assert!(!c.is_active());
        assert_eq!(c.evaluate(true, false, t0 + ms(5_100), DELAY), CountdownAction::Idle);
    }

    #[test]
    fn test_interruption_restarts_clock_from_zero() {
        let mut c = ClosingCountdown::new();
        let t0 = Instant::now();
        c.evaluate(true, true, t0, DELAY);
        c.evaluate(true, false, t0 + ms(9_000), DELAY);

        // Clear again: full delay is required from here
        assert_eq!(c.evaluate(true, true, t0 + ms(9_100), DELAY), CountdownAction::Started);
        assert!(matches!(
            c.evaluate(true, true, t0 + ms(19_000), DELAY),
            CountdownAction::Running { .. }
        ));
        assert_eq!(c.evaluate(true, true, t0 + ms(19_100), DELAY), CountdownAction::Expired);
    }

    #[test]
    fn test_reset_discards_running_countdown() {
        let mut c = ClosingCountdown::new();
        let t0 = Instant::now();
        c.evaluate(true, true, t0, DELAY);
        c.reset();

        assert!(!c.is_active());
        assert_eq!(c.evaluate(true, true, t0 + ms(10_000), DELAY), CountdownAction::Started);
    }
}
