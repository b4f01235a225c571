//! Main cycle - periodic occupancy sensing and status output
//!
//! Every `cycle_interval`:
//! 1. sample each space in index order and feed its debouncer
//! 2. drive the per-space indicator lights
//! 3. evaluate availability and publish it for the access worker
//! 4. refresh the status display
//!
//! Presented credentials are handed to the access worker with `try_send`, so
//! a slow registry never holds up sensing. A credential that cannot be handed
//! over is still recorded in the access log. The barrier countdown is not run
//! here; the barrier controller owns it.

use crate::domain::types::{Credential, Distance, IndicatorColor, SpaceIndex};
use crate::infra::metrics::Metrics;
use crate::io::access_log::AccessLog;
use crate::io::display::{StatusDisplay, StatusScreen};
use crate::io::hardware::{HardwareError, SpaceIndicators};
use crate::services::access_flow::CredentialEvent;
use crate::services::availability::Availability;
use crate::services::debouncer::ParkingSpace;
use crate::services::sampler::DistanceSampler;
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct MainCycle {
    spaces: SmallVec<[ParkingSpace; 4]>,
    /// This cycle's reading per space, reused by `nearest_free`
    samples: SmallVec<[Distance; 4]>,
    sampler: DistanceSampler,
    indicators: Box<dyn SpaceIndicators>,
    display: Box<dyn StatusDisplay>,
    debounce: Duration,
    cycle_interval: Duration,
    availability_tx: watch::Sender<Availability>,
    access_tx: mpsc::Sender<CredentialEvent>,
    log: Arc<AccessLog>,
    metrics: Arc<Metrics>,
}

impl MainCycle {
    /// Build the cycle and bring up the display.
    ///
    /// Fails only if the display cannot be initialized.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        thresholds_cm: &[f32],
        sampler: DistanceSampler,
        indicators: Box<dyn SpaceIndicators>,
        mut display: Box<dyn StatusDisplay>,
        debounce: Duration,
        cycle_interval: Duration,
        availability_tx: watch::Sender<Availability>,
        access_tx: mpsc::Sender<CredentialEvent>,
        log: Arc<AccessLog>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, HardwareError> {
        display.init()?;

        let spaces: SmallVec<[ParkingSpace; 4]> = thresholds_cm
            .iter()
            .enumerate()
            .map(|(i, cm)| ParkingSpace::new(SpaceIndex(i), Distance(*cm)))
            .collect();
        let samples = spaces.iter().map(|_| Distance::NO_ECHO).collect();

        info!(
            spaces = %spaces.len(),
            debounce_ms = %debounce.as_millis(),
            cycle_interval_ms = %cycle_interval.as_millis(),
            "main_cycle_created"
        );

        Ok(Self {
            spaces,
            samples,
            sampler,
            indicators,
            display,
            debounce,
            cycle_interval,
            availability_tx,
            access_tx,
            log,
            metrics,
        })
    }

    pub fn spaces(&self) -> &[ParkingSpace] {
        &self.spaces
    }

    /// Run until shutdown
    pub async fn run(
        mut self,
        mut card_rx: mpsc::Receiver<Credential>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reader_open = true;

        info!("main_cycle_started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                card = card_rx.recv(), if reader_open => {
                    match card {
                        Some(credential) => self.present(credential),
                        None => {
                            warn!("card_reader_closed");
                            reader_open = false;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.step().await;
                }
            }
        }

        info!("main_cycle_stopped");
    }

    /// One sensing cycle. Returns the availability it published.
    pub async fn step(&mut self) -> Availability {
        let cycle_start = Instant::now();

        for i in 0..self.spaces.len() {
            let index = SpaceIndex(i);
            let sample = self.sampler.measure(index).await;
            self.samples[i] = sample;

            let space = &mut self.spaces[i];
            if let Some(occupied) = space.observe(sample, Instant::now(), self.debounce) {
                self.metrics.record_occupancy_flip();
                info!(
                    space = %index,
                    occupied = %occupied,
                    distance = %sample,
                    "space_occupancy_changed"
                );
            }
            self.indicators.show(index, IndicatorColor::for_occupied(space.occupied()));
        }

        let availability = Availability::evaluate(&self.spaces, &self.samples);
        self.availability_tx.send_if_modified(|current| {
            if *current != availability {
                debug!(
                    any_free = %availability.any_free,
                    free_count = %availability.free_count,
                    nearest_free = ?availability.nearest_free.map(|s| s.number()),
                    "availability_changed"
                );
                *current = availability;
                true
            } else {
                false
            }
        });

        self.display.show(&StatusScreen::for_availability(&availability));

        self.metrics.record_cycle(cycle_start.elapsed().as_micros() as u64);
        availability
    }

    /// Hand a credential to the access worker without waiting
    pub fn present(&self, credential: Credential) {
        let (event, reason) = match self.access_tx.try_send(CredentialEvent::new(credential)) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => (event, "access worker busy"),
            Err(TrySendError::Closed(event)) => (event, "access worker stopped"),
        };
        self.metrics.record_credential_dropped();
        self.log.append(
            &format!("RFID access attempt dropped: {}", reason),
            Some(&event.credential),
        );
        warn!(uid = %event.credential, reason = %reason, "credential_dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::display::ConsoleDisplay;
    use crate::io::sim::SimulatedHardware;
    use crate::services::debouncer::OccupancyState;
    use tempfile::TempDir;

    struct Bench {
        cycle: MainCycle,
        hw: SimulatedHardware,
        display: ConsoleDisplay,
        availability_rx: watch::Receiver<Availability>,
        access_rx: mpsc::Receiver<CredentialEvent>,
        log: Arc<AccessLog>,
        _dir: TempDir,
    }

    fn bench() -> Bench {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(AccessLog::open(dir.path().join("access_log.txt")));
        let hw = SimulatedHardware::new(2);
        let display = ConsoleDisplay::new(10);
        let (availability_tx, availability_rx) = watch::channel(Availability::all_free(2));
        let (access_tx, access_rx) = mpsc::channel(1);
        let cycle = MainCycle::new(
            &[16.92, 18.54],
            DistanceSampler::new(Arc::new(hw.clone()), Duration::from_millis(40)),
            Box::new(hw.clone()),
            Box::new(display.clone()),
            Duration::from_millis(500),
            Duration::from_millis(100),
            availability_tx,
            access_tx,
            log.clone(),
            Arc::new(Metrics::new()),
        )
        .unwrap();
        Bench { cycle, hw, display, availability_rx, access_rx, log, _dir: dir }
    }

    #[tokio::test(start_paused = true)]
    async fn test_space_occupied_after_debounce() {
        let mut b = bench();
        b.hw.set_distance(SpaceIndex(0), Some(Distance(10.0))).unwrap();
        b.hw.set_distance(SpaceIndex(1), Some(Distance(30.0))).unwrap();

        // 600ms of cycles at 100ms
        for _ in 0..7 {
            b.cycle.step().await;
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        assert_eq!(b.cycle.spaces()[0].state(), OccupancyState::Occupied);
        assert_eq!(b.cycle.spaces()[1].state(), OccupancyState::Free);
        assert_eq!(b.hw.indicator(SpaceIndex(0)), Some(IndicatorColor::Red));
        assert_eq!(b.hw.indicator(SpaceIndex(1)), Some(IndicatorColor::Green));

        let availability = *b.availability_rx.borrow();
        assert!(availability.any_free);
        assert_eq!(availability.nearest_free, Some(SpaceIndex(1)));
        assert_eq!(b.display.current().unwrap().line1, "Space 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_occupied_screen() {
        let mut b = bench();
        b.hw.set_distance(SpaceIndex(0), Some(Distance(5.0))).unwrap();
        b.hw.set_distance(SpaceIndex(1), Some(Distance(5.0))).unwrap();

        for _ in 0..7 {
            b.cycle.step().await;
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        assert!(!b.availability_rx.borrow().any_free);
        let screen = b.display.current().unwrap();
        assert_eq!((screen.line1.as_str(), screen.line2.as_str()), ("ALL", "OCCUPIED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nearest_free_uses_fresh_samples() {
        let mut b = bench();
        b.hw.set_distance(SpaceIndex(0), Some(Distance(40.0))).unwrap();
        b.hw.set_distance(SpaceIndex(1), Some(Distance(25.0))).unwrap();

        let availability = b.cycle.step().await;
        assert_eq!(availability.nearest_free, Some(SpaceIndex(1)));

        // No echo reads as the farthest possible distance
        b.hw.set_distance(SpaceIndex(1), None).unwrap();
        let availability = b.cycle.step().await;
        assert_eq!(availability.nearest_free, Some(SpaceIndex(0)));
    }

    #[tokio::test]
    async fn test_present_drops_when_worker_busy() {
        let mut b = bench();
        b.cycle.present(Credential::new("AB12"));
        b.cycle.present(Credential::new("CD34"));

        assert_eq!(b.access_rx.recv().await.unwrap().credential, Credential::new("AB12"));
        assert!(b.access_rx.try_recv().is_err());
        assert_eq!(b.cycle.metrics.report().credentials_dropped, 1);

        let lines = b.log.read_all().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("RFID access attempt dropped: access worker busy (UID: CD34)"));
    }

    #[tokio::test]
    async fn test_present_logs_when_worker_stopped() {
        let mut b = bench();
        b.access_rx.close();
        b.cycle.present(Credential::new("AB12"));

        assert_eq!(b.cycle.metrics.report().credentials_dropped, 1);
        let lines = b.log.read_all().unwrap();
        assert!(lines[0].ends_with("RFID access attempt dropped: access worker stopped (UID: AB12)"));
    }

    #[test]
    fn test_display_init_failure_is_fatal() {
        let hw = SimulatedHardware::new(1);
        let (availability_tx, _rx) = watch::channel(Availability::all_free(1));
        let (access_tx, _access_rx) = mpsc::channel(1);
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(AccessLog::open(dir.path().join("access_log.txt")));
        let result = MainCycle::new(
            &[16.92],
            DistanceSampler::new(Arc::new(hw.clone()), Duration::from_millis(40)),
            Box::new(hw),
            Box::new(ConsoleDisplay::new(2)),
            Duration::from_millis(500),
            Duration::from_millis(100),
            availability_tx,
            access_tx,
            log,
            Arc::new(Metrics::new()),
        );
        assert!(matches!(result, Err(HardwareError::DisplayInit(_))));
    }
}
