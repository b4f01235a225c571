//! Availability oracle - facility-wide view over per-space occupancy
//!
//! `any_free` alone gates barrier opening. `nearest_free` only feeds the
//! status display.

use crate::domain::types::{Distance, SpaceIndex};
use crate::services::debouncer::ParkingSpace;

/// True iff at least one space is not occupied
pub fn any_free(spaces: &[ParkingSpace]) -> bool {
    spaces.iter().any(|space| !space.occupied())
}

/// Free space with the smallest fresh sample.
///
/// `samples[i]` is this cycle's reading for `spaces[i]`. Ties keep the first
/// space seen (lowest index). Spaces without a sample are skipped.
pub fn nearest_free(spaces: &[ParkingSpace], samples: &[Distance]) -> Option<SpaceIndex> {
    let mut best: Option<(SpaceIndex, Distance)> = None;

    for (space, sample) in spaces.iter().zip(samples) {
        if space.occupied() {
            continue;
        }
        match best {
            Some((_, best_distance)) if sample.cm() >= best_distance.cm() => {}
            _ => best = Some((space.index(), *sample)),
        }
    }

    best.map(|(index, _)| index)
}

/// Snapshot published by the main cycle once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub any_free: bool,
    pub nearest_free: Option<SpaceIndex>,
    pub free_count: usize,
    pub total: usize,
}

impl Availability {
    pub fn evaluate(spaces: &[ParkingSpace], samples: &[Distance]) -> Self {
        Self {
            any_free: any_free(spaces),
            nearest_free: nearest_free(spaces, samples),
            free_count: spaces.iter().filter(|space| !space.occupied()).count(),
            total: spaces.len(),
        }
    }

    /// Startup value before the first cycle: every space starts free
    pub fn all_free(total: usize) -> Self {
        Self {
            any_free: total > 0,
            nearest_free: if total > 0 { Some(SpaceIndex(0)) } else { None },
            free_count: total,
            total,
        }
    }
}
