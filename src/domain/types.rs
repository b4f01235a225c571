//! Shared types for the parking gate controller

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Newtype wrapper for parking space positions (0..N-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SpaceIndex(pub usize);

impl SpaceIndex {
    /// Human-facing space number, as shown on the display and LEDs (1-based)
    #[inline]
    pub fn number(&self) -> usize {
        self.0 + 1
    }

    /// Convert a 1-based space number back into an index
    pub fn from_number(number: usize) -> Option<Self> {
        number.checked_sub(1).map(SpaceIndex)
    }
}

/// Displays the 1-based space number
impl std::fmt::Display for SpaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Distance reported by an ultrasonic channel, in centimeters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Distance(pub f32);

impl Distance {
    /// Sentinel returned when no echo came back. Never below any threshold.
    pub const NO_ECHO: Distance = Distance(f32::INFINITY);

    #[inline]
    pub fn cm(&self) -> f32 {
        self.0
    }

    #[inline]
    pub fn is_no_echo(&self) -> bool {
        !self.0.is_finite()
    }

    /// True when this reading counts as "something parked" for the threshold
    #[inline]
    pub fn is_below(&self, threshold: Distance) -> bool {
        self.0 < threshold.0
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_no_echo() {
            f.write_str("no_echo")
        } else {
            write!(f, "{:.2}cm", self.0)
        }
    }
}

/// Access credential identifier as presented by the proximity reader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Render raw UID bytes the way the reader firmware does: uppercase hex
    /// per byte, no zero padding (`[0x0A, 0xB1]` becomes `"AB1"`).
    pub fn from_uid_bytes(bytes: &[u8]) -> Self {
        let mut uid = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            // Writing to a String cannot fail
            let _ = write!(uid, "{:X}", byte);
        }
        Self(uid)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-color occupancy light per space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Green,
    Red,
}

impl IndicatorColor {
    #[inline]
    pub fn for_occupied(occupied: bool) -> Self {
        if occupied {
            IndicatorColor::Red
        } else {
            IndicatorColor::Green
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorColor::Green => "green",
            IndicatorColor::Red => "red",
        }
    }
}
