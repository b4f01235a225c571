//! Status display - two centered lines refreshed once per main cycle

use crate::io::hardware::HardwareError;
use crate::services::availability::Availability;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Narrowest display that fits every screen without truncation
pub const MIN_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusScreen {
    pub line1: String,
    pub line2: String,
}

impl StatusScreen {
    /// `Space K` / `FREE` for the nearest free space, else `ALL` / `OCCUPIED`
    pub fn for_availability(availability: &Availability) -> Self {
        match availability.nearest_free {
            Some(space) if availability.any_free => {
                Self { line1: format!("Space {}", space.number()), line2: "FREE".to_string() }
            }
            _ => Self { line1: "ALL".to_string(), line2: "OCCUPIED".to_string() },
        }
    }

    /// Both lines padded on the left to sit centered in `width` columns
    pub fn centered(&self, width: usize) -> [String; 2] {
        [center(&self.line1, width), center(&self.line2, width)]
    }
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let pad = width.saturating_sub(len) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

pub trait StatusDisplay: Send {
    /// Bring the panel up. Failure is fatal at startup.
    fn init(&mut self) -> Result<(), HardwareError>;

    fn show(&mut self, screen: &StatusScreen);
}

/// Display backend that writes screen changes to the log
#[derive(Clone)]
pub struct ConsoleDisplay {
    width: usize,
    current: Arc<Mutex<Option<StatusScreen>>>,
}

impl ConsoleDisplay {
    pub fn new(width: usize) -> Self {
        Self { width, current: Arc::new(Mutex::new(None)) }
    }

    /// Last screen shown
    pub fn current(&self) -> Option<StatusScreen> {
        self.current.lock().clone()
    }
}

impl StatusDisplay for ConsoleDisplay {
    fn init(&mut self) -> Result<(), HardwareError> {
        if self.width < MIN_WIDTH {
            return Err(HardwareError::DisplayInit(format!(
                "width {} is below the minimum of {}",
                self.width, MIN_WIDTH
            )));
        }
        info!(width = %self.width, "status_display_initialized");
        Ok(())
    }

    fn show(&mut self, screen: &StatusScreen) {
        let mut current = self.current.lock();
        if current.as_ref() == Some(screen) {
            return;
        }
        let [line1, line2] = screen.centered(self.width);
        info!(line1 = %line1, line2 = %line2, "status_display_changed");
        *current = Some(screen.clone());
    }
}
