//! Simulation configuration.
//!
//! The configuration surface is owned by the binaries; the core consumes a
//! validated [`SimulationConfig`]. Invalid configuration is a startup-time
//! failure, never a runtime concern.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Earliest hour the park can ever open.
pub const HOUR_MIN: u8 = 7;

/// Latest hour the park can ever close.
pub const HOUR_MAX: u8 = 19;

/// Fixed duration of every reservation, in simulated hours.
pub const RESERVATION_HOURS: u8 = 2;

/// Validated parameters for one simulated operating day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// First operating hour (inclusive).
    pub open_hour: u8,

    /// Last operating hour (inclusive).
    pub close_hour: u8,

    /// Maximum people present during any single hour.
    pub capacity: u32,

    /// Real time per simulated hour advance.
    pub tick: Duration,
}

impl SimulationConfig {
    /// Checks all invariants the core relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated [`ConfigError`]: hours outside
    /// `[HOUR_MIN, HOUR_MAX]`, inverted hours, zero capacity, or a zero
    /// tick interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.open_hour, self.close_hour] {
            if !(HOUR_MIN..=HOUR_MAX).contains(&value) {
                return Err(ConfigError::HourOutOfRange {
                    value,
                    min: HOUR_MIN,
                    max: HOUR_MAX,
                });
            }
        }
        if self.open_hour > self.close_hour {
            return Err(ConfigError::InvertedHours {
                open: self.open_hour,
                close: self.close_hour,
            });
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    /// Number of hours in the operating day.
    #[must_use]
    pub fn hours(&self) -> usize {
        usize::from(self.close_hour - self.open_hour) + 1
    }
}
