//! The simulated clock.
//!
//! `SimClock` owns the monotonic simulated-hour counter. The wall-clock
//! mapping (one advance per tick interval) is driven by the runtime's ticker;
//! the clock itself only knows its hour and its terminal condition.

use crate::config::SimulationConfig;

/// Outcome of a single clock advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStep {
    /// The day goes on; the new current hour is carried.
    Running(u8),
    /// The day is over. Further advances are no-ops that return `Terminal`.
    Terminal,
}

/// Monotonic simulated-hour counter for one operating day.
///
/// State machine: `RUNNING -> RUNNING` on each advance while
/// `current_hour <= close_hour`, then a one-way transition to `TERMINAL`
/// once the hour passes the closing hour.
#[derive(Debug, Clone)]
pub struct SimClock {
    current_hour: u8,
    close_hour: u8,
    terminal: bool,
}

impl SimClock {
    /// Creates a clock positioned at the opening hour.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            current_hour: config.open_hour,
            close_hour: config.close_hour,
            terminal: false,
        }
    }

    /// The current simulated hour. Never decreases.
    #[must_use]
    pub const fn current_hour(&self) -> u8 {
        self.current_hour
    }

    /// Whether the simulation day has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Advances the hour by one.
    ///
    /// Returns [`ClockStep::Running`] with the new hour while the day lasts,
    /// or [`ClockStep::Terminal`] once `current_hour` passes `close_hour`.
    /// Once terminal, the hour no longer moves.
    pub fn advance(&mut self) -> ClockStep {
        if self.terminal {
            return ClockStep::Terminal;
        }
        self.current_hour += 1;
        if self.current_hour > self.close_hour {
            self.terminal = true;
            return ClockStep::Terminal;
        }
        ClockStep::Running(self.current_hour)
    }
}
