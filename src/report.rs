//! The end-of-day report.
//!
//! Built only after the clock and dispatcher have fully stopped, from the
//! frozen ledger and statistics; no locking is involved because nothing
//! mutates anymore.

use std::fmt;

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::ledger::OccupancyLedger;
use crate::stats::Statistics;

/// Occupancy of one operating hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourOccupancy {
    /// The hour.
    pub hour: u8,
    /// People present during it.
    pub occupied: u32,
}

/// Frozen summary of one simulated day.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    /// First operating hour.
    pub open_hour: u8,
    /// Last operating hour.
    pub close_hour: u8,
    /// Per-hour capacity limit.
    pub capacity: u32,
    /// The day's maximum per-hour occupancy.
    pub peak_occupancy: u32,
    /// Hours holding the maximum occupancy.
    pub peak_hours: Vec<u8>,
    /// The day's minimum per-hour occupancy.
    pub quiet_occupancy: u32,
    /// Hours holding the minimum occupancy.
    pub quiet_hours: Vec<u8>,
    /// Occupancy of every operating hour, in order.
    pub hourly: Vec<HourOccupancy>,
    /// Outcome and anomaly counters.
    pub stats: Statistics,
}

impl FinalReport {
    /// Assembles the report from the frozen ledger and statistics.
    #[must_use]
    pub fn new(config: &SimulationConfig, ledger: &OccupancyLedger, stats: &Statistics) -> Self {
        let (peak_occupancy, peak_hours) = ledger.peak_hours();
        let (quiet_occupancy, quiet_hours) = ledger.quiet_hours();
        let hourly = (config.open_hour..=config.close_hour)
            .map(|hour| HourOccupancy {
                hour,
                occupied: ledger.occupied_at(hour),
            })
            .collect();
        Self {
            open_hour: config.open_hour,
            close_hour: config.close_hour,
            capacity: config.capacity,
            peak_occupancy,
            peak_hours,
            quiet_occupancy,
            quiet_hours,
            hourly,
            stats: stats.clone(),
        }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn hour_list(hours: &[u8]) -> String {
    hours
        .iter()
        .map(|h| format!("{h}:00"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== FINAL REPORT =====")?;
        writeln!(
            f,
            "Operating day {}:00-{}:00, capacity {} per hour",
            self.open_hour, self.close_hour, self.capacity
        )?;
        writeln!(
            f,
            "Peak hours ({} visitors): {}",
            self.peak_occupancy,
            hour_list(&self.peak_hours)
        )?;
        writeln!(
            f,
            "Quiet hours ({} visitors): {}",
            self.quiet_occupancy,
            hour_list(&self.quiet_hours)
        )?;
        writeln!(f, "Confirmed at requested hour: {}", self.stats.confirmed)?;
        writeln!(f, "Reprogrammed: {}", self.stats.reprogrammed)?;
        writeln!(
            f,
            "Denied (out of range): {}",
            self.stats.denied_out_of_range
        )?;
        writeln!(
            f,
            "Denied (party over capacity): {}",
            self.stats.denied_over_capacity
        )?;
        writeln!(f, "Denied (late): {}", self.stats.denied_late)?;
        writeln!(
            f,
            "Denied (no block available): {}",
            self.stats.denied_no_capacity
        )?;
        if self.stats.unknown_agent_drops > 0 {
            writeln!(
                f,
                "Responses dropped (unknown agent): {}",
                self.stats.unknown_agent_drops
            )?;
        }
        if self.stats.malformed_messages > 0 {
            writeln!(
                f,
                "Malformed messages dropped: {}",
                self.stats.malformed_messages
            )?;
        }
        write!(f, "========================")
    }
}
