//! Outcome and anomaly counters.

use serde::Serialize;

use crate::admission::{Decision, DenialReason};

/// Monotonic counters for one simulation run. Never reset.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Requests booked at their requested hour.
    pub confirmed: u64,
    /// Requests booked at a later hour.
    pub reprogrammed: u64,
    /// Denials: hour outside the operating day.
    pub denied_out_of_range: u64,
    /// Denials: party larger than capacity.
    pub denied_over_capacity: u64,
    /// Denials: past hour with no later block free.
    pub denied_late: u64,
    /// Denials: no block free before close.
    pub denied_no_capacity: u64,
    /// Responses dropped because the requester was not registered.
    pub unknown_agent_drops: u64,
    /// Inbound lines dropped as malformed.
    pub malformed_messages: u64,
}

impl Statistics {
    /// Increments the counter matching a decision. Called exactly once per
    /// processed request.
    pub fn record(&mut self, decision: Decision) {
        match decision {
            Decision::Confirmed { .. } => self.confirmed += 1,
            Decision::Reprogrammed { .. } => self.reprogrammed += 1,
            Decision::Denied { reason } => match reason {
                DenialReason::OutOfRange => self.denied_out_of_range += 1,
                DenialReason::OverCapacity => self.denied_over_capacity += 1,
                DenialReason::Late => self.denied_late += 1,
                DenialReason::NoCapacity => self.denied_no_capacity += 1,
            },
        }
    }

    /// Total requests that received a decision.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.confirmed
            + self.reprogrammed
            + self.denied_out_of_range
            + self.denied_over_capacity
            + self.denied_late
            + self.denied_no_capacity
    }

    /// Total denials across all reasons.
    #[must_use]
    pub const fn denied(&self) -> u64 {
        self.denied_out_of_range
            + self.denied_over_capacity
            + self.denied_late
            + self.denied_no_capacity
    }
}
