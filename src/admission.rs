//! The admission-control decision algorithm.
//!
//! Given one reservation request and the current clock/ledger state, produce
//! exactly one [`Decision`] and mutate the ledger only on the branches that
//! book a block. The evaluation order is fixed; the first matching rule wins:
//!
//! 1. hour outside the operating day, or party larger than total capacity:
//!    deny without touching the ledger;
//! 2. hour already in the past: search forward from the *current* hour and
//!    reprogram, else deny as late;
//! 3. the requested block fits: confirm;
//! 4. otherwise search forward from the requested hour and reprogram, else
//!    deny for lack of capacity before close.

use serde::Serialize;

use crate::clock::SimClock;
use crate::ledger::OccupancyLedger;
use crate::stats::Statistics;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Requested hour outside `[open_hour, close_hour]`.
    OutOfRange,
    /// Party larger than the park's per-hour capacity.
    OverCapacity,
    /// Requested hour already past and no later block fits.
    Late,
    /// No block fits before the day ends.
    NoCapacity,
}

/// Outcome of one processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// Booked at the requested hour.
    Confirmed {
        /// First hour of the booked block.
        start_hour: u8,
    },
    /// Booked at a later hour than requested.
    Reprogrammed {
        /// First hour of the booked block.
        start_hour: u8,
    },
    /// Not booked.
    Denied {
        /// The first matching denial rule.
        reason: DenialReason,
    },
}

/// One reservation request as seen by the admission controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    /// Family asking for the block.
    pub family: String,
    /// Hour the family asked for.
    pub hour: u8,
    /// People in the party.
    pub party_size: u32,
}

/// Decides one request against the current clock and ledger.
///
/// Branches that book do so through the ledger's atomic `try_reserve`;
/// denying branches perform no mutation. The matching statistics counter is
/// incremented exactly once.
pub fn decide(
    request: &ReservationRequest,
    clock: &SimClock,
    ledger: &mut OccupancyLedger,
    stats: &mut Statistics,
) -> Decision {
    let decision = evaluate(request, clock, ledger);
    stats.record(decision);
    decision
}

fn evaluate(
    request: &ReservationRequest,
    clock: &SimClock,
    ledger: &mut OccupancyLedger,
) -> Decision {
    let hour = request.hour;

    // Rule 1: range and capacity screens, no mutation.
    if hour < ledger.open_hour() || hour > ledger.close_hour() {
        return Decision::Denied {
            reason: DenialReason::OutOfRange,
        };
    }
    if request.party_size > ledger.capacity() {
        return Decision::Denied {
            reason: DenialReason::OverCapacity,
        };
    }

    // Rule 2: a request for a past hour can only be honored in the future,
    // so the search restarts at the current hour, not the requested one.
    if hour < clock.current_hour() {
        return match ledger.earliest_available(clock.current_hour(), request.party_size) {
            Some(start) if ledger.try_reserve(&request.family, start, request.party_size) => {
                Decision::Reprogrammed { start_hour: start }
            }
            _ => Decision::Denied {
                reason: DenialReason::Late,
            },
        };
    }

    // Rule 3: exact match at the requested hour.
    if ledger.try_reserve(&request.family, hour, request.party_size) {
        return Decision::Confirmed { start_hour: hour };
    }

    // Rule 4: earliest later block, if any fits before close.
    match ledger.earliest_available(hour, request.party_size) {
        Some(start) if ledger.try_reserve(&request.family, start, request.party_size) => {
            Decision::Reprogrammed { start_hour: start }
        }
        _ => Decision::Denied {
            reason: DenialReason::NoCapacity,
        },
    }
}
