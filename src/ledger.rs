//! Per-hour occupancy accounting.
//!
//! The ledger owns one slot per operating hour and the list of booked
//! reservations. Every reservation covers a fixed two-hour block and is
//! applied to both covered slots or to neither; the check-then-mutate in
//! [`OccupancyLedger::try_reserve`] is the only write path.

use serde::Serialize;

use crate::config::{SimulationConfig, RESERVATION_HOURS};

/// A confirmed booking of one family for a two-hour block.
///
/// Immutable once created; covers hours `[start_hour, start_hour + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    /// Family the block is booked for.
    pub family: String,
    /// Number of people in the party.
    pub party_size: u32,
    /// First covered hour (inclusive).
    pub start_hour: u8,
}

impl Reservation {
    /// Last covered hour (inclusive).
    #[must_use]
    pub const fn end_hour(&self) -> u8 {
        self.start_hour + RESERVATION_HOURS - 1
    }

    /// Whether the block covers the given hour.
    #[must_use]
    pub const fn covers(&self, hour: u8) -> bool {
        hour >= self.start_hour && hour <= self.end_hour()
    }
}

#[derive(Debug, Default, Clone)]
struct Slot {
    occupied: u32,
}

/// Capacity accounting for every hour of the operating day.
#[derive(Debug, Clone)]
pub struct OccupancyLedger {
    open_hour: u8,
    close_hour: u8,
    capacity: u32,
    slots: Vec<Slot>,
    reservations: Vec<Reservation>,
}

impl OccupancyLedger {
    /// Creates an empty ledger for the configured operating day.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            open_hour: config.open_hour,
            close_hour: config.close_hour,
            capacity: config.capacity,
            slots: vec![Slot::default(); config.hours()],
            reservations: Vec::new(),
        }
    }

    /// Per-hour capacity limit.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// First operating hour.
    #[must_use]
    pub const fn open_hour(&self) -> u8 {
        self.open_hour
    }

    /// Last operating hour.
    #[must_use]
    pub const fn close_hour(&self) -> u8 {
        self.close_hour
    }

    fn index(&self, hour: u8) -> Option<usize> {
        if hour < self.open_hour || hour > self.close_hour {
            return None;
        }
        Some(usize::from(hour - self.open_hour))
    }

    /// Latest hour at which a full block can still start.
    const fn last_start_hour(&self) -> u8 {
        self.close_hour - (RESERVATION_HOURS - 1)
    }

    /// Whether a block starting at `start` for `party_size` people fits.
    ///
    /// Both covered hours must lie within the operating day and stay at or
    /// under capacity after adding the party.
    #[must_use]
    pub fn block_available(&self, start: u8, party_size: u32) -> bool {
        if start < self.open_hour || start > self.last_start_hour() {
            return false;
        }
        // Compared as remaining headroom: `occupied + party_size` can wrap
        // for wire-supplied sizes near u32::MAX, the subtraction cannot
        // (occupied <= capacity always holds).
        (start..start + RESERVATION_HOURS).all(|hour| {
            self.index(hour)
                .is_some_and(|i| party_size <= self.capacity - self.slots[i].occupied)
        })
    }

    /// Books a block atomically.
    ///
    /// On success both covered slots gain `party_size` and the reservation is
    /// recorded; on failure nothing is mutated. Returns whether the booking
    /// happened.
    pub fn try_reserve(&mut self, family: &str, start: u8, party_size: u32) -> bool {
        if !self.block_available(start, party_size) {
            return false;
        }
        let base = usize::from(start - self.open_hour);
        for offset in 0..usize::from(RESERVATION_HOURS) {
            self.slots[base + offset].occupied += party_size;
        }
        self.reservations.push(Reservation {
            family: family.to_string(),
            party_size,
            start_hour: start,
        });
        true
    }

    /// Earliest hour from `from` onward where a block would fit.
    ///
    /// Pure query: scans `max(from, open_hour)..=last_start_hour` and returns
    /// the first hour [`Self::try_reserve`] would accept, without mutating.
    #[must_use]
    pub fn earliest_available(&self, from: u8, party_size: u32) -> Option<u8> {
        let start = from.max(self.open_hour);
        (start..=self.last_start_hour()).find(|&hour| self.block_available(hour, party_size))
    }

    /// People present during the given hour. Zero outside the operating day.
    #[must_use]
    pub fn occupied_at(&self, hour: u8) -> u32 {
        self.index(hour).map_or(0, |i| self.slots[i].occupied)
    }

    /// Reservations whose block covers the given hour, in booking order.
    pub fn reservations_at(&self, hour: u8) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(move |r| r.covers(hour))
    }

    /// Reservations whose block starts at the given hour (families entering).
    pub fn entering_at(&self, hour: u8) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .iter()
            .filter(move |r| r.start_hour == hour)
    }

    /// Reservations whose block ended just before the given hour (families
    /// leaving as that hour begins).
    pub fn leaving_at(&self, hour: u8) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .iter()
            .filter(move |r| r.end_hour() + 1 == hour)
    }

    /// Hours holding the day's maximum occupancy, with that occupancy.
    #[must_use]
    pub fn peak_hours(&self) -> (u32, Vec<u8>) {
        self.extreme_hours(|slot, best| slot > best)
    }

    /// Hours holding the day's minimum occupancy, with that occupancy.
    #[must_use]
    pub fn quiet_hours(&self) -> (u32, Vec<u8>) {
        self.extreme_hours(|slot, best| slot < best)
    }

    fn extreme_hours(&self, better: impl Fn(u32, u32) -> bool) -> (u32, Vec<u8>) {
        let mut best = self.slots.first().map_or(0, |s| s.occupied);
        for slot in &self.slots {
            if better(slot.occupied, best) {
                best = slot.occupied;
            }
        }
        let hours = (self.open_hour..=self.close_hour)
            .filter(|&h| self.occupied_at(h) == best)
            .collect();
        (best, hours)
    }
}
