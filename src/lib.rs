//! # parksim - Capacity-constrained park reservation simulator
//!
//! parksim simulates one operating day of a park that accepts reservation
//! requests from independent agent processes while a simulated clock advances
//! in real time. The controller decides, for every request, whether to
//! confirm it at the requested hour, reprogram it to a later feasible hour,
//! or deny it - and guarantees per-hour occupancy never exceeds capacity.
//!
//! ## Core Concepts
//!
//! - **Simulated hour**: one discrete unit of the operating day, advanced at
//!   a fixed real-time interval by the runtime's ticker.
//! - **Block**: the fixed two-consecutive-hour span every reservation
//!   occupies; booked atomically on both hours or not at all.
//! - **Reprogram**: the outcome where a request is satisfied at a later hour
//!   than requested, due to lateness or lack of capacity.
//! - **Agent**: an external client submitting requests for one or more
//!   families over a message channel.
//!
//! ## Architecture
//!
//! All mutable simulation state ({clock, ledger, registry, statistics}) is
//! one aggregate owned by [`ParkController`]. Two event sources - the
//! real-time ticker and the inbound message channel - feed a single
//! serializing loop ([`controller::runtime`]), so no lock exists and requests
//! are strictly ordered by arrival. Outbound deliveries are flushed after
//! each state mutation completes; a slow or dead agent can never stall the
//! clock or other requests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parksim::channel::intake_queue;
//! use parksim::channel::memory::MemoryHub;
//! use parksim::{ControllerRuntime, SimulationConfig};
//! use std::time::Duration;
//!
//! let config = SimulationConfig {
//!     open_hour: 7,
//!     close_hour: 19,
//!     capacity: 10,
//!     tick: Duration::from_secs(2),
//! };
//! config.validate()?;
//!
//! let hub = MemoryHub::new();
//! let (intake_tx, intake_rx) = intake_queue(256);
//! let runtime = ControllerRuntime::start(
//!     config,
//!     Box::new(hub.clone()),
//!     intake_rx,
//!     Box::new(|| {}),
//! )?;
//! // feed registrations and requests through `intake_tx`...
//! let report = runtime.join()?;
//! println!("{report}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod admission;
pub mod agent;
pub mod channel;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod stats;

// Re-export primary types at crate root for convenience
pub use admission::{Decision, DenialReason};
pub use channel::{ChannelError, ReplySender};
pub use clock::{ClockStep, SimClock};
pub use config::SimulationConfig;
pub use controller::runtime::ControllerRuntime;
pub use controller::ParkController;
pub use error::{ConfigError, ParkError, ParkResult, ProtocolError};
pub use ledger::{OccupancyLedger, Reservation};
pub use protocol::{Inbound, Outbound};
pub use registry::AgentRegistry;
pub use report::FinalReport;
pub use stats::Statistics;
