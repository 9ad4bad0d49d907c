//! The park controller: one owned state aggregate and its handlers.
//!
//! `ParkController` owns {clock, ledger, registry, statistics} as a single
//! unit of mutable state. It is not synchronized - exactly one loop (the
//! [`runtime`]) drives it, so every operation observes and leaves fully
//! consistent state. Handlers never perform delivery I/O; they return the
//! [`Delivery`] batch for the caller to flush after the mutation completes,
//! so a slow or dead recipient can never stall a state operation.

pub mod runtime;

use std::sync::Arc;

use tracing::{info, warn};

use crate::admission::{self, ReservationRequest};
use crate::channel::{IntakeEvent, ReplyConnector, ReplySender};
use crate::clock::{ClockStep, SimClock};
use crate::config::SimulationConfig;
use crate::ledger::OccupancyLedger;
use crate::protocol::{Inbound, Outbound};
use crate::registry::AgentRegistry;
use crate::report::FinalReport;
use crate::stats::Statistics;

/// One outbound message bound for one recipient.
///
/// Produced under state access, flushed outside it.
pub struct Delivery {
    /// Where to deliver.
    pub reply: Arc<dyn ReplySender>,
    /// What to deliver.
    pub message: Outbound,
}

impl Delivery {
    fn to(reply: Arc<dyn ReplySender>, message: Outbound) -> Self {
        Self { reply, message }
    }

    /// Sends the message, logging (not propagating) a failure.
    ///
    /// Per-recipient isolation: a failed delivery never aborts the batch it
    /// belongs to.
    pub fn flush(self) {
        if let Err(err) = self.reply.send(&self.message) {
            warn!(
                address = self.reply.address(),
                error = %err,
                "outbound delivery failed"
            );
        }
    }
}

/// Admission-control and scheduling engine for one simulated day.
pub struct ParkController {
    config: SimulationConfig,
    clock: SimClock,
    ledger: OccupancyLedger,
    registry: AgentRegistry,
    stats: Statistics,
    connector: Box<dyn ReplyConnector>,
}

impl ParkController {
    /// Creates a controller for a validated configuration.
    #[must_use]
    pub fn new(config: SimulationConfig, connector: Box<dyn ReplyConnector>) -> Self {
        Self {
            clock: SimClock::new(&config),
            ledger: OccupancyLedger::new(&config),
            registry: AgentRegistry::new(),
            stats: Statistics::default(),
            config,
            connector,
        }
    }

    /// Applies one intake event and returns the deliveries it produced.
    pub fn handle(&mut self, event: IntakeEvent) -> Vec<Delivery> {
        match event {
            IntakeEvent::Message(Inbound::Register { agent, reply_to }) => {
                self.handle_register(&agent, &reply_to)
            }
            IntakeEvent::Message(Inbound::Request {
                agent,
                family,
                hour,
                party_size,
            }) => self.handle_request(&agent, family, hour, party_size),
            IntakeEvent::Message(Inbound::Close { agent }) => {
                self.registry.remove(&agent);
                info!(agent = %agent, "agent closed");
                Vec::new()
            }
            IntakeEvent::Malformed => {
                self.stats.malformed_messages += 1;
                Vec::new()
            }
        }
    }

    fn handle_register(&mut self, agent: &str, reply_to: &str) -> Vec<Delivery> {
        let reply = match self.connector.connect(reply_to) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(agent, reply_to, error = %err, "registration failed");
                return Vec::new();
            }
        };
        self.registry.register(agent, Arc::clone(&reply));
        info!(agent, reply_to, "agent registered");
        vec![Delivery::to(
            reply,
            Outbound::Time {
                hour: self.clock.current_hour(),
            },
        )]
    }

    fn handle_request(
        &mut self,
        agent: &str,
        family: String,
        hour: u8,
        party_size: u32,
    ) -> Vec<Delivery> {
        info!(agent, family = %family, hour, party_size, "reservation request");
        let request = ReservationRequest {
            family,
            hour,
            party_size,
        };
        let decision = admission::decide(
            &request,
            &self.clock,
            &mut self.ledger,
            &mut self.stats,
        );
        info!(agent, family = %request.family, ?decision, "request resolved");

        let Some(requester) = self.registry.lookup(agent) else {
            // Reportable anomaly, not a fatal error: the decision stands,
            // only its response has nowhere to go.
            self.stats.unknown_agent_drops += 1;
            warn!(agent, "dropping response for unregistered agent");
            return Vec::new();
        };
        vec![Delivery::to(
            Arc::clone(&requester.reply),
            Outbound::Response {
                family: request.family,
                decision,
            },
        )]
    }

    /// Advances the clock by one hour.
    ///
    /// While the day lasts, logs the hour transition and returns a TIME
    /// broadcast for every registered agent. On the terminal transition no
    /// deliveries are produced; END is broadcast separately once the
    /// dispatch loop has stopped.
    pub fn handle_tick(&mut self) -> (ClockStep, Vec<Delivery>) {
        let step = self.clock.advance();
        match step {
            ClockStep::Running(hour) => {
                self.log_hour_transition(hour);
                let broadcast = self
                    .registry
                    .iter()
                    .map(|agent| Delivery::to(Arc::clone(&agent.reply), Outbound::Time { hour }))
                    .collect();
                (step, broadcast)
            }
            ClockStep::Terminal => {
                info!("closing hour passed, simulation day over");
                (step, Vec::new())
            }
        }
    }

    fn log_hour_transition(&self, hour: u8) {
        let entering: u32 = self.ledger.entering_at(hour).map(|r| r.party_size).sum();
        let entering_families: Vec<&str> = self
            .ledger
            .entering_at(hour)
            .map(|r| r.family.as_str())
            .collect();
        let leaving: u32 = self.ledger.leaving_at(hour).map(|r| r.party_size).sum();
        let leaving_families: Vec<&str> = self
            .ledger
            .leaving_at(hour)
            .map(|r| r.family.as_str())
            .collect();
        info!(
            hour,
            entering,
            ?entering_families,
            leaving,
            ?leaving_families,
            occupancy = self.ledger.occupied_at(hour),
            capacity = self.ledger.capacity(),
            "hour transition"
        );
    }

    /// END broadcast for every still-registered agent, best-effort.
    #[must_use]
    pub fn end_broadcast(&self) -> Vec<Delivery> {
        self.registry
            .iter()
            .map(|agent| Delivery::to(Arc::clone(&agent.reply), Outbound::End))
            .collect()
    }

    /// Builds the final report from the (frozen) ledger and statistics.
    #[must_use]
    pub fn report(&self) -> FinalReport {
        FinalReport::new(&self.config, &self.ledger, &self.stats)
    }

    /// The simulated clock.
    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// The occupancy ledger.
    #[must_use]
    pub fn ledger(&self) -> &OccupancyLedger {
        &self.ledger
    }

    /// The statistics counters.
    #[must_use]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// The agent registry.
    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{Decision, DenialReason};
    use crate::channel::memory::MemoryHub;
    use std::time::Duration;

    fn config() -> SimulationConfig {
        SimulationConfig {
            open_hour: 7,
            close_hour: 19,
            capacity: 10,
            tick: Duration::from_millis(10),
        }
    }

    fn controller(hub: &MemoryHub) -> ParkController {
        ParkController::new(config(), Box::new(hub.clone()))
    }

    fn register(ctl: &mut ParkController, agent: &str) {
        let deliveries = ctl.handle(IntakeEvent::Message(Inbound::Register {
            agent: agent.to_string(),
            reply_to: agent.to_string(),
        }));
        for d in deliveries {
            d.flush();
        }
    }

    #[test]
    fn register_delivers_current_time() {
        let hub = MemoryHub::new();
        let rx = hub.open("a1");
        let mut ctl = controller(&hub);
        register(&mut ctl, "a1");
        assert_eq!(rx.try_recv(), Ok(Outbound::Time { hour: 7 }));
        assert_eq!(ctl.registry().len(), 1);
    }

    #[test]
    fn register_with_unknown_address_is_dropped() {
        let hub = MemoryHub::new();
        let mut ctl = controller(&hub);
        let deliveries = ctl.handle(IntakeEvent::Message(Inbound::Register {
            agent: "ghost".to_string(),
            reply_to: "nowhere".to_string(),
        }));
        assert!(deliveries.is_empty());
        assert!(ctl.registry().is_empty());
    }

    #[test]
    fn request_produces_exactly_one_response() {
        let hub = MemoryHub::new();
        let rx = hub.open("a1");
        let mut ctl = controller(&hub);
        register(&mut ctl, "a1");
        let _ = rx.try_recv();

        let deliveries = ctl.handle(IntakeEvent::Message(Inbound::Request {
            agent: "a1".to_string(),
            family: "Perez".to_string(),
            hour: 9,
            party_size: 5,
        }));
        assert_eq!(deliveries.len(), 1);
        for d in deliveries {
            d.flush();
        }
        assert_eq!(
            rx.try_recv(),
            Ok(Outbound::Response {
                family: "Perez".to_string(),
                decision: Decision::Confirmed { start_hour: 9 },
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unknown_requester_counts_anomaly_but_still_books() {
        let hub = MemoryHub::new();
        let mut ctl = controller(&hub);
        let deliveries = ctl.handle(IntakeEvent::Message(Inbound::Request {
            agent: "never-registered".to_string(),
            family: "Perez".to_string(),
            hour: 9,
            party_size: 5,
        }));
        assert!(deliveries.is_empty());
        assert_eq!(ctl.stats().unknown_agent_drops, 1);
        assert_eq!(ctl.stats().confirmed, 1);
        assert_eq!(ctl.ledger().occupied_at(9), 5);
    }

    #[test]
    fn tick_broadcasts_time_to_all_agents() {
        let hub = MemoryHub::new();
        let rx1 = hub.open("a1");
        let rx2 = hub.open("a2");
        let mut ctl = controller(&hub);
        register(&mut ctl, "a1");
        register(&mut ctl, "a2");
        let _ = (rx1.try_recv(), rx2.try_recv());

        let (step, deliveries) = ctl.handle_tick();
        assert_eq!(step, ClockStep::Running(8));
        assert_eq!(deliveries.len(), 2);
        for d in deliveries {
            d.flush();
        }
        assert_eq!(rx1.try_recv(), Ok(Outbound::Time { hour: 8 }));
        assert_eq!(rx2.try_recv(), Ok(Outbound::Time { hour: 8 }));
    }

    #[test]
    fn broadcast_survives_one_dead_recipient() {
        let hub = MemoryHub::new();
        let rx1 = hub.open("a1");
        let rx2 = hub.open("a2");
        let mut ctl = controller(&hub);
        register(&mut ctl, "a1");
        register(&mut ctl, "a2");
        let _ = rx2.try_recv();
        drop(rx1); // a1's queue is gone

        let (_, deliveries) = ctl.handle_tick();
        for d in deliveries {
            d.flush();
        }
        assert_eq!(rx2.try_recv(), Ok(Outbound::Time { hour: 8 }));
    }

    #[test]
    fn terminal_tick_produces_no_deliveries() {
        let hub = MemoryHub::new();
        let rx = hub.open("a1");
        let mut cfg = config();
        cfg.close_hour = 7;
        let mut ctl = ParkController::new(cfg, Box::new(hub.clone()));
        register(&mut ctl, "a1");
        let _ = rx.try_recv();

        let (step, deliveries) = ctl.handle_tick();
        assert_eq!(step, ClockStep::Terminal);
        assert!(deliveries.is_empty());
        assert!(rx.try_recv().is_err());

        let end = ctl.end_broadcast();
        assert_eq!(end.len(), 1);
    }

    #[test]
    fn malformed_marker_only_bumps_counter() {
        let hub = MemoryHub::new();
        let mut ctl = controller(&hub);
        assert!(ctl.handle(IntakeEvent::Malformed).is_empty());
        assert_eq!(ctl.stats().malformed_messages, 1);
        assert_eq!(ctl.stats().processed(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let hub = MemoryHub::new();
        let _rx = hub.open("a1");
        let mut ctl = controller(&hub);
        register(&mut ctl, "a1");
        for _ in 0..2 {
            let deliveries = ctl.handle(IntakeEvent::Message(Inbound::Close {
                agent: "a1".to_string(),
            }));
            assert!(deliveries.is_empty());
        }
        assert!(ctl.registry().is_empty());
    }

    #[test]
    fn denied_request_still_gets_a_response() {
        let hub = MemoryHub::new();
        let rx = hub.open("a1");
        let mut ctl = controller(&hub);
        register(&mut ctl, "a1");
        let _ = rx.try_recv();

        let deliveries = ctl.handle(IntakeEvent::Message(Inbound::Request {
            agent: "a1".to_string(),
            family: "Big".to_string(),
            hour: 10,
            party_size: 11,
        }));
        for d in deliveries {
            d.flush();
        }
        assert_eq!(
            rx.try_recv(),
            Ok(Outbound::Response {
                family: "Big".to_string(),
                decision: Decision::Denied {
                    reason: DenialReason::OverCapacity,
                },
            })
        );
    }
}
