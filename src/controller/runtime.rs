//! The serializing event loop.
//!
//! Two event sources feed one coordinator thread: a periodic ticker
//! (`crossbeam_channel::tick`, one firing per simulated hour) and the
//! intake queue of decoded inbound messages. The coordinator owns the
//! [`ParkController`] outright, so ticks and requests are strictly
//! serialized by arrival with no lock; the tie-break for the last unit of
//! capacity is queue order. Deliveries are flushed between events, never
//! inside a state operation.
//!
//! Termination: the clock's terminal transition is the single authoritative
//! end signal. The loop then exits without draining queued requests, the
//! transport reader is unblocked through the shutdown hook, END is broadcast
//! best-effort, and only then is the report built from the frozen state.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{never, select, Receiver};
use tracing::info;

use crate::channel::{IntakeEvent, ReplyConnector};
use crate::clock::ClockStep;
use crate::config::SimulationConfig;
use crate::controller::{Delivery, ParkController};
use crate::error::{ParkError, ParkResult};
use crate::report::FinalReport;

/// Hook invoked after the loop stops, before the END broadcast; used to
/// unblock a transport reader stuck in a blocking read.
pub type ShutdownHook = Box<dyn FnOnce() + Send>;

/// Handle to a running simulation.
pub struct ControllerRuntime {
    join: JoinHandle<FinalReport>,
}

impl ControllerRuntime {
    /// Spawns the coordinator thread and starts the day.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinator thread cannot be spawned.
    pub fn start(
        config: SimulationConfig,
        connector: Box<dyn ReplyConnector>,
        intake: Receiver<IntakeEvent>,
        shutdown: ShutdownHook,
    ) -> ParkResult<Self> {
        let join = thread::Builder::new()
            .name("parksim-coordinator".to_string())
            .spawn(move || run(config, connector, intake, shutdown))?;
        Ok(Self { join })
    }

    /// Waits for the day to end and returns the final report.
    ///
    /// # Errors
    ///
    /// Returns [`ParkError::Runtime`] if the coordinator thread panicked.
    pub fn join(self) -> ParkResult<FinalReport> {
        self.join
            .join()
            .map_err(|_| ParkError::runtime("coordinator thread panicked"))
    }
}

fn flush(deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        delivery.flush();
    }
}

fn run(
    config: SimulationConfig,
    connector: Box<dyn ReplyConnector>,
    intake: Receiver<IntakeEvent>,
    shutdown: ShutdownHook,
) -> FinalReport {
    let ticker = crossbeam_channel::tick(config.tick);
    let mut controller = ParkController::new(config, connector);
    let mut intake = intake;

    info!(
        open_hour = controller.clock().current_hour(),
        "simulation day started"
    );

    loop {
        select! {
            recv(ticker) -> _ => {
                let (step, deliveries) = controller.handle_tick();
                flush(deliveries);
                if step == ClockStep::Terminal {
                    break;
                }
            }
            recv(intake) -> event => match event {
                Ok(event) => flush(controller.handle(event)),
                Err(_) => {
                    // All intake producers are gone; the clock still has to
                    // run the day out. Park this arm.
                    intake = never();
                }
            },
        }
    }

    // Order matters: unblock the reader first so no request arrives once
    // END is on the wire, then broadcast, then freeze the report.
    shutdown();
    flush(controller.end_broadcast());
    info!("simulation finished");
    controller.report()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Decision;
    use crate::channel::memory::MemoryHub;
    use crate::channel::intake_queue;
    use crate::protocol::{Inbound, Outbound};
    use std::time::Duration;

    fn config(close_hour: u8, tick_ms: u64) -> SimulationConfig {
        SimulationConfig {
            open_hour: 7,
            close_hour,
            capacity: 10,
            tick: Duration::from_millis(tick_ms),
        }
    }

    #[test]
    fn day_runs_to_terminal_and_reports() {
        let hub = MemoryHub::new();
        let rx = hub.open("a1");
        let (tx, intake) = intake_queue(64);

        let runtime = ControllerRuntime::start(
            config(9, 100),
            Box::new(hub.clone()),
            intake,
            Box::new(|| {}),
        )
        .expect("start");

        tx.send(IntakeEvent::Message(Inbound::Register {
            agent: "a1".to_string(),
            reply_to: "a1".to_string(),
        }))
        .expect("send");
        // Registration TIME confirms the agent is in before the day moves.
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(Outbound::Time { hour: 7 })
        );
        tx.send(IntakeEvent::Message(Inbound::Request {
            agent: "a1".to_string(),
            family: "Perez".to_string(),
            hour: 8,
            party_size: 4,
        }))
        .expect("send");

        let report = runtime.join().expect("join");
        assert_eq!(report.stats.confirmed, 1);
        assert_eq!(report.peak_occupancy, 4);

        // The agent saw its response, the tick broadcasts, and END last.
        let received: Vec<Outbound> = rx.try_iter().collect();
        assert!(received.contains(&Outbound::Response {
            family: "Perez".to_string(),
            decision: Decision::Confirmed { start_hour: 8 },
        }));
        assert!(received.contains(&Outbound::Time { hour: 8 }));
        assert_eq!(received.last(), Some(&Outbound::End));
    }

    #[test]
    fn no_message_follows_end() {
        let hub = MemoryHub::new();
        let rx = hub.open("a1");
        let (tx, intake) = intake_queue(64);

        let runtime = ControllerRuntime::start(
            config(8, 100),
            Box::new(hub.clone()),
            intake,
            Box::new(|| {}),
        )
        .expect("start");

        tx.send(IntakeEvent::Message(Inbound::Register {
            agent: "a1".to_string(),
            reply_to: "a1".to_string(),
        }))
        .expect("send");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(Outbound::Time { hour: 7 })
        );

        let _ = runtime.join().expect("join");
        let received: Vec<Outbound> = rx.try_iter().collect();
        let end_at = received
            .iter()
            .position(|m| *m == Outbound::End)
            .expect("END was delivered");
        assert_eq!(end_at, received.len() - 1, "END must be the last message");
    }

    #[test]
    fn shutdown_hook_runs_before_join_returns() {
        let hub = MemoryHub::new();
        let (_tx, intake) = intake_queue(8);
        let (hook_tx, hook_rx) = crossbeam_channel::bounded(1);

        let runtime = ControllerRuntime::start(
            config(7, 10),
            Box::new(hub),
            intake,
            Box::new(move || {
                let _ = hook_tx.send(());
            }),
        )
        .expect("start");

        let _ = runtime.join().expect("join");
        assert!(hook_rx.try_recv().is_ok());
    }

    #[test]
    fn intake_disconnect_does_not_stop_the_clock() {
        let hub = MemoryHub::new();
        let (tx, intake) = intake_queue(8);
        drop(tx);

        let runtime =
            ControllerRuntime::start(config(8, 10), Box::new(hub), intake, Box::new(|| {}))
                .expect("start");
        let report = runtime.join().expect("join");
        assert_eq!(report.stats.processed(), 0);
    }
}
