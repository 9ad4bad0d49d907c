//! In-memory reply channels.
//!
//! Backed by crossbeam queues; intended for tests and embedded use, and the
//! reference implementation of the [`ReplySender`] contract.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::channel::{ChannelError, ReplyConnector, ReplySender};
use crate::protocol::Outbound;

/// A reply channel delivering into an in-process queue.
#[derive(Debug, Clone)]
pub struct MemoryReply {
    address: String,
    tx: Sender<Outbound>,
}

impl MemoryReply {
    /// Creates a bounded reply channel and its receiving end.
    #[must_use]
    pub fn bounded(address: impl Into<String>, capacity: usize) -> (Self, Receiver<Outbound>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                address: address.into(),
                tx,
            },
            rx,
        )
    }

    /// Creates an unbounded reply channel and its receiving end.
    #[must_use]
    pub fn unbounded() -> (Self, Receiver<Outbound>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                address: "memory".to_string(),
                tx,
            },
            rx,
        )
    }
}

impl ReplySender for MemoryReply {
    fn send(&self, message: &Outbound) -> Result<(), ChannelError> {
        match self.tx.try_send(message.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ChannelError::Full {
                address: self.address.clone(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(ChannelError::Disconnected {
                address: self.address.clone(),
            }),
        }
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// A registry of in-process reply channels keyed by address token.
///
/// Test harnesses open a queue per agent before registering; the controller
/// resolves the address announced in REGISTER against the hub. Cloning the
/// hub shares the underlying map.
#[derive(Debug, Default, Clone)]
pub struct MemoryHub {
    channels: Arc<Mutex<HashMap<String, MemoryReply>>>,
}

impl MemoryHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an unbounded queue at `address`, returning its receiving end.
    /// Reopening an address replaces the previous queue.
    #[must_use]
    pub fn open(&self, address: &str) -> Receiver<Outbound> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let reply = MemoryReply {
            address: address.to_string(),
            tx,
        };
        if let Ok(mut channels) = self.channels.lock() {
            channels.insert(address.to_string(), reply);
        }
        rx
    }
}

impl ReplyConnector for MemoryHub {
    fn connect(&self, address: &str) -> Result<Arc<dyn ReplySender>, ChannelError> {
        let channels = self.channels.lock().map_err(|_| ChannelError::Unreachable {
            address: address.to_string(),
            message: "hub lock poisoned".to_string(),
        })?;
        channels
            .get(address)
            .cloned()
            .map(|reply| Arc::new(reply) as Arc<dyn ReplySender>)
            .ok_or_else(|| ChannelError::Unreachable {
                address: address.to_string(),
                message: "no queue opened at this address".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_order() {
        let (reply, rx) = MemoryReply::unbounded();
        reply.send(&Outbound::Time { hour: 8 }).expect("send");
        reply.send(&Outbound::Time { hour: 9 }).expect("send");
        assert_eq!(rx.recv().expect("recv"), Outbound::Time { hour: 8 });
        assert_eq!(rx.recv().expect("recv"), Outbound::Time { hour: 9 });
    }

    #[test]
    fn full_queue_fails_without_blocking() {
        let (reply, _rx) = MemoryReply::bounded("a1", 1);
        reply.send(&Outbound::End).expect("first fits");
        let err = reply.send(&Outbound::End).unwrap_err();
        assert!(matches!(err, ChannelError::Full { .. }));
    }

    #[test]
    fn dropped_receiver_reports_disconnected() {
        let (reply, rx) = MemoryReply::unbounded();
        drop(rx);
        let err = reply.send(&Outbound::End).unwrap_err();
        assert!(matches!(err, ChannelError::Disconnected { .. }));
    }

    #[test]
    fn hub_connects_only_opened_addresses() {
        let hub = MemoryHub::new();
        let rx = hub.open("agent-1");

        let reply = hub.connect("agent-1").expect("opened");
        reply.send(&Outbound::Time { hour: 7 }).expect("send");
        assert_eq!(rx.recv().expect("recv"), Outbound::Time { hour: 7 });

        let err = hub.connect("agent-2").unwrap_err();
        assert!(matches!(err, ChannelError::Unreachable { .. }));
    }
}
