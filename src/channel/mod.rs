//! Abstract message channels.
//!
//! The core is written against two small seams rather than any concrete
//! transport: an intake queue of decoded inbound messages feeding the
//! controller loop, and a per-agent [`ReplySender`] for outbound delivery.
//! Named pipes are one implementation ([`fifo`], Unix only); bounded
//! in-memory queues ([`memory`]) serve tests and embedded use. Any ordered,
//! reliable, message-boundary-preserving transport satisfies the contract.

use thiserror::Error;

use crate::protocol::{Inbound, Outbound};

pub mod memory;

#[cfg(unix)]
pub mod fifo;

/// Delivery failures on a reply channel.
///
/// Always isolated per recipient: a failed send is logged and skipped,
/// never aborts a broadcast and never fails the owning operation.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The recipient cannot be reached at its address.
    #[error("Recipient '{address}' is unreachable: {message}")]
    Unreachable {
        /// Reply channel address.
        address: String,
        /// Underlying cause.
        message: String,
    },

    /// The recipient's queue is full.
    #[error("Reply queue for '{address}' is full")]
    Full {
        /// Reply channel address.
        address: String,
    },

    /// The recipient's queue no longer has a reader.
    #[error("Reply channel for '{address}' is disconnected")]
    Disconnected {
        /// Reply channel address.
        address: String,
    },
}

/// One agent's outbound delivery handle.
///
/// Implementations must never block indefinitely: the runtime flushes
/// deliveries between state operations, and a slow recipient may only fail
/// its own delivery.
pub trait ReplySender: Send + Sync + std::fmt::Debug {
    /// Delivers one message, best-effort.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] when the recipient is unreachable, full,
    /// or gone.
    fn send(&self, message: &Outbound) -> Result<(), ChannelError>;

    /// The channel's address, for diagnostics.
    fn address(&self) -> &str;
}

/// Resolves a reply-channel address from a REGISTER message into a live
/// [`ReplySender`].
///
/// The FIFO transport connects to the pipe path the agent announced; the
/// in-memory hub looks the token up among pre-opened queues.
pub trait ReplyConnector: Send {
    /// Opens the reply channel at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unreachable`] when no channel exists at the
    /// address.
    fn connect(&self, address: &str) -> Result<std::sync::Arc<dyn ReplySender>, ChannelError>;
}

/// One unit received from the intake side of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    /// A well-formed inbound message.
    Message(Inbound),
    /// A line was dropped at decode; the diagnostic is already logged, this
    /// marker only lets the controller count the anomaly.
    Malformed,
}

/// Creates the bounded intake queue the controller loop reads from.
#[must_use]
pub fn intake_queue(
    capacity: usize,
) -> (
    crossbeam_channel::Sender<IntakeEvent>,
    crossbeam_channel::Receiver<IntakeEvent>,
) {
    crossbeam_channel::bounded(capacity.max(1))
}
