//! Registered agents and their reply channels.
//!
//! The registry exclusively owns all agent records; other components borrow
//! reply handles only for the duration of one delivery flush.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::channel::ReplySender;

/// A known agent and the handle used to reach it.
#[derive(Clone)]
pub struct Agent {
    /// Unique id among currently-registered agents.
    pub id: String,
    /// Outbound delivery handle.
    pub reply: Arc<dyn ReplySender>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").field("id", &self.id).finish()
    }
}

/// Tracks which agents are known and how to reach them.
///
/// Re-registering a known id refreshes its reply channel: an agent that
/// restarts with a fresh pipe keeps its identity. The refresh is logged so
/// an impersonation attempt at least leaves a trace.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
    order: Vec<String>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent, or refreshes the reply channel of a known one.
    pub fn register(&mut self, id: &str, reply: Arc<dyn ReplySender>) {
        if self.agents.contains_key(id) {
            info!(agent = id, "re-registration refreshes reply channel");
        } else {
            self.order.push(id.to_string());
        }
        self.agents.insert(
            id.to_string(),
            Agent {
                id: id.to_string(),
                reply,
            },
        );
    }

    /// Looks up a registered agent.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Removes an agent. Removing an unknown id is not an error.
    pub fn remove(&mut self, id: &str) {
        if self.agents.remove(id).is_some() {
            self.order.retain(|known| known != id);
        }
    }

    /// Number of currently-registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// All registered agents, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory::MemoryReply;

    fn reply() -> (Arc<dyn ReplySender>, crossbeam_channel::Receiver<crate::protocol::Outbound>) {
        let (sender, rx) = MemoryReply::unbounded();
        (Arc::new(sender), rx)
    }

    #[test]
    fn register_then_lookup() {
        let mut reg = AgentRegistry::new();
        let (tx, _rx) = reply();
        reg.register("a1", tx);
        assert!(reg.lookup("a1").is_some());
        assert!(reg.lookup("a2").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reregistration_refreshes_channel_without_duplicating() {
        let mut reg = AgentRegistry::new();
        let (old_tx, old_rx) = reply();
        let (new_tx, new_rx) = reply();
        reg.register("a1", old_tx);
        reg.register("a1", new_tx);
        assert_eq!(reg.len(), 1);

        let agent = reg.lookup("a1").expect("registered");
        agent
            .reply
            .send(&crate::protocol::Outbound::End)
            .expect("send");
        assert!(old_rx.try_recv().is_err());
        assert!(new_rx.try_recv().is_ok());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = AgentRegistry::new();
        let (tx, _rx) = reply();
        reg.register("a1", tx);
        reg.remove("a1");
        reg.remove("a1");
        reg.remove("never-registered");
        assert!(reg.is_empty());
    }

    #[test]
    fn iteration_preserves_registration_order() {
        let mut reg = AgentRegistry::new();
        for id in ["c", "a", "b"] {
            let (tx, _rx) = reply();
            reg.register(id, tx);
        }
        let ids: Vec<_> = reg.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
